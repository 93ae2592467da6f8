//! Streaming Trace Event Format serializer
//!
//! Writes one JSON array of trace entries to a byte sink. Construction emits
//! the opening delimiter, [`finish`](TraceWriter::finish) (or the drop guard)
//! emits the closing one exactly once, and every interval or marker routed in
//! between becomes one comma-separated entry. Timestamps are rendered
//! relative to a shared epoch as fixed-point microseconds with a three-digit
//! nanosecond remainder, the convention trace viewers expect.
//!
//! The writer escapes every name, path, and argument value itself; callers
//! hand it raw strings.

use std::collections::HashMap;
use std::io::{self, Write};

use crate::event::{
    EventRecord, FunctionRef, IncludeEvent, ParseEvent, ParseKind, PassEvent, PassKind, Timestamp,
    UnitEvent,
};
use crate::tracker::TraceSink;

/// Detail level for resolved function display names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Bare function name.
    Bare,
    /// Name plus enclosing scope.
    #[default]
    Scoped,
    /// Name, scope, and signature detail.
    Full,
}

impl Verbosity {
    /// Map the host-facing 0..=2 level to a variant.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Verbosity::Bare),
            1 => Some(Verbosity::Scoped),
            2 => Some(Verbosity::Full),
            _ => None,
        }
    }
}

/// Host service turning an opaque function handle into a display name.
///
/// Expected to always return some string, possibly empty; the writer has no
/// fallback path on this boundary.
pub trait NameResolver {
    fn display_name(&self, handle: u64, verbosity: Verbosity) -> String;
}

/// Escape a raw string for embedding in a JSON string literal.
fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Append-only writer for one trace document.
///
/// Owns the output sink and the display-name cache for the document's
/// lifetime. All entries share the synthetic pid/tid 0 stream: this models
/// one logical timeline, not a multi-thread trace.
pub struct TraceWriter<W: Write, R: NameResolver> {
    out: W,
    epoch: Timestamp,
    resolver: R,
    verbosity: Verbosity,
    entries: usize,
    /// Escaped display names keyed by function key.
    names: HashMap<u32, String>,
    closed: bool,
}

impl<W: Write, R: NameResolver> TraceWriter<W, R> {
    /// Open a trace document on `out`, writing the opening delimiter.
    ///
    /// `epoch` is the zero point for every relative timestamp in the
    /// document; `verbosity` is forwarded to `resolver` on every cache miss.
    pub fn new(out: W, epoch: Timestamp, resolver: R, verbosity: Verbosity) -> io::Result<Self> {
        let mut writer = TraceWriter {
            out,
            epoch,
            resolver,
            verbosity,
            entries: 0,
            names: HashMap::new(),
            closed: false,
        };
        writer.out.write_all(b"[")?;
        Ok(writer)
    }

    /// Record a synthetic entry outside the tracked categories, e.g. the
    /// duration of the trace dump itself.
    pub fn write_custom(&mut self, name: &str, start: Timestamp, end: Timestamp) -> io::Result<()> {
        self.begin_entry(name, start, end)?;
        self.end_entry()
    }

    /// Write the closing delimiter and flush the sink.
    pub fn finish(mut self) -> io::Result<()> {
        self.close()
    }

    fn close(&mut self) -> io::Result<()> {
        if !self.closed {
            self.closed = true;
            self.out.write_all(b"]")?;
            self.out.flush()?;
        }
        Ok(())
    }

    /// Write the shared head of one entry: name, relative timestamp, phase
    /// discriminator, duration when non-zero, and the fixed stream ids.
    fn begin_entry(&mut self, name: &str, start: Timestamp, end: Timestamp) -> io::Result<()> {
        let ts = start.nanos_since(self.epoch);
        let dur = end.nanos_since(start);

        if self.entries > 0 {
            self.out.write_all(b",")?;
        }
        self.entries += 1;

        write!(
            self.out,
            "{{\"name\":\"{}\",\"ts\":{}.{:03},",
            escape(name),
            ts / 1000,
            ts % 1000
        )?;
        if dur > 0 {
            write!(self.out, "\"ph\":\"X\",\"dur\":{}.{:03},", dur / 1000, dur % 1000)?;
        } else {
            write!(self.out, "\"ph\":\"i\",")?;
        }
        write!(self.out, "\"pid\":0,\"tid\":0")
    }

    fn end_entry(&mut self) -> io::Result<()> {
        self.out.write_all(b"}")
    }

    fn write_file_arg(&mut self, file: &str) -> io::Result<()> {
        write!(self.out, ",\"args\":{{\"file\":\"{}\"}}", escape(file))
    }

    fn write_function_arg(&mut self, function: FunctionRef) -> io::Result<()> {
        let verbosity = self.verbosity;
        let resolver = &self.resolver;
        let name = self
            .names
            .entry(function.key)
            .or_insert_with(|| escape(&resolver.display_name(function.handle, verbosity)));
        write!(self.out, ",\"args\":{{\"function\":\"{name}\"}}")
    }
}

impl<W: Write, R: NameResolver> TraceSink for TraceWriter<W, R> {
    fn unit_interval(
        &mut self,
        start: EventRecord<UnitEvent>,
        end: EventRecord<UnitEvent>,
    ) -> io::Result<()> {
        self.begin_entry("unit", start.timestamp, end.timestamp)?;
        self.end_entry()
    }

    fn unit_marker(&mut self, record: EventRecord<UnitEvent>) -> io::Result<()> {
        let name = match record.event {
            UnitEvent::Start => "unit (start)",
            UnitEvent::End => "unit (end)",
        };
        self.begin_entry(name, record.timestamp, record.timestamp)?;
        self.end_entry()
    }

    fn include_interval(
        &mut self,
        start: EventRecord<IncludeEvent>,
        end: EventRecord<IncludeEvent>,
    ) -> io::Result<()> {
        self.begin_entry("include", start.timestamp, end.timestamp)?;
        if let IncludeEvent::Enter { file } = &start.event {
            self.write_file_arg(file)?;
        }
        self.end_entry()
    }

    fn include_marker(&mut self, record: EventRecord<IncludeEvent>) -> io::Result<()> {
        match &record.event {
            IncludeEvent::Enter { file } => {
                self.begin_entry("include (enter)", record.timestamp, record.timestamp)?;
                self.write_file_arg(file)?;
            }
            IncludeEvent::Leave => {
                self.begin_entry("include (leave)", record.timestamp, record.timestamp)?;
            }
        }
        self.end_entry()
    }

    fn parse_interval(
        &mut self,
        start: EventRecord<ParseEvent>,
        end: EventRecord<ParseEvent>,
    ) -> io::Result<()> {
        // The start record's kind decides the interval shape: a parse span
        // begins at Start, a genericize span begins at PreGenericize.
        let name = match start.event.kind {
            ParseKind::PreGenericize => "genericize",
            _ => "parse",
        };
        self.begin_entry(name, start.timestamp, end.timestamp)?;
        self.write_function_arg(start.event.function)?;
        self.end_entry()
    }

    fn parse_marker(&mut self, record: EventRecord<ParseEvent>) -> io::Result<()> {
        let name = match record.event.kind {
            // A dangling parse start carries no information a viewer can
            // anchor; it produces no entry.
            ParseKind::Start => return Ok(()),
            ParseKind::PreGenericize => "genericize (start)",
            ParseKind::Finish => "parse (finish)",
        };
        self.begin_entry(name, record.timestamp, record.timestamp)?;
        self.write_function_arg(record.event.function)?;
        self.end_entry()
    }

    fn pass_interval(
        &mut self,
        start: EventRecord<PassEvent>,
        end: EventRecord<PassEvent>,
    ) -> io::Result<()> {
        self.begin_entry(&start.event.name, start.timestamp, end.timestamp)?;
        if let Some(function) = start.event.function {
            self.write_function_arg(function)?;
        }
        self.end_entry()
    }

    fn pass_marker(&mut self, record: EventRecord<PassEvent>) -> io::Result<()> {
        let suffix = match record.event.kind {
            PassKind::Start => "start",
            PassKind::End => "cancelled",
        };
        let name = format!("{} ({suffix})", record.event.name);
        self.begin_entry(&name, record.timestamp, record.timestamp)?;
        if let Some(function) = record.event.function {
            self.write_function_arg(function)?;
        }
        self.end_entry()
    }
}

impl<W: Write, R: NameResolver> Drop for TraceWriter<W, R> {
    /// Best-effort close so the document gets its trailing delimiter on
    /// every exit path. Errors here have nowhere to go.
    fn drop(&mut self) {
        let _ = self.close();
    }
}
