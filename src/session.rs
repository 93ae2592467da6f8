//! Per-run event buffering and trace dump orchestration
//!
//! The host delivers events cheaply during the run; correlation and
//! serialization happen once, at shutdown. [`EventLog`] is the buffer: it
//! records timestamped events per category, computes the shared epoch, and
//! [`write_trace`](EventLog::write_trace) replays everything through a fresh
//! tracker into a writer, flushes, appends the synthetic `trace_dump` entry
//! covering the dump itself, and closes the document. Nothing survives the
//! dump.

use std::io::{self, Write};

use crate::event::{
    Event, EventRecord, IncludeEvent, ParseEvent, PassEvent, Timestamp, UnitEvent,
};
use crate::tracker::EventTracker;
use crate::writer::{NameResolver, TraceWriter, Verbosity};

/// Buffered event stream for one run.
#[derive(Debug, Default)]
pub struct EventLog {
    unit: Vec<EventRecord<UnitEvent>>,
    include: Vec<EventRecord<IncludeEvent>>,
    parse: Vec<EventRecord<ParseEvent>>,
    pass: Vec<EventRecord<PassEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of buffered records across all categories.
    pub fn len(&self) -> usize {
        self.unit.len() + self.include.len() + self.parse.len() + self.pass.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record a unit event observed right now.
    pub fn record_unit(&mut self, event: UnitEvent) {
        self.unit.push(EventRecord::now(event));
    }

    pub fn record_include(&mut self, event: IncludeEvent) {
        self.include.push(EventRecord::now(event));
    }

    pub fn record_parse(&mut self, event: ParseEvent) {
        self.parse.push(EventRecord::now(event));
    }

    pub fn record_pass(&mut self, event: PassEvent) {
        self.pass.push(EventRecord::now(event));
    }

    /// Buffer a pre-timestamped record of any category (replay path).
    pub fn push(&mut self, record: EventRecord<Event>) {
        let EventRecord { timestamp, event } = record;
        match event {
            Event::Unit(event) => self.unit.push(EventRecord::at(timestamp, event)),
            Event::Include(event) => self.include.push(EventRecord::at(timestamp, event)),
            Event::Parse(event) => self.parse.push(EventRecord::at(timestamp, event)),
            Event::Pass(event) => self.pass.push(EventRecord::at(timestamp, event)),
        }
    }

    /// The shared zero point: the minimum first-buffered timestamp over
    /// non-empty categories, or `None` for an empty log.
    ///
    /// Each category is delivered in arrival order, so its earliest record
    /// is its first.
    pub fn epoch(&self) -> Option<Timestamp> {
        [
            self.unit.first().map(|r| r.timestamp),
            self.include.first().map(|r| r.timestamp),
            self.parse.first().map(|r| r.timestamp),
            self.pass.first().map(|r| r.timestamp),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Correlate the buffered stream and serialize it as one trace document.
    ///
    /// Consumes the log. Replays category by category (unit, include, parse,
    /// pass), flushes the tracker so every dangling begin is reported, then
    /// records the dump's own duration as a final `trace_dump` entry and
    /// closes the document. Only sink I/O can fail; a failed dump leaves the
    /// host's own pipeline untouched.
    pub fn write_trace<W, R>(self, out: W, resolver: R, verbosity: Verbosity) -> io::Result<()>
    where
        W: Write,
        R: NameResolver,
    {
        let dump_start = Timestamp::now();
        let epoch = self.epoch().unwrap_or(dump_start);
        tracing::debug!(
            events = self.len(),
            epoch = epoch.as_nanos(),
            "writing trace document"
        );

        let mut writer = TraceWriter::new(out, epoch, resolver, verbosity)?;
        let mut tracker = EventTracker::new();

        for record in self.unit {
            tracker.submit_unit(record, &mut writer)?;
        }
        for record in self.include {
            tracker.submit_include(record, &mut writer)?;
        }
        for record in self.parse {
            tracker.submit_parse(record, &mut writer)?;
        }
        for record in self.pass {
            tracker.submit_pass(record, &mut writer)?;
        }
        tracker.flush(&mut writer)?;

        writer.write_custom("trace_dump", dump_start, Timestamp::now())?;
        writer.finish()
    }
}
