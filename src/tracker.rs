//! Keyed interval tracker
//!
//! Correlates begin/end phase-boundary events into intervals using per-key
//! LIFO matching. Each category gets either a single pending stack (unit,
//! include) or a map of stacks keyed by function key or pass name (parse,
//! pass). An end-kind event pops the most recent pending begin for its key;
//! an end with nothing pending, or a begin still pending at shutdown, is
//! routed to the sink as a mismatch instead of an interval.
//!
//! The tracker itself never fails: every submit outcome is a routing
//! decision, and the only error channel is I/O propagated from the sink.

use std::collections::HashMap;
use std::hash::Hash;
use std::io;

use crate::event::{
    Event, EventRecord, IncludeEvent, ParseEvent, ParseKind, PassEvent, PassKind, UnitEvent,
};

/// Consumer of correlation output.
///
/// One interval/marker method pair per category. Interval methods receive the
/// matched begin and end records; marker methods receive a record that could
/// not be paired (an end with no pending begin, or a begin flushed at
/// shutdown). Implementations report I/O failure only; routing decisions are
/// the tracker's.
pub trait TraceSink {
    fn unit_interval(
        &mut self,
        start: EventRecord<UnitEvent>,
        end: EventRecord<UnitEvent>,
    ) -> io::Result<()>;
    fn unit_marker(&mut self, record: EventRecord<UnitEvent>) -> io::Result<()>;

    fn include_interval(
        &mut self,
        start: EventRecord<IncludeEvent>,
        end: EventRecord<IncludeEvent>,
    ) -> io::Result<()>;
    fn include_marker(&mut self, record: EventRecord<IncludeEvent>) -> io::Result<()>;

    fn parse_interval(
        &mut self,
        start: EventRecord<ParseEvent>,
        end: EventRecord<ParseEvent>,
    ) -> io::Result<()>;
    fn parse_marker(&mut self, record: EventRecord<ParseEvent>) -> io::Result<()>;

    fn pass_interval(
        &mut self,
        start: EventRecord<PassEvent>,
        end: EventRecord<PassEvent>,
    ) -> io::Result<()>;
    fn pass_marker(&mut self, record: EventRecord<PassEvent>) -> io::Result<()>;
}

/// Pop the most recent pending entry for `key`, pruning the stack from the
/// map once empty so key reuse after a full drain starts fresh.
fn pop_keyed<K, V>(map: &mut HashMap<K, Vec<V>>, key: &K) -> Option<V>
where
    K: Eq + Hash,
{
    let stack = map.get_mut(key)?;
    let top = stack.pop();
    if stack.is_empty() {
        map.remove(key);
    }
    top
}

/// Correlates a single time-ordered event stream into intervals.
///
/// Owns all pending-begin state for one run. Construct empty, feed every
/// observed record through the `submit_*` entry points in arrival order, then
/// call [`flush`](EventTracker::flush) exactly once at shutdown to report
/// everything still pending.
#[derive(Debug, Default)]
pub struct EventTracker {
    unit: Vec<EventRecord<UnitEvent>>,
    include: Vec<EventRecord<IncludeEvent>>,
    parse: HashMap<u32, Vec<EventRecord<ParseEvent>>>,
    genericize: HashMap<u32, Vec<EventRecord<ParseEvent>>>,
    pass: HashMap<String, Vec<EventRecord<PassEvent>>>,
}

impl EventTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no begin is pending in any category.
    pub fn is_empty(&self) -> bool {
        self.unit.is_empty()
            && self.include.is_empty()
            && self.parse.is_empty()
            && self.genericize.is_empty()
            && self.pass.is_empty()
    }

    /// Submit a record of any category through the tagged union.
    pub fn submit<S: TraceSink>(
        &mut self,
        record: EventRecord<Event>,
        sink: &mut S,
    ) -> io::Result<()> {
        let EventRecord { timestamp, event } = record;
        match event {
            Event::Unit(event) => self.submit_unit(EventRecord::at(timestamp, event), sink),
            Event::Include(event) => self.submit_include(EventRecord::at(timestamp, event), sink),
            Event::Parse(event) => self.submit_parse(EventRecord::at(timestamp, event), sink),
            Event::Pass(event) => self.submit_pass(EventRecord::at(timestamp, event), sink),
        }
    }

    /// Unit lifecycle: `Start` pushes, `End` matches the most recent start.
    pub fn submit_unit<S: TraceSink>(
        &mut self,
        record: EventRecord<UnitEvent>,
        sink: &mut S,
    ) -> io::Result<()> {
        match record.event {
            UnitEvent::Start => {
                self.unit.push(record);
                Ok(())
            }
            UnitEvent::End => match self.unit.pop() {
                Some(start) => sink.unit_interval(start, record),
                None => {
                    tracing::debug!("unit end with no pending start");
                    sink.unit_marker(record)
                }
            },
        }
    }

    /// Include nesting: `Enter` pushes, `Leave` matches the innermost enter.
    pub fn submit_include<S: TraceSink>(
        &mut self,
        record: EventRecord<IncludeEvent>,
        sink: &mut S,
    ) -> io::Result<()> {
        match record.event {
            IncludeEvent::Enter { .. } => {
                self.include.push(record);
                Ok(())
            }
            IncludeEvent::Leave => match self.include.pop() {
                Some(start) => sink.include_interval(start, record),
                None => {
                    tracing::debug!("include leave with no pending enter");
                    sink.include_marker(record)
                }
            },
        }
    }

    /// Parse lifecycle, keyed by function key.
    ///
    /// Two stack maps cooperate so the interval shape is decided only when
    /// the terminating event arrives:
    /// - `Start` pushes onto the parse map.
    /// - `PreGenericize` pushes onto the genericize map, then closes the
    ///   pending parse entry (Start..PreGenericize). No pending parse entry
    ///   is a mismatch; the genericize copy still awaits its Finish.
    /// - `Finish` closes the pending parse entry if one exists (the function
    ///   never reached PreGenericize), otherwise the pending genericize entry
    ///   (PreGenericize..Finish), otherwise it is a mismatch.
    pub fn submit_parse<S: TraceSink>(
        &mut self,
        record: EventRecord<ParseEvent>,
        sink: &mut S,
    ) -> io::Result<()> {
        let key = record.event.function.key;
        match record.event.kind {
            ParseKind::Start => {
                self.parse.entry(key).or_default().push(record);
                Ok(())
            }
            ParseKind::PreGenericize => {
                self.genericize.entry(key).or_default().push(record);
                match pop_keyed(&mut self.parse, &key) {
                    Some(start) => sink.parse_interval(start, record),
                    None => {
                        tracing::debug!(key, "pre-genericize with no pending parse start");
                        sink.parse_marker(record)
                    }
                }
            }
            ParseKind::Finish => match pop_keyed(&mut self.parse, &key) {
                Some(start) => sink.parse_interval(start, record),
                None => match pop_keyed(&mut self.genericize, &key) {
                    Some(start) => sink.parse_interval(start, record),
                    None => {
                        tracing::debug!(key, "parse finish with no pending phase");
                        sink.parse_marker(record)
                    }
                },
            },
        }
    }

    /// Pass execution, keyed by pass name. Reentrant passes stack: each
    /// `Start` pushes a fresh pending entry and each `End` pops the most
    /// recent one for that name.
    pub fn submit_pass<S: TraceSink>(
        &mut self,
        record: EventRecord<PassEvent>,
        sink: &mut S,
    ) -> io::Result<()> {
        match record.event.kind {
            PassKind::Start => {
                self.pass
                    .entry(record.event.name.clone())
                    .or_default()
                    .push(record);
                Ok(())
            }
            PassKind::End => match pop_keyed(&mut self.pass, &record.event.name) {
                Some(start) => sink.pass_interval(start, record),
                None => {
                    tracing::debug!(pass = %record.event.name, "pass end with no pending start");
                    sink.pass_marker(record)
                }
            },
        }
    }

    /// Report every still-pending begin as a mismatch and empty the tracker.
    ///
    /// Called once at shutdown. Stacks drain most-recent-first. Idempotent:
    /// a second flush on an empty tracker produces no output.
    pub fn flush<S: TraceSink>(&mut self, sink: &mut S) -> io::Result<()> {
        let mut dangling = 0usize;

        while let Some(record) = self.unit.pop() {
            dangling += 1;
            sink.unit_marker(record)?;
        }
        while let Some(record) = self.include.pop() {
            dangling += 1;
            sink.include_marker(record)?;
        }
        for (_, mut stack) in self.parse.drain() {
            while let Some(record) = stack.pop() {
                dangling += 1;
                sink.parse_marker(record)?;
            }
        }
        for (_, mut stack) in self.genericize.drain() {
            while let Some(record) = stack.pop() {
                dangling += 1;
                sink.parse_marker(record)?;
            }
        }
        for (_, mut stack) in self.pass.drain() {
            while let Some(record) = stack.pop() {
                dangling += 1;
                sink.pass_marker(record)?;
            }
        }

        if dangling > 0 {
            tracing::debug!(dangling, "flushed pending begins as mismatches");
        }
        Ok(())
    }
}
