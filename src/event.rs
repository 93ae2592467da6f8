//! Event model for phase-boundary notifications
//!
//! Pure data shapes: the four event categories a host pipeline can report,
//! the monotonic timestamp attached to each observation, and the record type
//! pairing the two. No correlation logic lives here.

use std::sync::OnceLock;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Monotonic origin shared by every `Timestamp::now()` in the process.
static CLOCK_ORIGIN: OnceLock<Instant> = OnceLock::new();

/// A monotonic point in time with nanosecond resolution.
///
/// Stored as a nanosecond offset from a process-global monotonic origin so
/// timestamps are cheap to copy, totally ordered, and representable in a
/// replay log. Captured at the moment an event is observed, never when it is
/// processed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Capture the current monotonic time.
    pub fn now() -> Self {
        let origin = CLOCK_ORIGIN.get_or_init(Instant::now);
        Timestamp(origin.elapsed().as_nanos() as u64)
    }

    /// Construct from a raw nanosecond offset (replay logs, tests).
    pub fn from_nanos(nanos: u64) -> Self {
        Timestamp(nanos)
    }

    /// Raw nanosecond offset from the process origin.
    pub fn as_nanos(self) -> u64 {
        self.0
    }

    /// Nanoseconds elapsed since `earlier`, saturating at zero.
    pub fn nanos_since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Opaque reference to a function known to the host.
///
/// `handle` is passed through untouched to the name-resolution service;
/// `key` is the host's stable integer key for the function, unique while the
/// function is in flight and reusable once its lifecycle fully drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionRef {
    pub handle: u64,
    pub key: u32,
}

/// Compilation-unit lifecycle boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitEvent {
    Start,
    End,
}

/// File-inclusion boundary. `Enter` carries the included file's path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncludeEvent {
    Enter { file: String },
    Leave,
}

/// Sub-phase of a function's parse lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseKind {
    Start,
    PreGenericize,
    Finish,
}

/// Per-function parse phase boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseEvent {
    pub kind: ParseKind,
    pub function: FunctionRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Start,
    End,
}

/// Named processing-pass boundary, optionally attributed to a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassEvent {
    pub kind: PassKind,
    pub name: String,
    pub function: Option<FunctionRef>,
}

/// Tagged union over the four event categories, for call sites that accept
/// any category through a single channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Unit(UnitEvent),
    Include(IncludeEvent),
    Parse(ParseEvent),
    Pass(PassEvent),
}

/// An event paired with its observation timestamp.
///
/// Immutable once constructed; the timestamp always reflects when the event
/// was observed, not when it was correlated or serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord<E> {
    pub timestamp: Timestamp,
    pub event: E,
}

impl<E> EventRecord<E> {
    /// Record `event` as observed right now.
    pub fn now(event: E) -> Self {
        EventRecord {
            timestamp: Timestamp::now(),
            event,
        }
    }

    /// Record `event` with an explicit observation timestamp.
    pub fn at(timestamp: Timestamp, event: E) -> Self {
        EventRecord { timestamp, event }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_now_is_monotonic() {
        let a = Timestamp::now();
        let b = Timestamp::now();
        assert!(a <= b);
    }

    #[test]
    fn test_timestamp_nanos_since() {
        let early = Timestamp::from_nanos(1_000);
        let late = Timestamp::from_nanos(4_500);
        assert_eq!(late.nanos_since(early), 3_500);
        // Saturates instead of wrapping when the order is reversed.
        assert_eq!(early.nanos_since(late), 0);
        assert_eq!(early.nanos_since(early), 0);
    }

    #[test]
    fn test_timestamp_roundtrips_through_serde() {
        let ts = Timestamp::from_nanos(123_456_789);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "123456789");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn test_record_preserves_explicit_timestamp() {
        let ts = Timestamp::from_nanos(42);
        let record = EventRecord::at(ts, UnitEvent::Start);
        assert_eq!(record.timestamp, ts);
        assert_eq!(record.event, UnitEvent::Start);
    }

    #[test]
    fn test_record_now_captures_observation_time() {
        let before = Timestamp::now();
        let record = EventRecord::now(UnitEvent::End);
        let after = Timestamp::now();
        assert!(before <= record.timestamp && record.timestamp <= after);
    }
}
