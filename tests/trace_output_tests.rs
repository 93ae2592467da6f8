//! Document-level tests: buffer events, dump a trace, parse it back
//!
//! Every test drives the public `EventLog::write_trace` path and verifies
//! the emitted Trace Event Format document through serde_json, the same way
//! a trace viewer's loader would read it.

use phasetrace::event::{
    Event, EventRecord, FunctionRef, IncludeEvent, ParseEvent, ParseKind, PassEvent, PassKind,
    Timestamp, UnitEvent,
};
use phasetrace::session::EventLog;
use phasetrace::writer::{NameResolver, Verbosity};

/// Resolver that renders names per verbosity level, for cache/arg checks.
struct TableResolver;

impl NameResolver for TableResolver {
    fn display_name(&self, handle: u64, verbosity: Verbosity) -> String {
        match verbosity {
            Verbosity::Bare => format!("f{handle}"),
            Verbosity::Scoped => format!("ns::f{handle}"),
            Verbosity::Full => format!("ns::f{handle}(int, char const*)"),
        }
    }
}

fn ts(nanos: u64) -> Timestamp {
    Timestamp::from_nanos(nanos)
}

fn at(nanos: u64, event: Event) -> EventRecord<Event> {
    EventRecord::at(ts(nanos), event)
}

fn dump(log: EventLog, verbosity: Verbosity) -> serde_json::Value {
    let mut buf = Vec::new();
    log.write_trace(&mut buf, TableResolver, verbosity).unwrap();
    serde_json::from_slice(&buf).expect("document must be valid JSON")
}

fn entry_names(doc: &serde_json::Value) -> Vec<String> {
    doc.as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_epoch_anchors_earliest_entry_at_zero() {
    let mut log = EventLog::new();
    // Distinct earliest timestamps per category; include is globally first.
    log.push(at(
        2_000,
        Event::Include(IncludeEvent::Enter {
            file: "a.h".to_string(),
        }),
    ));
    log.push(at(3_500, Event::Include(IncludeEvent::Leave)));
    log.push(at(5_000, Event::Unit(UnitEvent::Start)));
    log.push(at(9_000, Event::Unit(UnitEvent::End)));

    let doc = dump(log, Verbosity::Scoped);
    let entries = doc.as_array().unwrap();

    // Replay order is unit first, so the include entry is second but owns
    // the zero point.
    assert_eq!(entries[0]["name"], "unit");
    assert_eq!(entries[0]["ts"], 3.0);
    assert_eq!(entries[0]["dur"], 4.0);
    assert_eq!(entries[1]["name"], "include");
    assert_eq!(entries[1]["ts"], 0.0);
    assert_eq!(entries[1]["dur"], 1.5);
}

#[test]
fn test_nested_include_spans_contain_each_other() {
    let mut log = EventLog::new();
    log.push(at(
        1_000,
        Event::Include(IncludeEvent::Enter {
            file: "a.h".to_string(),
        }),
    ));
    log.push(at(
        2_000,
        Event::Include(IncludeEvent::Enter {
            file: "b.h".to_string(),
        }),
    ));
    log.push(at(3_000, Event::Include(IncludeEvent::Leave)));
    log.push(at(4_000, Event::Include(IncludeEvent::Leave)));

    let doc = dump(log, Verbosity::Scoped);
    let entries = doc.as_array().unwrap();

    assert_eq!(entries[0]["args"]["file"], "b.h");
    assert_eq!(entries[1]["args"]["file"], "a.h");
    let inner_ts = entries[0]["ts"].as_f64().unwrap();
    let inner_dur = entries[0]["dur"].as_f64().unwrap();
    let outer_ts = entries[1]["ts"].as_f64().unwrap();
    let outer_dur = entries[1]["dur"].as_f64().unwrap();
    assert!(outer_ts <= inner_ts);
    assert!(outer_ts + outer_dur >= inner_ts + inner_dur);
}

#[test]
fn test_parse_phases_and_function_args() {
    let function = FunctionRef { handle: 12, key: 4 };
    let mut log = EventLog::new();
    for (nanos, kind) in [
        (1_000, ParseKind::Start),
        (2_500, ParseKind::PreGenericize),
        (4_000, ParseKind::Finish),
    ] {
        log.push(at(nanos, Event::Parse(ParseEvent { kind, function })));
    }

    let doc = dump(log, Verbosity::Full);
    assert_eq!(
        entry_names(&doc),
        vec!["parse", "genericize", "trace_dump"]
    );
    assert_eq!(doc[0]["args"]["function"], "ns::f12(int, char const*)");
    assert_eq!(doc[1]["args"]["function"], "ns::f12(int, char const*)");
    assert_eq!(doc[0]["ph"], "X");
    assert_eq!(doc[0]["dur"], 1.5);
}

#[test]
fn test_verbosity_selects_name_detail() {
    let function = FunctionRef { handle: 3, key: 1 };
    let mut log = EventLog::new();
    log.push(at(
        1,
        Event::Parse(ParseEvent {
            kind: ParseKind::Start,
            function,
        }),
    ));
    log.push(at(
        2,
        Event::Parse(ParseEvent {
            kind: ParseKind::Finish,
            function,
        }),
    ));

    let doc = dump(log, Verbosity::Bare);
    assert_eq!(doc[0]["args"]["function"], "f3");
}

#[test]
fn test_quoted_path_round_trips_through_json_parser() {
    let mut log = EventLog::new();
    log.push(at(
        1,
        Event::Include(IncludeEvent::Enter {
            file: "weird \"dir\"\\name.h".to_string(),
        }),
    ));
    log.push(at(2, Event::Include(IncludeEvent::Leave)));

    let doc = dump(log, Verbosity::Scoped);
    assert_eq!(doc[0]["args"]["file"], "weird \"dir\"\\name.h");
}

#[test]
fn test_quoted_pass_name_round_trips() {
    let mut log = EventLog::new();
    log.push(at(
        1,
        Event::Pass(PassEvent {
            kind: PassKind::Start,
            name: "pass \"odd\"".to_string(),
            function: None,
        }),
    ));
    log.push(at(
        2,
        Event::Pass(PassEvent {
            kind: PassKind::End,
            name: "pass \"odd\"".to_string(),
            function: None,
        }),
    ));

    let doc = dump(log, Verbosity::Scoped);
    assert_eq!(doc[0]["name"], "pass \"odd\"");
}

#[test]
fn test_mismatches_render_as_instant_markers() {
    let mut log = EventLog::new();
    // A leave with no enter, then an enter never left.
    log.push(at(1_000, Event::Include(IncludeEvent::Leave)));
    log.push(at(
        2_000,
        Event::Include(IncludeEvent::Enter {
            file: "lost.h".to_string(),
        }),
    ));
    log.push(at(
        3_000,
        Event::Pass(PassEvent {
            kind: PassKind::End,
            name: "ccp".to_string(),
            function: None,
        }),
    ));

    let doc = dump(log, Verbosity::Scoped);
    assert_eq!(
        entry_names(&doc),
        vec![
            "include (leave)",
            "ccp (cancelled)",
            "include (enter)",
            "trace_dump"
        ]
    );
    for entry in doc.as_array().unwrap().iter().take(3) {
        assert_eq!(entry["ph"], "i");
        assert!(entry.get("dur").is_none());
    }
    assert_eq!(doc[2]["args"]["file"], "lost.h");
}

#[test]
fn test_trace_dump_entry_is_last_and_document_closed() {
    let mut log = EventLog::new();
    log.push(at(1, Event::Unit(UnitEvent::Start)));
    log.push(at(2, Event::Unit(UnitEvent::End)));

    let mut buf = Vec::new();
    log.write_trace(&mut buf, TableResolver, Verbosity::Scoped)
        .unwrap();
    let text = String::from_utf8(buf).unwrap();
    assert!(text.starts_with('['));
    assert!(text.ends_with(']'));

    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    let names = entry_names(&doc);
    assert_eq!(names.last().unwrap(), "trace_dump");
}

#[test]
fn test_fixed_stream_identifiers() {
    let mut log = EventLog::new();
    log.push(at(1, Event::Unit(UnitEvent::Start)));
    log.push(at(2, Event::Unit(UnitEvent::End)));

    let doc = dump(log, Verbosity::Scoped);
    for entry in doc.as_array().unwrap() {
        assert_eq!(entry["pid"], 0);
        assert_eq!(entry["tid"], 0);
    }
}
