//! Event-log ingestion for the replay binary
//!
//! The live host boundary delivers callbacks; the replay binary substitutes
//! a recorded log: one JSON object per line, each carrying a nanosecond
//! timestamp and a tagged event payload, e.g.
//!
//! ```text
//! {"ts":1200,"event":"include_enter","file":"vec.h"}
//! {"ts":9850,"event":"include_leave"}
//! {"ts":12000,"event":"parse_start","function":77,"key":3,"name":"grow(int)"}
//! ```
//!
//! Function display names ride along as optional `name` fields; they are
//! collected per handle into [`LogNames`], the resolver handed to the writer.

use std::collections::HashMap;
use std::io::{self, BufRead};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{
    Event, EventRecord, FunctionRef, IncludeEvent, ParseEvent, ParseKind, PassEvent, PassKind,
    Timestamp, UnitEvent,
};
use crate::session::EventLog;
use crate::writer::{NameResolver, Verbosity};

/// Errors surfaced while producing a trace from a recorded log.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to read or write trace data: {0}")]
    Io(#[from] io::Error),
    #[error("malformed event record on line {line}: {source}")]
    Parse {
        line: usize,
        source: serde_json::Error,
    },
}

/// One logged event, tagged by category and kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LoggedEvent {
    UnitStart,
    UnitEnd,
    IncludeEnter {
        file: String,
    },
    IncludeLeave,
    ParseStart {
        function: u64,
        key: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    PreGenericize {
        function: u64,
        key: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    ParseFinish {
        function: u64,
        key: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    PassStart {
        pass: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        function: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    PassEnd {
        pass: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        function: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

/// One line of the log: timestamp plus tagged payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub ts: Timestamp,
    #[serde(flatten)]
    pub event: LoggedEvent,
}

/// Display names collected from the log, keyed by function handle.
#[derive(Debug, Default)]
pub struct LogNames {
    names: HashMap<u64, String>,
}

impl NameResolver for LogNames {
    /// A recorded log carries one fixed rendering per function, so the
    /// verbosity level has nothing left to select.
    fn display_name(&self, handle: u64, _verbosity: Verbosity) -> String {
        self.names
            .get(&handle)
            .cloned()
            .unwrap_or_else(|| format!("fn#{handle}"))
    }
}

impl LogNames {
    fn learn(&mut self, handle: u64, name: Option<String>) {
        if let Some(name) = name {
            self.names.insert(handle, name);
        }
    }
}

fn into_event(line: LoggedEvent, names: &mut LogNames) -> Event {
    let func = |handle: u64, key: u32| FunctionRef { handle, key };
    match line {
        LoggedEvent::UnitStart => Event::Unit(UnitEvent::Start),
        LoggedEvent::UnitEnd => Event::Unit(UnitEvent::End),
        LoggedEvent::IncludeEnter { file } => Event::Include(IncludeEvent::Enter { file }),
        LoggedEvent::IncludeLeave => Event::Include(IncludeEvent::Leave),
        LoggedEvent::ParseStart {
            function,
            key,
            name,
        } => {
            names.learn(function, name);
            Event::Parse(ParseEvent {
                kind: ParseKind::Start,
                function: func(function, key),
            })
        }
        LoggedEvent::PreGenericize {
            function,
            key,
            name,
        } => {
            names.learn(function, name);
            Event::Parse(ParseEvent {
                kind: ParseKind::PreGenericize,
                function: func(function, key),
            })
        }
        LoggedEvent::ParseFinish {
            function,
            key,
            name,
        } => {
            names.learn(function, name);
            Event::Parse(ParseEvent {
                kind: ParseKind::Finish,
                function: func(function, key),
            })
        }
        LoggedEvent::PassStart {
            pass,
            function,
            key,
            name,
        } => {
            if let (Some(handle), name) = (function, name) {
                names.learn(handle, name);
            }
            Event::Pass(PassEvent {
                kind: PassKind::Start,
                name: pass,
                function: function.zip(key).map(|(handle, key)| func(handle, key)),
            })
        }
        LoggedEvent::PassEnd {
            pass,
            function,
            key,
            name,
        } => {
            if let (Some(handle), name) = (function, name) {
                names.learn(handle, name);
            }
            Event::Pass(PassEvent {
                kind: PassKind::End,
                name: pass,
                function: function.zip(key).map(|(handle, key)| func(handle, key)),
            })
        }
    }
}

/// Read a JSON-lines event log into a buffered [`EventLog`] plus the
/// display names it carried. Blank lines are skipped; a malformed line
/// aborts with its 1-based line number.
pub fn read_log<R: BufRead>(reader: R) -> Result<(EventLog, LogNames), TraceError> {
    let mut log = EventLog::new();
    let mut names = LogNames::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: LogLine =
            serde_json::from_str(&line).map_err(|source| TraceError::Parse {
                line: index + 1,
                source,
            })?;
        let event = into_event(parsed.event, &mut names);
        log.push(EventRecord::at(parsed.ts, event));
    }

    tracing::debug!(events = log.len(), "replay log ingested");
    Ok((log, names))
}
