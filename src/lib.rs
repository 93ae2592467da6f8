//! Phasetrace - phase-boundary event correlation and trace serialization
//!
//! This library turns a flat, time-ordered stream of begin/end notifications
//! from a multi-stage pipeline (compilation units, nested file inclusion,
//! per-function parse phases, named processing passes) into a Chrome Trace
//! Event Format document. Begin/end pairs are correlated per key with LIFO
//! matching; events that never pair up are surfaced as instantaneous marker
//! entries rather than dropped.
//!
//! Typical flow: buffer observations in a [`session::EventLog`] during the
//! run, then consume it with [`session::EventLog::write_trace`] at shutdown,
//! which correlates through [`tracker::EventTracker`] and serializes through
//! [`writer::TraceWriter`].

pub mod cli;
pub mod event;
pub mod replay;
pub mod session;
pub mod tracker;
pub mod writer;
