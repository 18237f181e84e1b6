//! Socket, memory-map, and process tracing for Linux.
//!
//! Provides:
//! - `collector`: raw enumerators over the `/proc` filesystem (sockets,
//!   processes, memory maps), mockable for testing off-Linux
//! - `correlate`: joins raw sockets to their owning processes
//! - `classify`: hung-connection and memory-leak heuristics
//! - `aggregate`: per-process summaries
//! - `tracer`: snapshot orchestration, state machine, health probing
//! - `model`: wire-stable snapshot data model
//! - `config`: tracer thresholds and limits

pub mod aggregate;
pub mod classify;
pub mod collector;
pub mod config;
pub mod correlate;
pub mod model;
pub mod tracer;

/// Crate version, exposed for CLI `--version` and the web server banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
