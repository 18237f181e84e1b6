//! Tracer thresholds and limits.

use std::time::Duration;

use serde::Serialize;

/// Configuration for one tracer instance.
///
/// Defaults are the documented heuristics: a socket is hung when it
/// outlives twice the expected linger of its transitional state, and
/// leaking when its attributed memory passes an absolute cutoff or grows
/// strictly across a full history window.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct TracerConfig {
    /// Base path of the proc filesystem.
    pub proc_path: String,
    /// TIME_WAIT residency beyond this is hung (2x the 60s linger).
    pub hang_time_wait_secs: u64,
    /// CLOSE_WAIT residency beyond this is hung.
    pub hang_close_wait_secs: u64,
    /// SYN_SENT / SYN_RECV residency beyond this is hung.
    pub hang_syn_secs: u64,
    /// Absolute attributed-memory cutoff for the leak flag, bytes.
    pub leak_threshold_bytes: u64,
    /// Number of memory samples that must grow strictly before the
    /// growth heuristic fires.
    pub leak_history_depth: usize,
    /// Socket history entries idle beyond this are evicted.
    pub history_retention_secs: u64,
    /// Upper bound on concurrent per-process memory map scans.
    pub max_map_workers: usize,
    /// Whole-trace deadline; in-flight map scans past it are abandoned.
    #[serde(skip)]
    pub trace_deadline: Duration,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            proc_path: "/proc".to_string(),
            hang_time_wait_secs: 120,
            hang_close_wait_secs: 60,
            hang_syn_secs: 30,
            leak_threshold_bytes: 16 * 1024 * 1024,
            leak_history_depth: 5,
            history_retention_secs: 300,
            max_map_workers: 8,
            trace_deadline: Duration::from_secs(30),
        }
    }
}

impl TracerConfig {
    /// Creates a config scanning the given proc root, defaults otherwise.
    pub fn with_proc_path(proc_path: impl Into<String>) -> Self {
        Self {
            proc_path: proc_path.into(),
            ..Self::default()
        }
    }

    /// Overrides the whole-trace deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.trace_deadline = deadline;
        self
    }
}
