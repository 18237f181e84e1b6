//! Snapshot orchestration: the tracer state machine.
//!
//! One `trace()` call runs a complete capture:
//!
//! ```text
//! Idle -> Scanning -> (Succeeded | Failed) -> Idle
//! ```
//!
//! Scanning fans the socket and process enumerators out on parallel
//! threads, then runs per-process memory mapping on a bounded worker pool
//! while the main thread correlates and classifies sockets (the two sides
//! operate on disjoint data), and finally aggregates. The snapshot
//! timestamp is fixed once at the start of Scanning; slower sub-scans
//! still carry it.
//!
//! Failure policy: only an unreadable primary socket table fails the
//! trace. Everything else (a vanished process, an unreadable maps file,
//! a malformed table line) is skipped and counted in
//! `TraceSnapshot::soft_errors`. When the trace deadline elapses,
//! in-flight memory scans are abandoned and the snapshot is returned with
//! `partial = true`.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::aggregate::aggregate;
use crate::classify::Classifier;
use crate::collector::procfs::{
    EnumerationError, MapsCollector, ProcessCollector, ProcessScan, SocketTableCollector,
};
use crate::collector::traits::FileSystem;
use crate::config::TracerConfig;
use crate::correlate::Correlator;
use crate::model::{MemorySegment, TraceSnapshot};

/// Lifecycle of the tracer. `Scanning` is observable only from another
/// thread while a trace is in flight; a finished tracer rests on its last
/// outcome until the next trace begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracerState {
    Idle,
    Scanning,
    Succeeded,
    Failed,
}

/// Error type for a failed trace.
#[derive(Debug)]
pub enum TraceError {
    /// The primary socket table could not be enumerated at all.
    SocketTable(EnumerationError),
}

impl std::fmt::Display for TraceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceError::SocketTable(e) => write!(f, "socket enumeration failed: {}", e),
        }
    }
}

impl std::error::Error for TraceError {}

/// Timing of the last trace, for debugging and logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceTiming {
    pub total: Duration,
    pub enumerate: Duration,
    pub correlate: Duration,
    pub memory_maps: Duration,
    pub aggregate: Duration,
}

/// Liveness report for the OS introspection surface, produced without
/// running a full trace.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// True when the primary socket table is readable right now.
    pub socket_table_readable: bool,
    /// The proc root this tracer scans.
    pub proc_path: String,
}

/// The snapshot service: owns the enumerators, the correlator, and the
/// classifier history, and produces one immutable `TraceSnapshot` per
/// `trace()` call.
///
/// The classifier's cross-snapshot history is the only mutable state;
/// `trace()` takes `&mut self` so history writes are serialized by
/// construction even though enumeration inside a trace is parallel.
pub struct Tracer<F: FileSystem + Clone> {
    fs: F,
    config: TracerConfig,
    sockets: SocketTableCollector<F>,
    processes: ProcessCollector<F>,
    maps: MapsCollector<F>,
    correlator: Correlator<F>,
    classifier: Classifier,
    state: TracerState,
    last_timing: Option<TraceTiming>,
}

impl<F: FileSystem + Clone> Tracer<F> {
    pub fn new(fs: F, config: TracerConfig) -> Self {
        let proc_path = config.proc_path.clone();
        Self {
            sockets: SocketTableCollector::new(fs.clone(), &proc_path),
            processes: ProcessCollector::new(fs.clone(), &proc_path),
            maps: MapsCollector::new(fs.clone(), &proc_path),
            correlator: Correlator::new(fs.clone(), &proc_path),
            classifier: Classifier::new(),
            fs,
            config,
            state: TracerState::Idle,
            last_timing: None,
        }
    }

    pub fn config(&self) -> &TracerConfig {
        &self.config
    }

    pub fn state(&self) -> TracerState {
        self.state
    }

    pub fn last_timing(&self) -> Option<&TraceTiming> {
        self.last_timing.as_ref()
    }

    /// Probes the OS interface without tracing.
    pub fn health_check(&self) -> HealthStatus {
        let path = self.sockets.primary_table_path();
        let readable = self
            .fs
            .read_to_string(std::path::Path::new(&path))
            .is_ok();
        HealthStatus {
            socket_table_readable: readable,
            proc_path: self.config.proc_path.clone(),
        }
    }

    /// Runs one complete trace and returns an immutable snapshot.
    pub fn trace(&mut self) -> Result<TraceSnapshot, TraceError> {
        self.trace_with_deadline(self.config.trace_deadline)
    }

    /// Runs one trace under a caller-supplied deadline instead of the
    /// configured one. Callers with a tighter response budget get a
    /// partial snapshot back in time rather than an aborted request.
    pub fn trace_with_deadline(&mut self, budget: Duration) -> Result<TraceSnapshot, TraceError> {
        self.state = TracerState::Scanning;
        let started = Instant::now();
        let deadline = started + budget;
        let mut timing = TraceTiming::default();

        // All three sub-collections share this timestamp, fixed before
        // any enumeration starts.
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let mut soft_errors = 0u32;

        // Phase 1: socket and process enumeration in parallel.
        let phase_start = Instant::now();
        let (socket_result, process_result) = thread::scope(|scope| {
            let proc_handle = scope.spawn(|| self.processes.collect_all());
            let socket_result = self.sockets.list_sockets();
            let process_result = proc_handle.join().unwrap_or_else(|_| {
                Err(EnumerationError::unreadable(
                    &self.config.proc_path,
                    std::io::Error::other("process enumeration thread panicked"),
                ))
            });
            (socket_result, process_result)
        });
        timing.enumerate = phase_start.elapsed();

        let socket_scan = match socket_result {
            Ok(scan) => scan,
            Err(e) => {
                warn!(error = %e, "primary socket table enumeration failed");
                self.state = TracerState::Failed;
                return Err(TraceError::SocketTable(e));
            }
        };
        soft_errors += socket_scan.soft_errors;

        let ProcessScan {
            processes: raw_processes,
            soft_errors: process_soft,
        } = process_result.unwrap_or_else(|e| {
            warn!(error = %e, "process enumeration failed, continuing without processes");
            ProcessScan {
                processes: Vec::new(),
                soft_errors: 1,
            }
        });
        soft_errors += process_soft;

        // Phase 2: per-process memory mapping on a worker pool, with
        // correlation and classification on this thread in the meantime.
        let pids: Vec<u32> = raw_processes.iter().map(|p| p.pid).collect();
        let worker_count = pids.len().clamp(1, self.config.max_map_workers);

        let cursor = AtomicUsize::new(0);
        let collected: Mutex<Vec<MemorySegment>> = Mutex::new(Vec::new());
        let map_soft = AtomicU32::new(0);
        let deadline_hit = AtomicBool::new(false);

        let maps = &self.maps;
        let correlator = &self.correlator;
        let classifier = &mut self.classifier;
        let config = &self.config;

        let mut records = Vec::new();
        let mut correlate_elapsed = Duration::ZERO;
        thread::scope(|scope| {
            for _ in 0..worker_count {
                scope.spawn(|| {
                    loop {
                        let idx = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(&pid) = pids.get(idx) else { break };
                        if Instant::now() >= deadline {
                            deadline_hit.store(true, Ordering::Relaxed);
                            break;
                        }
                        match maps.map_process(pid) {
                            Ok(segments) => {
                                collected.lock().unwrap().extend(segments);
                            }
                            Err(e) => {
                                debug!(pid, error = %e, "memory map unreadable, skipping");
                                map_soft.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                });
            }

            let correlate_start = Instant::now();
            let index = correlator.build_index(&raw_processes);
            records = correlator.correlate(socket_scan.sockets, &index, &raw_processes);
            classifier.classify(&mut records, timestamp, config);
            correlate_elapsed = correlate_start.elapsed();
        });
        timing.correlate = correlate_elapsed;
        timing.memory_maps = phase_start.elapsed() - timing.enumerate;

        soft_errors += map_soft.load(Ordering::Relaxed);
        let partial = deadline_hit.load(Ordering::Relaxed);
        let mut segments = collected.into_inner().unwrap_or_default();
        // Worker interleaving makes arrival order arbitrary; fix it so
        // identical systems produce identical snapshots.
        segments.sort_by(|a, b| (a.pid, &a.address).cmp(&(b.pid, &b.address)));

        let phase_start = Instant::now();
        let summaries = aggregate(&records, &segments, &raw_processes);
        timing.aggregate = phase_start.elapsed();

        timing.total = started.elapsed();
        self.last_timing = Some(timing);
        self.state = TracerState::Succeeded;

        info!(
            sockets = records.len(),
            segments = segments.len(),
            processes = summaries.len(),
            soft_errors,
            partial,
            elapsed_ms = timing.total.as_millis() as u64,
            "trace complete"
        );

        Ok(TraceSnapshot {
            sockets: records,
            memory: segments,
            processes: summaries,
            timestamp,
            soft_errors,
            partial,
        })
    }
}
