//! Per-process rollup of sockets and memory segments.

use std::collections::HashMap;

use crate::collector::procfs::RawProcess;
use crate::model::{MemorySegment, ProcessSummary, SocketRecord};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Rolls correlated sockets and memory segments up into per-process
/// summaries.
///
/// Pure reduction: the same inputs always produce the same output, sorted
/// by pid. Every raw process appears exactly once, even with zero sockets
/// or no readable memory map; socket records attributed to pid 0
/// (unresolved owners) are not counted against any process.
pub fn aggregate(
    sockets: &[SocketRecord],
    segments: &[MemorySegment],
    processes: &[RawProcess],
) -> Vec<ProcessSummary> {
    let mut socket_counts: HashMap<u32, u32> = HashMap::new();
    for socket in sockets {
        if socket.pid != 0 {
            *socket_counts.entry(socket.pid).or_default() += 1;
        }
    }

    let mut segment_bytes: HashMap<u32, u64> = HashMap::new();
    for segment in segments {
        *segment_bytes.entry(segment.pid).or_default() += segment.size;
    }

    let mut summaries: Vec<ProcessSummary> = processes
        .iter()
        .map(|proc| ProcessSummary {
            pid: proc.pid,
            name: proc.name.clone(),
            socket_count: socket_counts.get(&proc.pid).copied().unwrap_or(0),
            memory_usage: segment_bytes.get(&proc.pid).copied().unwrap_or(0) as f64
                / BYTES_PER_MB,
            cpu_usage: proc.cpu_usage,
            status: proc.status,
        })
        .collect();

    summaries.sort_by_key(|s| s.pid);
    summaries
}
