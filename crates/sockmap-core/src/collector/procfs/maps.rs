//! Memory-map enumerator for `/proc/[pid]/maps`.

use std::path::Path;

use crate::collector::procfs::parser::{parse_maps_line, MapsLine};
use crate::collector::procfs::EnumerationError;
use crate::collector::traits::FileSystem;
use crate::model::{MemorySegment, SegmentKind};

/// Enumerates and classifies the virtual memory segments of one process.
pub struct MapsCollector<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> MapsCollector<F> {
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    /// Reads and classifies `/proc/[pid]/maps`.
    ///
    /// An unreadable maps file (process exited, or permission denied for
    /// another user's process) is reported as `EnumerationError`; the
    /// caller treats it as non-fatal for the snapshot. Malformed and
    /// zero-length entries are dropped silently.
    pub fn map_process(&self, pid: u32) -> Result<Vec<MemorySegment>, EnumerationError> {
        let maps_path = format!("{}/{}/maps", self.proc_path, pid);
        let content = self
            .fs
            .read_to_string(Path::new(&maps_path))
            .map_err(|e| EnumerationError::unreadable(&maps_path, e))?;

        let mut segments = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let Ok(parsed) = parse_maps_line(line) else {
                continue;
            };
            if parsed.end <= parsed.start {
                continue;
            }
            segments.push(segment_from_line(pid, &parsed));
        }
        Ok(segments)
    }
}

fn segment_from_line(pid: u32, line: &MapsLine) -> MemorySegment {
    MemorySegment {
        pid,
        address: format!("{:#x}", line.start),
        size: line.end - line.start,
        permissions: normalize_permissions(&line.perms),
        kind: classify_segment(&line.perms, &line.pathname),
        is_shared: line.perms.as_bytes().get(3) == Some(&b's'),
    }
}

/// Collapses kernel `rwxp`-style flags to the `rwx` subset the wire
/// contract carries.
fn normalize_permissions(perms: &str) -> String {
    perms
        .chars()
        .filter(|c| matches!(c, 'r' | 'w' | 'x'))
        .collect()
}

/// Classifies a mapping from its pseudo-path and permission bits.
///
/// `[heap]` and `[stack]` (including per-thread `[stack:tid]`) are named
/// by the kernel; everything executable is code; remaining writable
/// mappings (file-backed data segments and anonymous allocations) are
/// data; read-only file mappings and vdso-style regions fall into other.
fn classify_segment(perms: &str, pathname: &str) -> SegmentKind {
    if pathname == "[heap]" {
        return SegmentKind::Heap;
    }
    if pathname.starts_with("[stack") {
        return SegmentKind::Stack;
    }
    if perms.contains('x') {
        return SegmentKind::Code;
    }
    if perms.contains('w') {
        return SegmentKind::Data;
    }
    SegmentKind::Other
}
