//! Joins raw sockets to their owning processes.
//!
//! Ownership is resolved through the kernel's fd table: every open socket
//! appears as a `socket:[inode]` symlink under `/proc/[pid]/fd/`, so one
//! pass over the fd tables of all live processes yields an inode → owner
//! reverse index. A socket whose inode resolves to no living process
//! (the process exited between enumeration passes, or the entry is an
//! orphaned TIME_WAIT) is still emitted with pid 0 and name "unknown".
//! Sockets are the primary unit of interest and are never dropped.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use crate::collector::procfs::{RawProcess, RawSocket};
use crate::collector::traits::FileSystem;
use crate::model::SocketRecord;

/// Fixed per-socket kernel overhead, bytes. Used when no owner (and
/// therefore no data segment) can be attributed.
const BASE_SOCKET_OVERHEAD: u64 = 1024;

/// Reverse index from socket inode to owning process.
#[derive(Debug, Default)]
pub struct OwnerIndex {
    by_inode: HashMap<u64, (u32, String)>,
}

impl OwnerIndex {
    pub fn lookup(&self, inode: u64) -> Option<&(u32, String)> {
        self.by_inode.get(&inode)
    }

    pub fn len(&self) -> usize {
        self.by_inode.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_inode.is_empty()
    }
}

/// Builds the ownership index and performs the socket-process join.
pub struct Correlator<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> Correlator<F> {
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    /// Walks the fd tables of the given processes and collects every
    /// `socket:[inode]` target.
    ///
    /// Unreadable fd directories (permission, process exit) are skipped;
    /// a socket held by such a process simply stays unresolved.
    pub fn build_index(&self, processes: &[RawProcess]) -> OwnerIndex {
        let mut index = OwnerIndex::default();

        for proc in processes {
            let fd_dir = format!("{}/{}/fd", self.proc_path, proc.pid);
            let entries = match self.fs.read_dir(Path::new(&fd_dir)) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(pid = proc.pid, error = %e, "fd table unreadable, skipping");
                    continue;
                }
            };
            for entry in entries {
                let Ok(target) = self.fs.read_link(&entry) else {
                    continue;
                };
                if let Some(inode) = parse_socket_inode(&target) {
                    index.by_inode.insert(inode, (proc.pid, proc.name.clone()));
                }
            }
        }

        index
    }

    /// Joins raw sockets to owners, producing `SocketRecord`s without
    /// classification flags (those are added by the classifier).
    ///
    /// Output order is unspecified by contract; this implementation keeps
    /// enumeration order.
    pub fn correlate(
        &self,
        sockets: Vec<RawSocket>,
        index: &OwnerIndex,
        processes: &[RawProcess],
    ) -> Vec<SocketRecord> {
        let vm_data_by_pid: HashMap<u32, u64> = processes
            .iter()
            .map(|p| (p.pid, p.vm_data_kb))
            .collect();

        sockets
            .into_iter()
            .map(|raw| {
                let (pid, process_name) = match index.lookup(raw.inode) {
                    Some((pid, name)) => (*pid, name.clone()),
                    None => (0, "unknown".to_string()),
                };
                let memory_usage = attributed_socket_memory(
                    vm_data_by_pid.get(&pid).copied().unwrap_or(0),
                );
                SocketRecord {
                    pid,
                    process_name,
                    local_address: raw.local_address,
                    remote_address: raw.remote_address,
                    state: raw.state,
                    protocol: raw.protocol,
                    memory_usage,
                    is_hung: false,
                    has_leak: false,
                }
            })
            .collect()
    }
}

/// Extracts the inode from a `socket:[12345]` fd link target.
fn parse_socket_inode(target: &str) -> Option<u64> {
    target
        .strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// Best-effort socket buffer attribution: a fixed fraction (1%) of the
/// owner's private data segment, floored at the base kernel overhead.
fn attributed_socket_memory(vm_data_kb: u64) -> u64 {
    (vm_data_kb * 1024 / 100).max(BASE_SOCKET_OVERHEAD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;
    use crate::collector::procfs::{ProcessCollector, SocketTableCollector};
    use crate::model::SocketState;

    fn scan_typical() -> (Vec<RawSocket>, Vec<RawProcess>, MockFs) {
        let fs = MockFs::typical_system();
        let sockets = SocketTableCollector::new(fs.clone(), "/proc")
            .list_sockets()
            .unwrap()
            .sockets;
        let processes = ProcessCollector::new(fs.clone(), "/proc")
            .collect_all()
            .unwrap()
            .processes;
        (sockets, processes, fs)
    }

    #[test]
    fn test_parse_socket_inode() {
        assert_eq!(parse_socket_inode("socket:[10001]"), Some(10001));
        assert_eq!(parse_socket_inode("/dev/null"), None);
        assert_eq!(parse_socket_inode("pipe:[42]"), None);
        assert_eq!(parse_socket_inode("socket:[abc]"), None);
    }

    #[test]
    fn test_build_index() {
        let (_, processes, fs) = scan_typical();
        let correlator = Correlator::new(fs, "/proc");
        let index = correlator.build_index(&processes);

        // sshd owns tcp 10001 + udp 10004, nginx owns 10002 + 10003
        assert_eq!(index.len(), 4);
        assert_eq!(index.lookup(10001).unwrap().1, "sshd");
        assert_eq!(index.lookup(10002).unwrap().1, "nginx");
        assert!(index.lookup(99999).is_none());
    }

    #[test]
    fn test_correlate_resolves_owners() {
        let (sockets, processes, fs) = scan_typical();
        let correlator = Correlator::new(fs, "/proc");
        let index = correlator.build_index(&processes);
        let records = correlator.correlate(sockets, &index, &processes);

        assert_eq!(records.len(), 5);

        let listener = records
            .iter()
            .find(|r| r.state == SocketState::Listening && r.local_address == "127.0.0.1:22")
            .unwrap();
        assert_eq!(listener.pid, 100);
        assert_eq!(listener.process_name, "sshd");

        // Orphaned TIME_WAIT socket is kept with an unknown owner
        let orphan = records
            .iter()
            .find(|r| r.state == SocketState::TimeWait)
            .unwrap();
        assert_eq!(orphan.pid, 0);
        assert_eq!(orphan.process_name, "unknown");
        assert_eq!(orphan.memory_usage, BASE_SOCKET_OVERHEAD);
    }

    #[test]
    fn test_memory_attribution_from_owner_data_segment() {
        let (sockets, processes, fs) = scan_typical();
        let correlator = Correlator::new(fs, "/proc");
        let index = correlator.build_index(&processes);
        let records = correlator.correlate(sockets, &index, &processes);

        // nginx VmData is 10240 kB -> 1% of 10 MiB
        let nginx = records
            .iter()
            .find(|r| r.process_name == "nginx")
            .unwrap();
        assert_eq!(nginx.memory_usage, 10240 * 1024 / 100);
    }

    #[test]
    fn test_flags_start_unset() {
        let (sockets, processes, fs) = scan_typical();
        let correlator = Correlator::new(fs, "/proc");
        let index = correlator.build_index(&processes);
        for record in correlator.correlate(sockets, &index, &processes) {
            assert!(!record.is_hung);
            assert!(!record.has_leak);
        }
    }
}
