//! Process enumerator for `/proc/[pid]/` identity and counters.

use std::path::Path;

use tracing::debug;

use crate::collector::procfs::parser::{
    parse_proc_stat, parse_proc_status_mem, parse_uptime,
};
use crate::collector::procfs::EnumerationError;
use crate::collector::traits::FileSystem;
use crate::model::ProcessStatus;

/// Clock ticks per second (USER_HZ). Standard value for Linux.
const CLK_TCK: u64 = 100;

/// One process sample before aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProcess {
    pub pid: u32,
    pub name: String,
    pub status: ProcessStatus,
    /// Resident set size, kB.
    pub vm_rss_kb: u64,
    /// Private data segment size, kB. Basis for socket-buffer attribution.
    pub vm_data_kb: u64,
    /// Lifetime-average CPU utilization, 0–100.
    pub cpu_usage: f64,
}

/// Result of a full process scan: samples plus skipped-process count.
pub struct ProcessScan {
    pub processes: Vec<RawProcess>,
    pub soft_errors: u32,
}

/// Collects process information from `/proc/[pid]/` files.
pub struct ProcessCollector<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> ProcessCollector<F> {
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    /// Reads system uptime, used to derive per-process CPU utilization.
    fn uptime_secs(&self) -> f64 {
        let path = format!("{}/uptime", self.proc_path);
        self.fs
            .read_to_string(Path::new(&path))
            .ok()
            .and_then(|c| parse_uptime(&c).ok())
            .unwrap_or(0.0)
    }

    /// Collects a single process sample.
    ///
    /// A missing or unreadable stat file means the process exited between
    /// directory listing and collection.
    pub fn collect_process(&self, pid: u32, uptime: f64) -> Result<RawProcess, EnumerationError> {
        let proc_dir = format!("{}/{}", self.proc_path, pid);

        let stat_path = format!("{}/stat", proc_dir);
        let stat_content = self
            .fs
            .read_to_string(Path::new(&stat_path))
            .map_err(|_| EnumerationError::ProcessGone(pid))?;
        let stat = parse_proc_stat(&stat_content).map_err(|e| EnumerationError::Parse {
            resource: stat_path,
            message: e.message,
        })?;

        // status may be unreadable for zombies; fall back to zero counters
        let status_path = format!("{}/status", proc_dir);
        let mem = self
            .fs
            .read_to_string(Path::new(&status_path))
            .map(|c| parse_proc_status_mem(&c))
            .unwrap_or_default();

        let comm_path = format!("{}/comm", proc_dir);
        let name = self
            .fs
            .read_to_string(Path::new(&comm_path))
            .map(|c| c.trim().to_string())
            .unwrap_or_else(|_| stat.comm.clone());

        Ok(RawProcess {
            pid,
            name,
            status: ProcessStatus::from_stat_char(stat.state),
            vm_rss_kb: mem.vm_rss,
            vm_data_kb: mem.vm_data,
            cpu_usage: lifetime_cpu_percent(stat.utime + stat.stime, stat.starttime, uptime),
        })
    }

    /// Collects all processes listed under the proc root.
    ///
    /// Processes that disappear during collection are skipped and counted;
    /// an unreadable proc root yields an `EnumerationError` the caller may
    /// treat as non-fatal.
    pub fn collect_all(&self) -> Result<ProcessScan, EnumerationError> {
        let proc_path = Path::new(&self.proc_path);
        let entries = self
            .fs
            .read_dir(proc_path)
            .map_err(|e| EnumerationError::unreadable(&self.proc_path, e))?;

        let uptime = self.uptime_secs();
        let mut processes = Vec::new();
        let mut soft_errors = 0u32;

        for entry in entries {
            let Some(pid) = entry
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };
            match self.collect_process(pid, uptime) {
                Ok(info) => processes.push(info),
                Err(EnumerationError::ProcessGone(_)) => {
                    soft_errors += 1;
                }
                Err(e) => {
                    debug!(pid, error = %e, "failed to collect process");
                    soft_errors += 1;
                }
            }
        }

        Ok(ProcessScan {
            processes,
            soft_errors,
        })
    }
}

/// CPU utilization averaged over the process lifetime, from one point-in-time
/// sample: cumulative ticks divided by process age, clamped to 0–100.
fn lifetime_cpu_percent(cpu_ticks: u64, starttime_ticks: u64, uptime: f64) -> f64 {
    let age = uptime - starttime_ticks as f64 / CLK_TCK as f64;
    if age <= 0.0 {
        return 0.0;
    }
    let busy = cpu_ticks as f64 / CLK_TCK as f64;
    (busy / age * 100.0).clamp(0.0, 100.0)
}
