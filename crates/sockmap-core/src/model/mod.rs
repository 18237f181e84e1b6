//! Wire-stable data model for trace snapshots.
//!
//! Field names and units here are the frozen boundary consumed by the
//! dashboard client: snake_case names, byte sizes everywhere except
//! `ProcessSummary::memory_usage` (megabytes), unix-second timestamps.
//! Enumerations are closed; values read from the kernel that do not match
//! a known variant map to an explicit unknown variant, never a free string.

use serde::{Deserialize, Serialize};

/// Transport protocol of a socket. Only TCP and UDP tables are scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Udp,
}

/// TCP connection state as reported by `/proc/net/tcp`.
///
/// `Unknown` covers kernel state codes outside the set the dashboard
/// understands (e.g. FIN_WAIT variants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SocketState {
    Established,
    Listening,
    TimeWait,
    CloseWait,
    SynSent,
    SynRecv,
    Unknown,
}

impl SocketState {
    /// Decodes the hex state column of `/proc/net/tcp`.
    pub fn from_kernel_code(code: u8) -> Self {
        match code {
            0x01 => SocketState::Established,
            0x02 => SocketState::SynSent,
            0x03 => SocketState::SynRecv,
            0x06 => SocketState::TimeWait,
            0x08 => SocketState::CloseWait,
            0x0A => SocketState::Listening,
            _ => SocketState::Unknown,
        }
    }

    /// States that are expected to resolve quickly; lingering in one of
    /// these beyond its threshold marks the socket as hung.
    pub fn is_transitional(self) -> bool {
        matches!(
            self,
            SocketState::TimeWait
                | SocketState::CloseWait
                | SocketState::SynSent
                | SocketState::SynRecv
        )
    }
}

/// One network connection endpoint joined to its owning process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct SocketRecord {
    /// Owning process id; 0 when the owner could not be resolved.
    pub pid: u32,
    /// Owning process name; "unknown" when the owner could not be resolved.
    pub process_name: String,
    pub local_address: String,
    /// Empty only for LISTENING sockets with a zero peer.
    pub remote_address: String,
    pub state: SocketState,
    pub protocol: Protocol,
    /// Best-effort attributed socket buffer memory, bytes.
    pub memory_usage: u64,
    pub is_hung: bool,
    pub has_leak: bool,
}

/// Classification of a virtual memory mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Heap,
    Stack,
    Code,
    Data,
    Other,
}

/// One virtual-memory mapping belonging to a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct MemorySegment {
    pub pid: u32,
    /// Mapping base address as a hex string, e.g. "0x7f1200000000".
    pub address: String,
    /// Mapping length in bytes, always > 0.
    pub size: u64,
    /// Subset of "rwx" in that order ("r-x" style flags collapsed).
    pub permissions: String,
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    pub is_shared: bool,
}

/// Scheduler status of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Running,
    Sleeping,
    Stopped,
    Zombie,
    Unknown,
}

impl ProcessStatus {
    /// Maps the single-character state of `/proc/[pid]/stat`.
    ///
    /// Uninterruptible sleep (`D`) and kernel idle (`I`) both render as
    /// sleeping; the dashboard's status enum has no finer distinction.
    pub fn from_stat_char(c: char) -> Self {
        match c {
            'R' => ProcessStatus::Running,
            'S' | 'D' | 'I' => ProcessStatus::Sleeping,
            'T' | 't' => ProcessStatus::Stopped,
            'Z' => ProcessStatus::Zombie,
            _ => ProcessStatus::Unknown,
        }
    }
}

/// Per-process rollup of sockets and memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct ProcessSummary {
    pub pid: u32,
    pub name: String,
    /// Count of `SocketRecord`s owned by this pid in the same snapshot.
    pub socket_count: u32,
    /// Sum of this pid's segment sizes, megabytes.
    pub memory_usage: f64,
    /// 0–100.
    pub cpu_usage: f64,
    pub status: ProcessStatus,
}

/// One immutable point-in-time capture.
///
/// All three collections describe the same instant: `timestamp` is fixed
/// once when the scan starts and later-arriving sub-scan data still carries
/// it. Nothing is mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "api", derive(utoipa::ToSchema))]
pub struct TraceSnapshot {
    pub sockets: Vec<SocketRecord>,
    pub memory: Vec<MemorySegment>,
    pub processes: Vec<ProcessSummary>,
    /// Unix seconds, fixed at the start of the scan.
    pub timestamp: i64,
    /// Count of per-resource enumeration failures that were skipped.
    pub soft_errors: u32,
    /// True when the trace deadline elapsed and in-flight memory scans
    /// were abandoned.
    pub partial: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_state_kernel_codes() {
        assert_eq!(SocketState::from_kernel_code(0x01), SocketState::Established);
        assert_eq!(SocketState::from_kernel_code(0x06), SocketState::TimeWait);
        assert_eq!(SocketState::from_kernel_code(0x0A), SocketState::Listening);
        // FIN_WAIT1 is outside the closed set
        assert_eq!(SocketState::from_kernel_code(0x04), SocketState::Unknown);
    }

    #[test]
    fn test_transitional_states() {
        assert!(SocketState::TimeWait.is_transitional());
        assert!(SocketState::CloseWait.is_transitional());
        assert!(!SocketState::Established.is_transitional());
        assert!(!SocketState::Listening.is_transitional());
    }

    #[test]
    fn test_process_status_chars() {
        assert_eq!(ProcessStatus::from_stat_char('R'), ProcessStatus::Running);
        assert_eq!(ProcessStatus::from_stat_char('D'), ProcessStatus::Sleeping);
        assert_eq!(ProcessStatus::from_stat_char('Z'), ProcessStatus::Zombie);
        assert_eq!(ProcessStatus::from_stat_char('X'), ProcessStatus::Unknown);
    }

    #[test]
    fn test_wire_field_names() {
        let seg = MemorySegment {
            pid: 42,
            address: "0x7f0000000000".to_string(),
            size: 4096,
            permissions: "rw".to_string(),
            kind: SegmentKind::Heap,
            is_shared: false,
        };
        let json = serde_json::to_value(&seg).unwrap();
        assert_eq!(json["type"], "heap");
        assert_eq!(json["is_shared"], false);

        let sock = SocketRecord {
            pid: 42,
            process_name: "nginx".to_string(),
            local_address: "127.0.0.1:80".to_string(),
            remote_address: String::new(),
            state: SocketState::Listening,
            protocol: Protocol::Tcp,
            memory_usage: 1024,
            is_hung: false,
            has_leak: false,
        };
        let json = serde_json::to_value(&sock).unwrap();
        assert_eq!(json["process_name"], "nginx");
        assert_eq!(json["state"], "LISTENING");
        assert_eq!(json["protocol"], "TCP");
        assert_eq!(json["is_hung"], false);
        assert_eq!(json["has_leak"], false);
    }
}
