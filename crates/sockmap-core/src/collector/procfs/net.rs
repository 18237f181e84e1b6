//! Socket table enumerator for `/proc/net/tcp` and `/proc/net/udp`.

use std::path::Path;

use tracing::debug;

use crate::collector::procfs::parser::{format_ipv4_endpoint, parse_socket_line};
use crate::collector::procfs::EnumerationError;
use crate::collector::traits::FileSystem;
use crate::model::{Protocol, SocketState};

/// One socket table entry before process correlation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSocket {
    pub protocol: Protocol,
    pub local_address: String,
    /// Empty for LISTENING sockets with a zero peer.
    pub remote_address: String,
    pub state: SocketState,
    /// Kernel socket inode, the correlation key; 0 for orphaned entries.
    pub inode: u64,
}

/// Result of a socket table scan: entries plus skipped-line count.
#[derive(Debug)]
pub struct SocketScan {
    pub sockets: Vec<RawSocket>,
    pub soft_errors: u32,
}

/// Enumerates kernel socket tables.
pub struct SocketTableCollector<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> SocketTableCollector<F> {
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    /// Path of the primary socket table; its readability is the health
    /// criterion for the whole tracer.
    pub fn primary_table_path(&self) -> String {
        format!("{}/net/tcp", self.proc_path)
    }

    /// Reads both socket tables.
    ///
    /// The TCP table is primary: failure to read it is fatal. The UDP
    /// table is best-effort; an unreadable UDP table or a malformed line
    /// in either table only increments the soft-error count.
    pub fn list_sockets(&self) -> Result<SocketScan, EnumerationError> {
        let mut soft_errors = 0u32;
        let mut sockets = Vec::new();

        let tcp_path = self.primary_table_path();
        let tcp_content = self
            .fs
            .read_to_string(Path::new(&tcp_path))
            .map_err(|e| EnumerationError::unreadable(&tcp_path, e))?;
        self.parse_table(&tcp_content, Protocol::Tcp, &mut sockets, &mut soft_errors);

        let udp_path = format!("{}/net/udp", self.proc_path);
        match self.fs.read_to_string(Path::new(&udp_path)) {
            Ok(content) => {
                self.parse_table(&content, Protocol::Udp, &mut sockets, &mut soft_errors);
            }
            Err(e) => {
                debug!(path = %udp_path, error = %e, "udp table unreadable, skipping");
                soft_errors += 1;
            }
        }

        Ok(SocketScan {
            sockets,
            soft_errors,
        })
    }

    fn parse_table(
        &self,
        content: &str,
        protocol: Protocol,
        out: &mut Vec<RawSocket>,
        soft_errors: &mut u32,
    ) {
        // First line is the column header
        for line in content.lines().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            match parse_socket_line(line) {
                Ok(parsed) => {
                    let state = match protocol {
                        Protocol::Tcp => SocketState::from_kernel_code(parsed.state_code),
                        // Bound datagram sockets report TCP_CLOSE (0x07)
                        Protocol::Udp if parsed.state_code == 0x07 => SocketState::Listening,
                        Protocol::Udp => SocketState::from_kernel_code(parsed.state_code),
                    };
                    let remote_address = if state == SocketState::Listening
                        && parsed.remote_addr == 0
                        && parsed.remote_port == 0
                    {
                        String::new()
                    } else {
                        format_ipv4_endpoint(parsed.remote_addr, parsed.remote_port)
                    };
                    out.push(RawSocket {
                        protocol,
                        local_address: format_ipv4_endpoint(parsed.local_addr, parsed.local_port),
                        remote_address,
                        state,
                        inode: parsed.inode,
                    });
                }
                Err(e) => {
                    debug!(?protocol, error = %e, "skipping malformed socket line");
                    *soft_errors += 1;
                }
            }
        }
    }
}
