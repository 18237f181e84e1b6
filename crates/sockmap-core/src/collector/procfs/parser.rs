//! Parsers for `/proc` filesystem files.
//!
//! These are pure functions that parse the content of various `/proc`
//! files into structured data. They are designed to be easily testable
//! with string inputs.

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// One parsed entry of `/proc/net/tcp` or `/proc/net/udp`.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketLine {
    pub local_addr: u32,
    pub local_port: u16,
    pub remote_addr: u32,
    pub remote_port: u16,
    pub state_code: u8,
    pub inode: u64,
}

/// Parses one data line of a kernel socket table.
///
/// Format (whitespace-separated, after the header line):
/// `sl local_address rem_address st tx_queue:rx_queue tr:tm->when retrnsmt uid timeout inode ...`
/// Addresses are little-endian hex IPv4, ports are hex.
pub fn parse_socket_line(line: &str) -> Result<SocketLine, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 10 {
        return Err(ParseError::new(format!(
            "not enough fields in socket line: expected 10+, got {}",
            fields.len()
        )));
    }

    let (local_addr, local_port) = parse_hex_endpoint(fields[1])?;
    let (remote_addr, remote_port) = parse_hex_endpoint(fields[2])?;
    let state_code = u8::from_str_radix(fields[3], 16)
        .map_err(|_| ParseError::new(format!("invalid state code {:?}", fields[3])))?;
    let inode: u64 = fields[9]
        .parse()
        .map_err(|_| ParseError::new(format!("invalid inode {:?}", fields[9])))?;

    Ok(SocketLine {
        local_addr,
        local_port,
        remote_addr,
        remote_port,
        state_code,
        inode,
    })
}

/// Parses one `ADDR:PORT` endpoint in kernel hex notation.
///
/// IPv6 endpoints (32 hex digits) are rejected; only the IPv4 tables are
/// scanned.
fn parse_hex_endpoint(s: &str) -> Result<(u32, u16), ParseError> {
    let (addr_hex, port_hex) = s
        .split_once(':')
        .ok_or_else(|| ParseError::new(format!("missing ':' in endpoint {:?}", s)))?;
    if addr_hex.len() != 8 {
        return Err(ParseError::new(format!(
            "unexpected address width {} in {:?}",
            addr_hex.len(),
            s
        )));
    }
    let addr = u32::from_str_radix(addr_hex, 16)
        .map_err(|_| ParseError::new(format!("invalid address {:?}", addr_hex)))?;
    let port = u16::from_str_radix(port_hex, 16)
        .map_err(|_| ParseError::new(format!("invalid port {:?}", port_hex)))?;
    Ok((addr, port))
}

/// Formats a kernel little-endian IPv4 address and port as `a.b.c.d:port`.
pub fn format_ipv4_endpoint(addr: u32, port: u16) -> String {
    format!(
        "{}.{}.{}.{}:{}",
        addr & 0xFF,
        (addr >> 8) & 0xFF,
        (addr >> 16) & 0xFF,
        (addr >> 24) & 0xFF,
        port
    )
}

/// Subset of `/proc/[pid]/stat` the tracer needs.
#[derive(Debug, Clone, Default)]
pub struct ProcStat {
    pub pid: u32,
    pub comm: String,
    pub state: char,
    pub utime: u64,
    pub stime: u64,
    pub starttime: u64,
}

/// Parses `/proc/[pid]/stat` content.
///
/// The format is tricky because the comm field can contain spaces and
/// parentheses. Format: `pid (comm) state ppid ... utime stime ... starttime ...`
pub fn parse_proc_stat(content: &str) -> Result<ProcStat, ParseError> {
    let content = content.trim();

    let open_paren = content
        .find('(')
        .ok_or_else(|| ParseError::new("missing '(' in stat"))?;
    let close_paren = content
        .rfind(')')
        .ok_or_else(|| ParseError::new("missing ')' in stat"))?;
    if close_paren <= open_paren {
        return Err(ParseError::new("invalid parentheses in stat"));
    }

    let pid: u32 = content[..open_paren]
        .trim()
        .parse()
        .map_err(|_| ParseError::new("invalid pid"))?;
    let comm = content[open_paren + 1..close_paren].to_string();

    let fields: Vec<&str> = content[close_paren + 1..].split_whitespace().collect();
    if fields.len() < 20 {
        return Err(ParseError::new(format!(
            "not enough fields in stat: expected 20+, got {}",
            fields.len()
        )));
    }

    let parse_u64 = |idx: usize, name: &str| -> Result<u64, ParseError> {
        fields[idx]
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {}", name)))
    };

    Ok(ProcStat {
        pid,
        comm,
        state: fields[0].chars().next().unwrap_or('?'),
        utime: parse_u64(11, "utime")?,
        stime: parse_u64(12, "stime")?,
        starttime: parse_u64(19, "starttime")?,
    })
}

/// Memory counters from `/proc/[pid]/status`.
#[derive(Debug, Clone, Default)]
pub struct ProcStatusMem {
    /// Resident set size, kB.
    pub vm_rss: u64,
    /// Private data segment size, kB.
    pub vm_data: u64,
}

/// Parses the `VmRSS`/`VmData` lines of `/proc/[pid]/status`.
///
/// Kernel threads and zombies have no Vm* lines; those parse to zeros.
pub fn parse_proc_status_mem(content: &str) -> ProcStatusMem {
    let mut mem = ProcStatusMem::default();
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            mem.vm_rss = parse_kb_value(rest);
        } else if let Some(rest) = line.strip_prefix("VmData:") {
            mem.vm_data = parse_kb_value(rest);
        }
    }
    mem
}

fn parse_kb_value(rest: &str) -> u64 {
    rest.split_whitespace()
        .next()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

/// One parsed line of `/proc/[pid]/maps`.
#[derive(Debug, Clone, PartialEq)]
pub struct MapsLine {
    pub start: u64,
    pub end: u64,
    /// Raw four-character kernel flags, e.g. `rw-s`.
    pub perms: String,
    /// Backing path or pseudo-path (`[heap]`, `[stack]`); empty for
    /// anonymous mappings.
    pub pathname: String,
}

/// Parses one line of `/proc/[pid]/maps`.
///
/// Format: `start-end perms offset dev inode [pathname]`.
pub fn parse_maps_line(line: &str) -> Result<MapsLine, ParseError> {
    let mut fields = line.split_whitespace();
    let range = fields
        .next()
        .ok_or_else(|| ParseError::new("empty maps line"))?;
    let perms = fields
        .next()
        .ok_or_else(|| ParseError::new("missing perms in maps line"))?;
    // offset, dev, inode
    let _ = fields.next();
    let _ = fields.next();
    let inode = fields.next();
    if inode.is_none() {
        return Err(ParseError::new("missing inode in maps line"));
    }
    let pathname = fields.collect::<Vec<_>>().join(" ");

    let (start_hex, end_hex) = range
        .split_once('-')
        .ok_or_else(|| ParseError::new(format!("invalid range {:?}", range)))?;
    let start = u64::from_str_radix(start_hex, 16)
        .map_err(|_| ParseError::new(format!("invalid start address {:?}", start_hex)))?;
    let end = u64::from_str_radix(end_hex, 16)
        .map_err(|_| ParseError::new(format!("invalid end address {:?}", end_hex)))?;

    Ok(MapsLine {
        start,
        end,
        perms: perms.to_string(),
        pathname,
    })
}

/// Parses `/proc/uptime`, returning system uptime in seconds.
pub fn parse_uptime(content: &str) -> Result<f64, ParseError> {
    content
        .split_whitespace()
        .next()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ParseError::new("invalid uptime"))
}
