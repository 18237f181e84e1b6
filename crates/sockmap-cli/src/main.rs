//! sockmap - socket, memory, and process tracer CLI.
//!
//! Runs one trace and prints it, or keeps tracing on an interval until
//! interrupted. Output is a human-readable table by default, JSON with
//! `--json`.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use clap::Parser;
use tracing::{error, warn, Level};
use tracing_subscriber::EnvFilter;

#[cfg(target_os = "linux")]
use sockmap_core::collector::RealFs;
#[cfg(not(target_os = "linux"))]
use sockmap_core::collector::MockFs;
use sockmap_core::config::TracerConfig;
use sockmap_core::model::{SocketState, TraceSnapshot};
use sockmap_core::tracer::Tracer;

/// Socket, memory, and process tracer.
#[derive(Parser)]
#[command(name = "sockmap", about = "Socket, memory, and process tracer", version)]
struct Args {
    /// Trace interval in seconds. 0 runs a single trace and exits.
    #[arg(short, long, default_value = "0")]
    interval: u64,

    /// Path to /proc filesystem (for testing/mocking).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Print the full snapshot as JSON instead of tables.
    #[arg(long)]
    json: bool,

    /// Also print per-process memory segments (table output only).
    #[arg(long)]
    memory: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("sockmap={}", level).parse().unwrap())
        .add_directive(format!("sockmap_core={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let config = TracerConfig::with_proc_path(&args.proc_path);
    let mut tracer = Tracer::new(make_fs(), config);

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let interval = Duration::from_secs(args.interval);
    loop {
        match tracer.trace() {
            Ok(snapshot) => {
                if args.json {
                    match serde_json::to_string_pretty(&snapshot) {
                        Ok(out) => println!("{}", out),
                        Err(e) => error!("Failed to serialize snapshot: {}", e),
                    }
                } else {
                    print_snapshot(&snapshot, args.memory);
                }
            }
            Err(e) => {
                error!("Trace failed: {}", e);
                if args.interval == 0 {
                    process::exit(1);
                }
            }
        }

        if args.interval == 0 || !running.load(Ordering::SeqCst) {
            break;
        }

        // Sleep with periodic checks for the shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
        if !running.load(Ordering::SeqCst) {
            break;
        }
    }
}

#[cfg(target_os = "linux")]
fn make_fs() -> RealFs {
    RealFs::new()
}

#[cfg(not(target_os = "linux"))]
fn make_fs() -> MockFs {
    MockFs::typical_system()
}

fn print_snapshot(snapshot: &TraceSnapshot, with_memory: bool) {
    let when = Utc
        .timestamp_opt(snapshot.timestamp, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| snapshot.timestamp.to_string());

    println!("Trace at {}{}", when, if snapshot.partial { " (partial)" } else { "" });
    if snapshot.soft_errors > 0 {
        println!("  {} resources skipped during the scan", snapshot.soft_errors);
    }
    println!();

    println!(
        "{:<5} {:<22} {:<22} {:<12} {:>7} {:<16} {:>10}  FLAGS",
        "PROTO", "LOCAL", "REMOTE", "STATE", "PID", "PROCESS", "MEM"
    );
    for socket in &snapshot.sockets {
        println!(
            "{:<5} {:<22} {:<22} {:<12} {:>7} {:<16} {:>10}  {}",
            format!("{:?}", socket.protocol).to_uppercase(),
            socket.local_address,
            if socket.remote_address.is_empty() {
                "*"
            } else {
                socket.remote_address.as_str()
            },
            state_label(socket.state),
            socket.pid,
            socket.process_name,
            format_size(socket.memory_usage),
            socket_flags(socket.is_hung, socket.has_leak),
        );
    }

    println!();
    println!(
        "{:>7} {:<16} {:>8} {:>10} {:>7}  {:<8}",
        "PID", "PROCESS", "SOCKETS", "MEM(MB)", "CPU%", "STATUS"
    );
    for proc in &snapshot.processes {
        println!(
            "{:>7} {:<16} {:>8} {:>10.1} {:>7.1}  {:?}",
            proc.pid, proc.name, proc.socket_count, proc.memory_usage, proc.cpu_usage, proc.status
        );
    }

    if with_memory {
        println!();
        println!(
            "{:>7} {:<18} {:>12} {:<5} {:<7} SHARED",
            "PID", "ADDRESS", "SIZE", "PERMS", "TYPE"
        );
        for seg in &snapshot.memory {
            println!(
                "{:>7} {:<18} {:>12} {:<5} {:<7} {}",
                seg.pid,
                seg.address,
                format_size(seg.size),
                seg.permissions,
                format!("{:?}", seg.kind).to_lowercase(),
                if seg.is_shared { "yes" } else { "no" },
            );
        }
    }
}

fn state_label(state: SocketState) -> &'static str {
    match state {
        SocketState::Established => "ESTABLISHED",
        SocketState::Listening => "LISTENING",
        SocketState::TimeWait => "TIME_WAIT",
        SocketState::CloseWait => "CLOSE_WAIT",
        SocketState::SynSent => "SYN_SENT",
        SocketState::SynRecv => "SYN_RECV",
        SocketState::Unknown => "UNKNOWN",
    }
}

fn socket_flags(is_hung: bool, has_leak: bool) -> String {
    match (is_hung, has_leak) {
        (true, true) => "hung,leak".to_string(),
        (true, false) => "hung".to_string(),
        (false, true) => "leak".to_string(),
        (false, false) => "-".to_string(),
    }
}

/// Formats bytes as human-readable size string.
fn format_size(bytes: u64) -> String {
    const GB: u64 = 1024 * 1024 * 1024;
    const MB: u64 = 1024 * 1024;
    const KB: u64 = 1024;

    if bytes >= GB {
        format!("{:.1}G", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1}M", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1}K", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_size_scales() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(2048), "2.0K");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0M");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.0G");
    }

    #[test]
    fn socket_flags_render() {
        assert_eq!(socket_flags(false, false), "-");
        assert_eq!(socket_flags(true, false), "hung");
        assert_eq!(socket_flags(false, true), "leak");
        assert_eq!(socket_flags(true, true), "hung,leak");
    }

    #[test]
    fn state_labels_match_wire_names() {
        assert_eq!(state_label(SocketState::Established), "ESTABLISHED");
        assert_eq!(state_label(SocketState::TimeWait), "TIME_WAIT");
        assert_eq!(state_label(SocketState::Unknown), "UNKNOWN");
    }
}
