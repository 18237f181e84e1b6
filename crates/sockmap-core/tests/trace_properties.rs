//! End-to-end properties of a trace snapshot, exercised through the
//! public API against mock systems.

use sockmap_core::collector::MockFs;
use sockmap_core::config::TracerConfig;
use sockmap_core::model::{SocketState, TraceSnapshot};
use sockmap_core::tracer::{TraceError, Tracer, TracerState};

fn snapshot_of(fs: MockFs) -> TraceSnapshot {
    Tracer::new(fs, TracerConfig::default()).trace().unwrap()
}

#[test]
fn socket_counts_are_consistent_with_socket_list() {
    let snapshot = snapshot_of(MockFs::typical_system());

    for summary in &snapshot.processes {
        let owned = snapshot
            .sockets
            .iter()
            .filter(|s| s.pid == summary.pid)
            .count() as u32;
        assert_eq!(
            summary.socket_count, owned,
            "socket_count mismatch for pid {}",
            summary.pid
        );
    }
}

#[test]
fn process_memory_is_the_sum_of_its_segments() {
    let snapshot = snapshot_of(MockFs::typical_system());

    for summary in &snapshot.processes {
        let bytes: u64 = snapshot
            .memory
            .iter()
            .filter(|seg| seg.pid == summary.pid)
            .map(|seg| seg.size)
            .sum();
        let mb = bytes as f64 / (1024.0 * 1024.0);
        assert!(
            (summary.memory_usage - mb).abs() < 1e-9,
            "memory mismatch for pid {}: {} vs {}",
            summary.pid,
            summary.memory_usage,
            mb
        );
    }
}

#[test]
fn orphaned_sockets_are_kept_with_unknown_owner() {
    let snapshot = snapshot_of(MockFs::typical_system());

    let orphan = snapshot
        .sockets
        .iter()
        .find(|s| s.state == SocketState::TimeWait)
        .expect("orphaned TIME_WAIT entry present");
    assert_eq!(orphan.pid, 0);
    assert_eq!(orphan.process_name, "unknown");

    // pid 0 never appears in the process summaries
    assert!(snapshot.processes.iter().all(|p| p.pid != 0));
}

#[test]
fn empty_remote_address_only_on_listeners() {
    let snapshot = snapshot_of(MockFs::typical_system());

    for socket in &snapshot.sockets {
        if socket.remote_address.is_empty() {
            assert_eq!(socket.state, SocketState::Listening);
        }
    }
}

#[test]
fn unreadable_map_degrades_to_partial_data() {
    let mut tracer = Tracer::new(MockFs::with_unreadable_maps(200), TracerConfig::default());
    let snapshot = tracer.trace().unwrap();

    assert!(snapshot.soft_errors >= 1);
    assert!(snapshot.memory.iter().all(|s| s.pid != 200));
    // The process and its sockets survive the degraded map scan
    assert!(snapshot.processes.iter().any(|p| p.pid == 200));
    assert!(snapshot.sockets.iter().any(|s| s.pid == 200));
}

#[test]
fn missing_socket_table_fails_the_trace() {
    let mut tracer = Tracer::new(MockFs::without_socket_table(), TracerConfig::default());

    assert!(matches!(
        tracer.trace(),
        Err(TraceError::SocketTable(_))
    ));
    assert_eq!(tracer.state(), TracerState::Failed);

    // A subsequent trace against a healthy system recovers
    let mut tracer = Tracer::new(MockFs::typical_system(), TracerConfig::default());
    assert!(tracer.trace().is_ok());
    assert_eq!(tracer.state(), TracerState::Succeeded);
}

#[test]
fn repeated_traces_of_a_static_system_agree() {
    let mut tracer = Tracer::new(MockFs::typical_system(), TracerConfig::default());
    let first = tracer.trace().unwrap();
    let second = tracer.trace().unwrap();

    assert_eq!(first.sockets, second.sockets);
    assert_eq!(first.memory, second.memory);
    assert_eq!(first.processes, second.processes);
}

#[test]
fn snapshot_serializes_with_wire_field_names() {
    let snapshot = snapshot_of(MockFs::typical_system());
    let json = serde_json::to_value(&snapshot).unwrap();

    assert!(json["timestamp"].is_i64());
    assert!(json["sockets"].is_array());
    assert!(json["memory"].is_array());
    assert!(json["processes"].is_array());

    let socket = &json["sockets"][0];
    for field in [
        "pid",
        "process_name",
        "local_address",
        "remote_address",
        "state",
        "protocol",
        "memory_usage",
        "is_hung",
        "has_leak",
    ] {
        assert!(!socket[field].is_null(), "missing socket field {}", field);
    }

    let segment = &json["memory"][0];
    for field in ["pid", "address", "size", "permissions", "type", "is_shared"] {
        assert!(!segment[field].is_null(), "missing segment field {}", field);
    }

    let process = &json["processes"][0];
    for field in [
        "pid",
        "name",
        "socket_count",
        "memory_usage",
        "cpu_usage",
        "status",
    ] {
        assert!(!process[field].is_null(), "missing process field {}", field);
    }
}

#[test]
fn cpu_usage_is_a_percentage() {
    let snapshot = snapshot_of(MockFs::typical_system());
    for process in &snapshot.processes {
        assert!(
            (0.0..=100.0).contains(&process.cpu_usage),
            "cpu out of range for pid {}: {}",
            process.pid,
            process.cpu_usage
        );
    }
}

#[test]
fn zombie_process_appears_with_zero_memory() {
    let snapshot = snapshot_of(MockFs::with_zombie_process());

    let zombie = snapshot
        .processes
        .iter()
        .find(|p| p.pid == 4000)
        .expect("zombie process summarized");
    assert_eq!(zombie.socket_count, 0);
    assert_eq!(zombie.memory_usage, 0.0);
}
