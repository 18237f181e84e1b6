//! Hung-connection and memory-leak heuristics.
//!
//! The classifier is the only stateful component in the core: it keeps a
//! small bounded history per socket identity across snapshots, so it can
//! tell how long a socket has sat in a transitional state and whether its
//! attributed memory keeps growing. Entries idle beyond the retention
//! window are evicted on every pass. Callers must serialize access (one
//! trace mutates the history at a time); the tracer holds the classifier
//! behind `&mut self`.

use std::collections::{HashMap, VecDeque};

use crate::config::TracerConfig;
use crate::model::{Protocol, SocketRecord, SocketState};

/// Socket identity stable across snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SocketKey {
    protocol: Protocol,
    local: String,
    remote: String,
}

impl SocketKey {
    fn of(record: &SocketRecord) -> Self {
        Self {
            protocol: record.protocol,
            local: record.local_address.clone(),
            remote: record.remote_address.clone(),
        }
    }
}

#[derive(Debug)]
struct SocketHistory {
    state: SocketState,
    /// When the socket was first observed in its current state.
    state_since: i64,
    /// Most recent attributed-memory samples, oldest first.
    mem_samples: VecDeque<u64>,
    last_seen: i64,
}

/// Stateful hung/leak classifier.
#[derive(Debug, Default)]
pub struct Classifier {
    history: HashMap<SocketKey, SocketHistory>,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Annotates the given sockets in place and advances the history.
    ///
    /// `now` is the snapshot timestamp (unix seconds); using the snapshot
    /// time rather than the wall clock keeps classification consistent
    /// with the rest of the capture.
    pub fn classify(&mut self, sockets: &mut [SocketRecord], now: i64, config: &TracerConfig) {
        for record in sockets.iter_mut() {
            let key = SocketKey::of(record);
            let first_observation = !self.history.contains_key(&key);

            let entry = self.history.entry(key).or_insert_with(|| SocketHistory {
                state: record.state,
                state_since: now,
                mem_samples: VecDeque::with_capacity(config.leak_history_depth),
                last_seen: now,
            });

            if entry.state != record.state {
                entry.state = record.state;
                entry.state_since = now;
            }
            entry.last_seen = now;
            if entry.mem_samples.len() == config.leak_history_depth {
                entry.mem_samples.pop_front();
            }
            entry.mem_samples.push_back(record.memory_usage);

            record.is_hung = is_hung(record.state, now - entry.state_since, config);
            // A socket seen for the first time has no history to judge
            record.has_leak = !first_observation
                && (record.memory_usage > config.leak_threshold_bytes
                    || has_unbounded_growth(&entry.mem_samples, config.leak_history_depth));
        }

        self.evict_stale(now, config);
    }

    /// Drops history entries not seen within the retention window.
    fn evict_stale(&mut self, now: i64, config: &TracerConfig) {
        let retention = config.history_retention_secs as i64;
        self.history.retain(|_, h| now - h.last_seen <= retention);
    }

    /// Number of tracked socket identities (test visibility).
    pub fn tracked(&self) -> usize {
        self.history.len()
    }
}

fn is_hung(state: SocketState, residency_secs: i64, config: &TracerConfig) -> bool {
    let threshold = match state {
        SocketState::TimeWait => config.hang_time_wait_secs,
        SocketState::CloseWait => config.hang_close_wait_secs,
        SocketState::SynSent | SocketState::SynRecv => config.hang_syn_secs,
        // ESTABLISHED and LISTENING are normal long-lived states
        _ => return false,
    };
    residency_secs > threshold as i64
}

/// True when a full history window grew strictly at every step.
fn has_unbounded_growth(samples: &VecDeque<u64>, depth: usize) -> bool {
    if samples.len() < depth {
        return false;
    }
    samples.iter().zip(samples.iter().skip(1)).all(|(a, b)| b > a)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn socket(state: SocketState, mem: u64) -> SocketRecord {
        SocketRecord {
            pid: 100,
            process_name: "sshd".to_string(),
            local_address: "127.0.0.1:22".to_string(),
            remote_address: "10.0.0.1:50000".to_string(),
            state,
            protocol: Protocol::Tcp,
            memory_usage: mem,
            is_hung: false,
            has_leak: false,
        }
    }

    #[test]
    fn test_fresh_established_never_hung() {
        let mut classifier = Classifier::new();
        let config = TracerConfig::default();
        let mut sockets = vec![socket(SocketState::Established, 1024)];
        classifier.classify(&mut sockets, 1_000_000, &config);
        assert!(!sockets[0].is_hung);

        // Even after hours, ESTABLISHED stays normal
        classifier.classify(&mut sockets, 1_000_000 + 7200, &config);
        assert!(!sockets[0].is_hung);
    }

    #[test]
    fn test_time_wait_beyond_threshold_is_hung() {
        let mut classifier = Classifier::new();
        let config = TracerConfig::default();
        let mut sockets = vec![socket(SocketState::TimeWait, 1024)];

        classifier.classify(&mut sockets, 1_000_000, &config);
        assert!(!sockets[0].is_hung);

        // Within threshold
        classifier.classify(&mut sockets, 1_000_000 + 100, &config);
        assert!(!sockets[0].is_hung);

        // Past 120s
        classifier.classify(&mut sockets, 1_000_000 + 121, &config);
        assert!(sockets[0].is_hung);
    }

    #[test]
    fn test_state_change_resets_residency() {
        let mut classifier = Classifier::new();
        let config = TracerConfig::default();

        let mut sockets = vec![socket(SocketState::Established, 1024)];
        classifier.classify(&mut sockets, 1_000_000, &config);

        // Transition to CLOSE_WAIT at t+200: residency restarts
        sockets[0].state = SocketState::CloseWait;
        classifier.classify(&mut sockets, 1_000_200, &config);
        assert!(!sockets[0].is_hung);

        classifier.classify(&mut sockets, 1_000_200 + 61, &config);
        assert!(sockets[0].is_hung);
    }

    #[test]
    fn test_first_observation_never_leaks() {
        let mut classifier = Classifier::new();
        let config = TracerConfig::default();
        // Far above the absolute threshold, but never seen before
        let mut sockets = vec![socket(SocketState::Established, 100 * 1024 * 1024)];
        classifier.classify(&mut sockets, 1_000_000, &config);
        assert!(!sockets[0].has_leak);

        // Second observation applies the absolute threshold
        classifier.classify(&mut sockets, 1_000_001, &config);
        assert!(sockets[0].has_leak);
    }

    #[test]
    fn test_monotonic_growth_flags_leak() {
        let mut classifier = Classifier::new();
        let config = TracerConfig::default();

        let mut now = 1_000_000;
        for (i, mem) in [1000u64, 2000, 3000, 4000, 5000].iter().enumerate() {
            let mut sockets = vec![socket(SocketState::Established, *mem)];
            classifier.classify(&mut sockets, now, &config);
            if i < 4 {
                assert!(!sockets[0].has_leak, "window not full at sample {}", i);
            } else {
                assert!(sockets[0].has_leak, "full strictly-growing window");
            }
            now += 1;
        }
    }

    #[test]
    fn test_flat_usage_is_not_a_leak() {
        let mut classifier = Classifier::new();
        let config = TracerConfig::default();

        let mut now = 1_000_000;
        for _ in 0..10 {
            let mut sockets = vec![socket(SocketState::Established, 4096)];
            classifier.classify(&mut sockets, now, &config);
            assert!(!sockets[0].has_leak);
            now += 1;
        }
    }

    #[test]
    fn test_history_eviction() {
        let mut classifier = Classifier::new();
        let config = TracerConfig::default();

        let mut sockets = vec![socket(SocketState::Established, 1024)];
        classifier.classify(&mut sockets, 1_000_000, &config);
        assert_eq!(classifier.tracked(), 1);

        // A later pass over a different socket, past the retention window
        let mut other = vec![SocketRecord {
            local_address: "127.0.0.1:9999".to_string(),
            ..socket(SocketState::Established, 1024)
        }];
        classifier.classify(&mut other, 1_000_000 + 301, &config);
        assert_eq!(classifier.tracked(), 1);
    }
}
