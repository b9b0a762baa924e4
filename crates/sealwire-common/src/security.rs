//! Flood detection and mitigation.
//!
//! The guard tracks, per source IP, connection attempts and received byte
//! counts over a sliding window, and answers admission questions for the
//! transport layer. Rejections are logged but never turned into protocol
//! errors: callers drop the connection silently so a flooding peer learns
//! nothing from the rejection.
//!
//! # Thread Safety
//!
//! The guard is shared across connection workers via `Arc`. The outer map
//! lock is held only long enough to fetch or insert an IP's entry; each
//! entry carries its own mutex, so admissions for the same IP are
//! serialized (no double-counting, no lost increments) while admissions
//! for distinct IPs proceed in parallel.
//!
//! Entries are created lazily on first sight of an IP and pruned lazily on
//! each check; they are never removed, which bounds memory by the number of
//! distinct IPs seen over the guard's lifetime.

use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, TcpStream};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::SecurityPolicy;
use crate::error::Result;

/// Per-IP sliding-window counters.
#[derive(Debug, Default)]
struct RateState {
    /// Timestamps of admitted connections, oldest first.
    connections: VecDeque<Instant>,
    /// Admitted data events as (timestamp, byte count), oldest first.
    data_events: VecDeque<(Instant, u64)>,
}

impl RateState {
    fn prune_connections(&mut self, now: Instant, window: Duration) {
        while let Some(&front) = self.connections.front() {
            if now.duration_since(front) > window {
                self.connections.pop_front();
            } else {
                break;
            }
        }
    }

    fn prune_data_events(&mut self, now: Instant, window: Duration) {
        while let Some(&(front, _)) = self.data_events.front() {
            if now.duration_since(front) > window {
                self.data_events.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Per-source-IP rate limiter and payload validator.
///
/// One instance guards one endpoint; construct it from the endpoint's
/// [`SecurityPolicy`] and share it via `Arc` with every connection worker.
pub struct SecurityGuard {
    policy: SecurityPolicy,
    states: Mutex<HashMap<IpAddr, Arc<Mutex<RateState>>>>,
}

impl SecurityGuard {
    pub fn new(policy: SecurityPolicy) -> Self {
        tracing::debug!(
            max_connections = policy.max_connections_per_window,
            max_bytes = policy.max_bytes_per_window,
            timeout_secs = policy.socket_timeout_seconds,
            window_secs = policy.window_seconds,
            "initialized security guard"
        );
        Self {
            policy,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// The policy this guard enforces.
    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    fn state_for(&self, ip: IpAddr) -> Arc<Mutex<RateState>> {
        let mut states = self.states.lock();
        Arc::clone(states.entry(ip).or_default())
    }

    /// Decides whether a new connection from `ip` is admissible.
    ///
    /// Prunes events older than the window, rejects when the remaining
    /// count has reached the limit, and otherwise records the connection.
    pub fn admit_connection(&self, ip: IpAddr) -> bool {
        self.admit_connection_at(ip, Instant::now())
    }

    /// [`admit_connection`](Self::admit_connection) with an explicit
    /// timestamp, so callers (and tests) control the clock.
    pub fn admit_connection_at(&self, ip: IpAddr, now: Instant) -> bool {
        let window = Duration::from_secs(self.policy.window_seconds);
        let state = self.state_for(ip);
        let mut state = state.lock();

        state.prune_connections(now, window);

        if state.connections.len() >= self.policy.max_connections_per_window as usize {
            tracing::warn!(
                %ip,
                connections = state.connections.len(),
                window_secs = self.policy.window_seconds,
                "connection rate limit exceeded"
            );
            return false;
        }

        state.connections.push_back(now);
        tracing::debug!(
            %ip,
            connections = state.connections.len(),
            limit = self.policy.max_connections_per_window,
            "connection admitted"
        );
        true
    }

    /// Decides whether receiving `byte_count` more bytes from `ip` is
    /// admissible within the current window.
    pub fn admit_data(&self, ip: IpAddr, byte_count: u64) -> bool {
        self.admit_data_at(ip, byte_count, Instant::now())
    }

    /// [`admit_data`](Self::admit_data) with an explicit timestamp.
    pub fn admit_data_at(&self, ip: IpAddr, byte_count: u64, now: Instant) -> bool {
        let window = Duration::from_secs(self.policy.window_seconds);
        let state = self.state_for(ip);
        let mut state = state.lock();

        state.prune_data_events(now, window);

        let total: u64 = state.data_events.iter().map(|&(_, size)| size).sum();
        if total + byte_count > self.policy.max_bytes_per_window {
            tracing::warn!(
                %ip,
                bytes = total + byte_count,
                window_secs = self.policy.window_seconds,
                "data rate limit exceeded"
            );
            return false;
        }

        state.data_events.push_back((now, byte_count));
        tracing::debug!(
            %ip,
            bytes = byte_count,
            total = total + byte_count,
            limit = self.policy.max_bytes_per_window,
            "data admitted"
        );
        true
    }

    /// Basic validation of an inbound payload length.
    ///
    /// Rejects empty payloads and payloads over the byte ceiling, which
    /// here acts as an absolute single-message limit rather than a rate.
    pub fn validate_payload(&self, len: u64) -> bool {
        if len == 0 {
            tracing::warn!("empty payload rejected");
            return false;
        }
        if len > self.policy.max_bytes_per_window {
            tracing::warn!(
                len,
                max = self.policy.max_bytes_per_window,
                "payload exceeds maximum allowed size"
            );
            return false;
        }
        true
    }

    /// Applies the configured read/write timeout to a socket, so a slow or
    /// stalled peer cannot hold a worker indefinitely (slowloris).
    pub fn apply_timeout(&self, stream: &TcpStream) -> Result<()> {
        let timeout = Duration::from_secs(self.policy.socket_timeout_seconds);
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        tracing::debug!(
            timeout_secs = self.policy.socket_timeout_seconds,
            "socket timeout applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn test_ip(last_octet: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, last_octet))
    }

    fn guard(max_connections: u32, max_bytes: u64, window_secs: u64) -> SecurityGuard {
        SecurityGuard::new(SecurityPolicy {
            max_connections_per_window: max_connections,
            max_bytes_per_window: max_bytes,
            socket_timeout_seconds: 10,
            window_seconds: window_secs,
        })
    }

    #[test]
    fn test_connection_limit_boundary() {
        let guard = guard(3, 1024, 60);
        let ip = test_ip(1);
        let now = Instant::now();

        // N admissions succeed, the (N+1)th within the window fails.
        for _ in 0..3 {
            assert!(guard.admit_connection_at(ip, now));
        }
        assert!(!guard.admit_connection_at(ip, now));
    }

    #[test]
    fn test_connection_limit_resets_after_window() {
        let guard = guard(2, 1024, 60);
        let ip = test_ip(1);
        let start = Instant::now();

        assert!(guard.admit_connection_at(ip, start));
        assert!(guard.admit_connection_at(ip, start));
        assert!(!guard.admit_connection_at(ip, start));

        // Once the window has passed, old entries are pruned and a new
        // connection is admitted again.
        let later = start + Duration::from_secs(61);
        assert!(guard.admit_connection_at(ip, later));
    }

    #[test]
    fn test_connection_limits_are_per_ip() {
        let guard = guard(1, 1024, 60);
        let now = Instant::now();

        assert!(guard.admit_connection_at(test_ip(1), now));
        assert!(guard.admit_connection_at(test_ip(2), now));
        assert!(!guard.admit_connection_at(test_ip(1), now));
        assert!(!guard.admit_connection_at(test_ip(2), now));
    }

    #[test]
    fn test_data_rate_boundary() {
        let guard = guard(10, 100, 60);
        let ip = test_ip(1);
        let now = Instant::now();

        assert!(guard.admit_data_at(ip, 60, now));
        // Exactly at the ceiling is still admissible.
        assert!(guard.admit_data_at(ip, 40, now));
        // The call that would cross the threshold is rejected.
        assert!(!guard.admit_data_at(ip, 1, now));
    }

    #[test]
    fn test_data_rate_resets_after_window() {
        let guard = guard(10, 100, 60);
        let ip = test_ip(1);
        let start = Instant::now();

        assert!(guard.admit_data_at(ip, 100, start));
        assert!(!guard.admit_data_at(ip, 1, start));

        let later = start + Duration::from_secs(61);
        assert!(guard.admit_data_at(ip, 100, later));
    }

    #[test]
    fn test_rejected_data_is_not_recorded() {
        let guard = guard(10, 100, 60);
        let ip = test_ip(1);
        let now = Instant::now();

        assert!(!guard.admit_data_at(ip, 200, now));
        // The rejected event must not count against the window.
        assert!(guard.admit_data_at(ip, 100, now));
    }

    #[test]
    fn test_validate_payload() {
        let guard = guard(10, 100, 60);

        assert!(!guard.validate_payload(0));
        assert!(guard.validate_payload(1));
        assert!(guard.validate_payload(100));
        assert!(!guard.validate_payload(101));
    }

    #[test]
    fn test_concurrent_admissions_same_ip_never_overcount() {
        let guard = Arc::new(guard(100, u64::MAX, 60));
        let ip = test_ip(1);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let guard = Arc::clone(&guard);
            handles.push(std::thread::spawn(move || {
                let mut admitted = 0u32;
                for _ in 0..50 {
                    if guard.admit_connection(ip) {
                        admitted += 1;
                    }
                }
                admitted
            }));
        }

        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        // 400 attempts against a limit of 100: exactly 100 may be admitted.
        assert_eq!(total, 100);
    }
}
