//! Heartbeat exchange: every member opens a pooled, lazy,
//! single-connection channel to every other member — the "scoped
//! connection" pattern — and periodically exchanges term/last-applied/
//! state/config-version so each side can detect staleness in the other.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use db_document::Timestamp;

use crate::member::MemberState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub term: u64,
    pub last_applied: Timestamp,
    pub state: MemberState,
    pub config_version: u64,
}

/// One entry in a member's scoped-connection pool: a single logical
/// connection to a peer, exclusive while held, created lazily on first use
/// and reused across heartbeats rather than reconnecting every round.
#[derive(Default)]
struct ScopedConnection {
    last_heartbeat_at: Option<Instant>,
    last_response: Option<HeartbeatResponse>,
    consecutive_failures: u32,
}

/// Map from host-port to its scoped connection, one pool per member. Each
/// slot has its own lock, not a single lock over the whole map, so
/// concurrent heartbeats to different peers don't serialize on each other.
#[derive(Default)]
pub struct ConnectionPool {
    connections: Mutex<HashMap<String, Mutex<ScopedConnection>>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        ConnectionPool::default()
    }

    /// Records the outcome of a heartbeat RPC to `host`, whether it
    /// succeeded or timed out/errored.
    pub fn record(&self, host: &str, result: Result<HeartbeatResponse, ()>) {
        let mut conn = {
            let mut connections = self.connections.lock();
            if !connections.contains_key(host) {
                connections.insert(host.to_string(), Mutex::new(ScopedConnection::default()));
            }
            // Re-lock the per-host mutex while still holding the map lock is
            // fine here: this is the only place that takes it, so there is
            // no lock-order inversion risk.
            connections.get(host).expect("just inserted").lock()
        };
        conn.last_heartbeat_at = Some(Instant::now());
        match result {
            Ok(resp) => {
                conn.last_response = Some(resp);
                conn.consecutive_failures = 0;
            }
            Err(()) => {
                conn.consecutive_failures += 1;
            }
        }
    }

    pub fn last_response(&self, host: &str) -> Option<HeartbeatResponse> {
        self.connections.lock().get(host)?.lock().last_response
    }

    /// A peer is `Down` once it has missed enough consecutive heartbeats
    /// *and* hasn't responded within the election timeout window —
    /// distinguishing a single dropped heartbeat (noise) from sustained
    /// unreachability (a real state change).
    pub fn is_down(&self, host: &str, election_timeout: Duration) -> bool {
        let connections = self.connections.lock();
        let Some(entry) = connections.get(host) else { return true };
        let conn = entry.lock();
        match conn.last_heartbeat_at {
            None => false,
            Some(at) => conn.consecutive_failures >= 2 && at.elapsed() >= election_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_host_reports_no_last_response() {
        let pool = ConnectionPool::new();
        assert_eq!(pool.last_response("nobody:27017"), None);
    }

    #[test]
    fn a_successful_heartbeat_is_recorded_and_resets_failures() {
        let pool = ConnectionPool::new();
        pool.record("a:27017", Err(()));
        pool.record(
            "a:27017",
            Ok(HeartbeatResponse { term: 1, last_applied: Timestamp::new(5, 0), state: MemberState::Secondary, config_version: 1 }),
        );
        let resp = pool.last_response("a:27017").unwrap();
        assert_eq!(resp.term, 1);
    }

    #[test]
    fn a_host_never_contacted_is_not_reported_down() {
        let pool = ConnectionPool::new();
        assert!(!pool.is_down("a:27017", Duration::from_secs(10)));
    }
}
