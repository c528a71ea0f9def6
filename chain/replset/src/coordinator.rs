//! The replica-set coordinator: the aggregate that owns this member's
//! `MemberState`, current term, and view of its peers' reported progress,
//! and that decides sync-source selection and election triggering. The
//! actual network I/O (heartbeat RPCs, the tailable fetch) is injected by
//! the caller (`server/dbnode`'s background tasks) through the traits in
//! `heartbeat` and `apply_loop`; this module is the pure decision logic,
//! testable without any real networking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use db_common::{ErrorCode, Status};
use db_document::Timestamp;

use crate::config::ReplSetConfig;
use crate::member::MemberState;

#[derive(Debug, Clone, Copy)]
pub struct PeerView {
    pub state: MemberState,
    pub last_applied: Timestamp,
    pub reachable: bool,
}

/// One member's view of the replica set it belongs to: its own state/term/
/// last-applied, and what it has heard from every peer via heartbeats.
pub struct Coordinator {
    pub member_id: u32,
    pub config: ReplSetConfig,
    state: MemberState,
    term: u64,
    last_applied: Timestamp,
    peers: HashMap<u32, PeerView>,
    last_heard_from_primary: Option<Instant>,
    election_timeout: Duration,
    max_sync_source_lag: Timestamp,
}

impl Coordinator {
    pub fn new(member_id: u32, config: ReplSetConfig, election_timeout: Duration) -> Self {
        Coordinator {
            member_id,
            config,
            state: MemberState::Startup,
            term: 0,
            last_applied: Timestamp::ZERO,
            peers: HashMap::new(),
            last_heard_from_primary: None,
            election_timeout,
            max_sync_source_lag: Timestamp::new(30, 0),
        }
    }

    pub fn state(&self) -> MemberState {
        self.state
    }

    pub fn term(&self) -> u64 {
        self.term
    }

    pub fn last_applied(&self) -> Timestamp {
        self.last_applied
    }

    /// Performs a state transition, rejecting any the member-state machine
    /// doesn't allow — a guard against a bug silently corrupting the
    /// coordinator's view of itself.
    pub fn transition(&mut self, next: MemberState) -> Result<(), Status> {
        if !self.state.can_transition_to(next) {
            return Err(Status::new(ErrorCode::AssertionFailure, format!("illegal member-state transition {:?} -> {next:?}", self.state)));
        }
        tracing::info!(member_id = self.member_id, from = ?self.state, to = ?next, "member state transition");
        self.state = next;
        Ok(())
    }

    pub fn advance_last_applied(&mut self, ts: Timestamp) {
        self.last_applied = ts;
    }

    pub fn on_heartbeat_from_primary(&mut self, now: Instant) {
        self.last_heard_from_primary = Some(now);
    }

    pub fn record_peer(&mut self, id: u32, view: PeerView) {
        self.peers.insert(id, view);
    }

    /// A secondary that hasn't heard from a primary within the
    /// election timeout and is electable should start an election.
    pub fn should_start_election(&self, now: Instant) -> bool {
        if self.state != MemberState::Secondary {
            return false;
        }
        let Some(own_config) = self.config.member(self.member_id) else { return false };
        if !own_config.is_electable() {
            return false;
        }
        match self.last_heard_from_primary {
            None => true,
            Some(at) => now.duration_since(at) >= self.election_timeout,
        }
    }

    pub fn begin_new_term(&mut self) -> u64 {
        self.term += 1;
        self.term
    }

    /// Sync-source selection: any reachable peer other than self,
    /// at least as caught up as the local member, not lagged beyond
    /// `max_sync_source_lag`. Among the eligible set, prefers the most
    /// caught-up peer, reassessed whenever this is called again (e.g. on
    /// apply failure or when a better source appears).
    pub fn select_sync_source(&self) -> Option<u32> {
        self.peers
            .iter()
            .filter(|(&id, view)| {
                id != self.member_id
                    && view.reachable
                    && view.last_applied >= self.last_applied
                    && lag(view.last_applied, self.last_applied) <= self.max_sync_source_lag
            })
            .max_by_key(|(_, view)| view.last_applied)
            .map(|(&id, _)| id)
    }
}

fn lag(source: Timestamp, local: Timestamp) -> Timestamp {
    let source_secs = source.t as i64;
    let local_secs = local.t as i64;
    Timestamp::new((source_secs - local_secs).max(0) as u32, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemberConfig;

    fn coordinator() -> Coordinator {
        let config = ReplSetConfig::new("rs0", vec![MemberConfig::voter(0, "a"), MemberConfig::voter(1, "b"), MemberConfig::voter(2, "c")]);
        let mut c = Coordinator::new(0, config, Duration::from_secs(10));
        c.transition(MemberState::Startup2).unwrap();
        c.transition(MemberState::Secondary).unwrap();
        c
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let mut c = Coordinator::new(0, ReplSetConfig::new("rs0", vec![MemberConfig::voter(0, "a")]), Duration::from_secs(10));
        let err = c.transition(MemberState::Primary).unwrap_err();
        assert_eq!(err.code, ErrorCode::AssertionFailure);
    }

    #[test]
    fn a_secondary_that_has_never_heard_from_a_primary_should_elect() {
        let c = coordinator();
        assert!(c.should_start_election(Instant::now()));
    }

    #[test]
    fn hearing_from_a_primary_resets_the_election_clock() {
        let mut c = coordinator();
        c.on_heartbeat_from_primary(Instant::now());
        assert!(!c.should_start_election(Instant::now()));
    }

    #[test]
    fn an_inelectable_member_never_starts_an_election() {
        let mut passive = MemberConfig::voter(0, "a");
        passive.priority = 0.0;
        let config = ReplSetConfig::new("rs0", vec![passive, MemberConfig::voter(1, "b")]);
        let mut c = Coordinator::new(0, config, Duration::from_secs(10));
        c.transition(MemberState::Startup2).unwrap();
        c.transition(MemberState::Secondary).unwrap();
        assert!(!c.should_start_election(Instant::now()));
    }

    #[test]
    fn sync_source_selection_prefers_the_most_caught_up_reachable_peer() {
        let mut c = coordinator();
        c.record_peer(1, PeerView { state: MemberState::Secondary, last_applied: Timestamp::new(100, 0), reachable: true });
        c.record_peer(2, PeerView { state: MemberState::Secondary, last_applied: Timestamp::new(50, 0), reachable: true });
        c.advance_last_applied(Timestamp::new(40, 0));
        assert_eq!(c.select_sync_source(), Some(1));
    }

    #[test]
    fn unreachable_peers_are_never_selected_as_a_sync_source() {
        let mut c = coordinator();
        c.record_peer(1, PeerView { state: MemberState::Secondary, last_applied: Timestamp::new(100, 0), reachable: false });
        assert_eq!(c.select_sync_source(), None);
    }

    #[test]
    fn a_peer_behind_the_local_member_is_never_selected() {
        let mut c = coordinator();
        c.advance_last_applied(Timestamp::new(50, 0));
        c.record_peer(1, PeerView { state: MemberState::Secondary, last_applied: Timestamp::new(10, 0), reachable: true });
        assert_eq!(c.select_sync_source(), None);
    }
}
