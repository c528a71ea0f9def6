//! Election: a secondary that hasn't heard from a primary within the
//! election timeout and is electable increments the term and requests
//! votes; a voter grants at most one vote per term, preferring the
//! candidate with the highest last-applied `ts`, ties broken by member id.

use std::collections::HashMap;

use db_document::Timestamp;

use crate::config::ReplSetConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteRequest {
    pub term: u64,
    pub candidate_id: u32,
    pub candidate_last_applied: Timestamp,
}

/// A voter's per-term memory: which candidate (if any) it has already
/// granted its vote to, so it never grants two votes in the same term even
/// across separate `Ballot` instances (e.g. after a restart that replays a
/// persisted vote record).
#[derive(Default)]
pub struct Ballot {
    votes_granted: HashMap<u64, u32>,
}

impl Ballot {
    pub fn new() -> Self {
        Ballot::default()
    }

    /// Decides whether to grant `request` a vote, given the voter's own
    /// last-applied ts. Preference: higher term always wins a fresh
    /// decision; within an already-decided term, only the previously
    /// granted candidate is re-confirmed (idempotent retry of the same
    /// request).
    pub fn decide(&mut self, request: VoteRequest, voter_last_applied: Timestamp) -> bool {
        if request.candidate_last_applied < voter_last_applied {
            return false;
        }
        match self.votes_granted.get(&request.term) {
            Some(&already) => already == request.candidate_id,
            None => {
                self.votes_granted.insert(request.term, request.candidate_id);
                true
            }
        }
    }
}

/// Tallies votes for a single election round and decides the winner once a
/// majority is in, preferring the highest last-applied ts among candidates
/// that tie on vote count, then the lowest member id.
pub struct ElectionRound {
    term: u64,
    majority: u32,
    candidate_id: u32,
    candidate_last_applied: Timestamp,
    votes: u32,
}

impl ElectionRound {
    pub fn start(config: &ReplSetConfig, term: u64, candidate_id: u32, candidate_last_applied: Timestamp) -> Self {
        ElectionRound { term, majority: config.majority(), candidate_id, candidate_last_applied, votes: 1 }
    }

    pub fn term(&self) -> u64 {
        self.term
    }

    pub fn record_vote_granted(&mut self) {
        self.votes += 1;
    }

    pub fn has_majority(&self) -> bool {
        self.votes >= self.majority
    }

    pub fn candidate_id(&self) -> u32 {
        self.candidate_id
    }
}

/// Picks the electable member with the highest last-applied ts among
/// `candidates`, breaking ties by the lowest member id — used both to
/// decide who *this* member should vote for when several peers are
/// campaigning and, symmetrically, to predict who a majority would prefer.
pub fn preferred_candidate(candidates: &[(u32, Timestamp)]) -> Option<u32> {
    candidates
        .iter()
        .max_by(|(id_a, ts_a), (id_b, ts_b)| ts_a.cmp(ts_b).then_with(|| id_b.cmp(id_a)))
        .map(|(id, _)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemberConfig;

    fn config() -> ReplSetConfig {
        ReplSetConfig::new("rs0", vec![MemberConfig::voter(0, "a"), MemberConfig::voter(1, "b"), MemberConfig::voter(2, "c")])
    }

    #[test]
    fn a_voter_grants_at_most_one_vote_per_term() {
        let mut ballot = Ballot::new();
        let req_a = VoteRequest { term: 5, candidate_id: 1, candidate_last_applied: Timestamp::new(10, 0) };
        let req_b = VoteRequest { term: 5, candidate_id: 2, candidate_last_applied: Timestamp::new(10, 0) };
        assert!(ballot.decide(req_a, Timestamp::new(9, 0)));
        assert!(!ballot.decide(req_b, Timestamp::new(9, 0)));
    }

    #[test]
    fn a_voter_refuses_a_candidate_behind_its_own_last_applied() {
        let mut ballot = Ballot::new();
        let stale = VoteRequest { term: 5, candidate_id: 1, candidate_last_applied: Timestamp::new(5, 0) };
        assert!(!ballot.decide(stale, Timestamp::new(10, 0)));
    }

    #[test]
    fn a_repeated_request_for_the_same_candidate_and_term_is_re_granted() {
        let mut ballot = Ballot::new();
        let req = VoteRequest { term: 5, candidate_id: 1, candidate_last_applied: Timestamp::new(10, 0) };
        assert!(ballot.decide(req, Timestamp::new(9, 0)));
        assert!(ballot.decide(req, Timestamp::new(9, 0)));
    }

    #[test]
    fn election_round_needs_a_strict_majority() {
        let mut round = ElectionRound::start(&config(), 1, 0, Timestamp::new(10, 0));
        assert!(!round.has_majority());
        round.record_vote_granted();
        assert!(round.has_majority());
    }

    #[test]
    fn preferred_candidate_favors_the_highest_last_applied_ts() {
        let candidates = [(0, Timestamp::new(5, 0)), (1, Timestamp::new(10, 0))];
        assert_eq!(preferred_candidate(&candidates), Some(1));
    }

    #[test]
    fn ties_are_broken_by_the_lowest_member_id() {
        let candidates = [(2, Timestamp::new(10, 0)), (1, Timestamp::new(10, 0))];
        assert_eq!(preferred_candidate(&candidates), Some(1));
    }
}
