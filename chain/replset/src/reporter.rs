//! The progress reporter: each member periodically
//! sends `replSetUpdatePosition` to the primary so write-concern waiters
//! can be satisfied. A keep-alive-plus-trigger mechanism — a single
//! outstanding command, sent at least every `keep_alive_interval` and
//! immediately on a local progress advance — not a fixed-interval poll;
//! the single-outstanding-command invariant (never issue a second command
//! while one is in flight, queue the newest progress instead) is
//! load-bearing for throughput, not an incidental detail.

use std::time::{Duration, Instant};

use db_common::{ErrorCode, Status};
use db_document::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Progress(pub Timestamp);

/// Tracks whether a `replSetUpdatePosition` is currently in flight and what
/// the most recently observed local progress is, so a new progress update
/// that arrives mid-flight is queued rather than firing a second command.
pub struct Reporter {
    keep_alive_interval: Duration,
    in_flight: bool,
    last_sent: Option<Progress>,
    last_sent_at: Option<Instant>,
    pending: Option<Progress>,
    retry_backoff_on_config_drift: Duration,
}

impl Reporter {
    pub fn new(keep_alive_interval: Duration) -> Self {
        Reporter {
            keep_alive_interval,
            in_flight: false,
            last_sent: None,
            last_sent_at: None,
            pending: None,
            retry_backoff_on_config_drift: Duration::from_millis(100),
        }
    }

    /// Called when local apply progress advances. If nothing is in flight,
    /// this should be sent immediately; otherwise it's queued as `pending`
    /// and picked up once the in-flight command returns.
    pub fn on_progress_advanced(&mut self, progress: Progress) {
        self.pending = Some(progress);
    }

    /// Whether a send should happen right now: either nothing is in flight
    /// and there is new pending progress, or the keep-alive interval has
    /// elapsed since the last send regardless of whether progress moved.
    pub fn should_send(&self, now: Instant) -> bool {
        if self.in_flight {
            return false;
        }
        if self.pending.is_some() {
            return true;
        }
        match self.last_sent_at {
            None => true,
            Some(at) => now.duration_since(at) >= self.keep_alive_interval,
        }
    }

    /// Marks a send as started, returning the progress value to send (the
    /// pending one, or a repeat of the last-sent value for a pure
    /// keep-alive).
    pub fn begin_send(&mut self, now: Instant) -> Option<Progress> {
        if self.in_flight || !self.should_send(now) {
            return None;
        }
        let progress = self.pending.take().or(self.last_sent)?;
        self.in_flight = true;
        Some(progress)
    }

    /// Completes the in-flight send. A `InvalidReplicaSetConfig` response
    /// means the target's config has drifted out from under this report;
    /// The reporter tolerates this by silently retrying rather
    /// than surfacing an error to the caller.
    pub fn complete_send(&mut self, sent: Progress, result: Result<(), Status>, now: Instant) {
        self.in_flight = false;
        match result {
            Ok(()) => {
                self.last_sent = Some(sent);
                self.last_sent_at = Some(now);
            }
            Err(status) if status.code == ErrorCode::InvalidReplicaSetConfig => {
                self.pending = Some(sent);
            }
            Err(_) => {
                self.pending = Some(sent);
            }
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn config_drift_retry_backoff(&self) -> Duration {
        self.retry_backoff_on_config_drift
    }
}

/// Write-concern `w:N` tracking: satisfied once N members (including
/// primary) report an applied ts `>= write_ts`. Not itself a reporter —
/// this is the primary-side tally `replSetUpdatePosition` feeds into.
#[derive(Default)]
pub struct WriteConcernWaiters {
    member_progress: std::collections::HashMap<u32, Timestamp>,
}

impl WriteConcernWaiters {
    pub fn new() -> Self {
        WriteConcernWaiters::default()
    }

    pub fn record_progress(&mut self, member_id: u32, applied: Timestamp) {
        let slot = self.member_progress.entry(member_id).or_insert(Timestamp::ZERO);
        if applied > *slot {
            *slot = applied;
        }
    }

    /// Number of members (by id, including the primary's own id if it was
    /// recorded) whose applied ts is at least `write_ts`.
    pub fn satisfied_count(&self, write_ts: Timestamp) -> usize {
        self.member_progress.values().filter(|&&ts| ts >= write_ts).count()
    }

    pub fn is_satisfied(&self, write_ts: Timestamp, w: usize) -> bool {
        self.satisfied_count(write_ts) >= w
    }

    /// The majority-committed point: the largest `ts` that a strict
    /// majority of `voting_members` have applied. `readConcern: majority`
    /// snapshots are bounded by this value (spec.md §5's ordering
    /// guarantee). Reuses the same per-member progress tally `w:N` write
    /// concern already keeps, since both are "how far has progress spread"
    /// queries over the same data.
    pub fn majority_committed_point(&self, voting_members: usize) -> Timestamp {
        if voting_members == 0 {
            return Timestamp::ZERO;
        }
        let majority = voting_members / 2 + 1;
        let mut applied: Vec<Timestamp> = self.member_progress.values().copied().collect();
        if applied.len() < majority {
            return Timestamp::ZERO;
        }
        applied.sort_unstable_by(|a, b| b.cmp(a));
        applied[majority - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_fresh_reporter_wants_to_send_immediately() {
        let reporter = Reporter::new(Duration::from_secs(2));
        assert!(reporter.should_send(Instant::now()));
    }

    #[test]
    fn only_one_send_is_in_flight_at_a_time() {
        let mut reporter = Reporter::new(Duration::from_secs(2));
        reporter.on_progress_advanced(Progress(Timestamp::new(1, 0)));
        let now = Instant::now();
        let sent = reporter.begin_send(now).unwrap();
        assert_eq!(sent, Progress(Timestamp::new(1, 0)));
        assert!(reporter.begin_send(now).is_none());
    }

    #[test]
    fn progress_advancing_while_in_flight_is_queued_not_sent_immediately() {
        let mut reporter = Reporter::new(Duration::from_secs(2));
        reporter.on_progress_advanced(Progress(Timestamp::new(1, 0)));
        let now = Instant::now();
        reporter.begin_send(now).unwrap();
        reporter.on_progress_advanced(Progress(Timestamp::new(2, 0)));
        assert!(reporter.is_in_flight());
        reporter.complete_send(Progress(Timestamp::new(1, 0)), Ok(()), now);
        assert!(reporter.should_send(now));
        let next = reporter.begin_send(now).unwrap();
        assert_eq!(next, Progress(Timestamp::new(2, 0)));
    }

    #[test]
    fn config_drift_is_tolerated_by_retrying_rather_than_erroring() {
        let mut reporter = Reporter::new(Duration::from_secs(2));
        reporter.on_progress_advanced(Progress(Timestamp::new(1, 0)));
        let now = Instant::now();
        let sent = reporter.begin_send(now).unwrap();
        reporter.complete_send(sent, Err(Status::new(ErrorCode::InvalidReplicaSetConfig, "drift")), now);
        assert!(!reporter.is_in_flight());
        assert!(reporter.should_send(now));
    }

    #[test]
    fn write_concern_is_satisfied_once_enough_members_catch_up() {
        let mut waiters = WriteConcernWaiters::new();
        waiters.record_progress(0, Timestamp::new(10, 0));
        waiters.record_progress(1, Timestamp::new(10, 0));
        waiters.record_progress(2, Timestamp::new(5, 0));
        assert!(waiters.is_satisfied(Timestamp::new(10, 0), 2));
        assert!(!waiters.is_satisfied(Timestamp::new(10, 0), 3));
    }

    #[test]
    fn majority_committed_point_is_the_nth_highest_applied_ts() {
        let mut waiters = WriteConcernWaiters::new();
        waiters.record_progress(0, Timestamp::new(10, 0));
        waiters.record_progress(1, Timestamp::new(8, 0));
        waiters.record_progress(2, Timestamp::new(5, 0));
        // 3 voting members -> majority 2 -> second-highest applied ts.
        assert_eq!(waiters.majority_committed_point(3), Timestamp::new(8, 0));
    }

    #[test]
    fn majority_committed_point_is_zero_until_a_majority_has_reported() {
        let mut waiters = WriteConcernWaiters::new();
        waiters.record_progress(0, Timestamp::new(10, 0));
        assert_eq!(waiters.majority_committed_point(3), Timestamp::ZERO);
    }
}
