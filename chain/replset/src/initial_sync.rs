//! Initial sync: while the local oplog is empty, clone every
//! collection from the sync source, then replay the oplog from the ts
//! captured at clone start up through the source's ts at the moment
//! cloning finished, rechecking `minValid` at the end.

use db_common::{ErrorCode, Status};
use db_document::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialSyncPhase {
    /// Listing collections and copying their documents and indexes.
    Cloning,
    /// Replaying the oplog captured between clone-start ts and
    /// clone-finish ts.
    CatchingUp,
    Done,
}

/// Drives initial sync's phase transitions and the `minValid` bookkeeping:
/// the oplog ts the member must reach before it is safe to promote to
/// `Secondary`. `minValid` is re-read at the end of catch-up because the
/// source's own oplog may have advanced further while catch-up was
/// in progress.
pub struct InitialSync {
    phase: InitialSyncPhase,
    clone_start_ts: Option<Timestamp>,
    min_valid: Timestamp,
}

impl Default for InitialSync {
    fn default() -> Self {
        InitialSync { phase: InitialSyncPhase::Cloning, clone_start_ts: None, min_valid: Timestamp::ZERO }
    }
}

impl InitialSync {
    pub fn new() -> Self {
        InitialSync::default()
    }

    pub fn phase(&self) -> InitialSyncPhase {
        self.phase
    }

    pub fn begin_cloning(&mut self, source_ts_at_clone_start: Timestamp) {
        self.clone_start_ts = Some(source_ts_at_clone_start);
        self.min_valid = source_ts_at_clone_start;
        self.phase = InitialSyncPhase::Cloning;
    }

    /// Cloning finished; `source_ts_now` is the source's ts at that moment,
    /// the upper bound catch-up must reach.
    pub fn finish_cloning(&mut self, source_ts_now: Timestamp) -> Result<Timestamp, Status> {
        let start = self.clone_start_ts.ok_or_else(|| {
            Status::new(ErrorCode::AssertionFailure, "finish_cloning called before begin_cloning")
        })?;
        self.min_valid = source_ts_now;
        self.phase = InitialSyncPhase::CatchingUp;
        Ok(start)
    }

    /// Oplog replay during catch-up is complete once local last-applied
    /// reaches `min_valid`; rechecks `min_valid` hasn't advanced further
    /// (it may, if the caller supplies a fresher source ts here) before
    /// declaring done.
    pub fn recheck_min_valid(&mut self, local_last_applied: Timestamp, source_ts_now: Timestamp) -> bool {
        if source_ts_now > self.min_valid {
            self.min_valid = source_ts_now;
        }
        let caught_up = local_last_applied >= self.min_valid;
        if caught_up {
            self.phase = InitialSyncPhase::Done;
        }
        caught_up
    }

    pub fn min_valid(&self) -> Timestamp {
        self.min_valid
    }
}

/// Policy for the two failure modes that can occur during clone:
/// `CursorNotFound` (the donor-equivalent source's listing cursor was
/// invalidated mid-clone — the whole per-collection clone is retried from
/// scratch, since there's no cheap way to resume mid-scan) and a
/// duplicate-key error on a unique index (ignored — the document already
/// exists because initial sync and oplog catch-up can observe the same
/// insert twice when the clone and the oplog-catch-up window overlap).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneErrorAction {
    RetryWholeCollection,
    Ignore,
    Fail,
}

pub fn classify_clone_error(code: ErrorCode) -> CloneErrorAction {
    match code {
        ErrorCode::CursorNotFound => CloneErrorAction::RetryWholeCollection,
        ErrorCode::DuplicateKey => CloneErrorAction::Ignore,
        _ => CloneErrorAction::Fail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_cloning_before_begin_is_an_assertion_failure() {
        let mut sync = InitialSync::new();
        let err = sync.finish_cloning(Timestamp::new(5, 0)).unwrap_err();
        assert_eq!(err.code, ErrorCode::AssertionFailure);
    }

    #[test]
    fn finish_cloning_returns_the_original_clone_start_ts() {
        let mut sync = InitialSync::new();
        sync.begin_cloning(Timestamp::new(1, 0));
        let start = sync.finish_cloning(Timestamp::new(10, 0)).unwrap();
        assert_eq!(start, Timestamp::new(1, 0));
        assert_eq!(sync.phase(), InitialSyncPhase::CatchingUp);
    }

    #[test]
    fn recheck_min_valid_completes_once_local_catches_up() {
        let mut sync = InitialSync::new();
        sync.begin_cloning(Timestamp::new(1, 0));
        sync.finish_cloning(Timestamp::new(10, 0)).unwrap();
        assert!(!sync.recheck_min_valid(Timestamp::new(5, 0), Timestamp::new(10, 0)));
        assert!(sync.recheck_min_valid(Timestamp::new(10, 0), Timestamp::new(10, 0)));
        assert_eq!(sync.phase(), InitialSyncPhase::Done);
    }

    #[test]
    fn min_valid_advances_if_the_source_kept_writing_during_catch_up() {
        let mut sync = InitialSync::new();
        sync.begin_cloning(Timestamp::new(1, 0));
        sync.finish_cloning(Timestamp::new(10, 0)).unwrap();
        assert!(!sync.recheck_min_valid(Timestamp::new(10, 0), Timestamp::new(15, 0)));
        assert_eq!(sync.min_valid(), Timestamp::new(15, 0));
    }

    #[test]
    fn cursor_not_found_during_clone_retries_the_whole_collection() {
        assert_eq!(classify_clone_error(ErrorCode::CursorNotFound), CloneErrorAction::RetryWholeCollection);
    }

    #[test]
    fn duplicate_key_during_clone_is_ignored() {
        assert_eq!(classify_clone_error(ErrorCode::DuplicateKey), CloneErrorAction::Ignore);
    }
}
