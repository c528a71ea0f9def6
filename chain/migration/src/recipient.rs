//! The recipient side of a chunk migration: applies the donor's
//! cloned batches and transfer-mods, reporting a `steady` state once it
//! has caught up with the donor's mod log and has nothing left to apply.

use db_common::{ErrorCode, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientState {
    /// Applying the donor's initial clone batches.
    Cloning,
    /// Clone complete; applying `_transferMods` batches as they arrive.
    Catchup,
    /// Caught up — donor may enter its critical section.
    Steady,
    Committed,
    Fail,
}

pub struct Recipient {
    state: RecipientState,
    applied: u64,
}

impl Default for Recipient {
    fn default() -> Self {
        Recipient { state: RecipientState::Cloning, applied: 0 }
    }
}

impl Recipient {
    pub fn new() -> Self {
        Recipient::default()
    }

    pub fn state(&self) -> RecipientState {
        self.state
    }

    pub fn applied_count(&self) -> u64 {
        self.applied
    }

    pub fn finish_cloning(&mut self) {
        if self.state == RecipientState::Cloning {
            self.state = RecipientState::Catchup;
        }
    }

    /// Applies one `_transferMods` batch; `remaining_in_locator_set` lets
    /// the recipient tell the donor it's caught up only once both its own
    /// backlog AND the donor's locator set scan are empty.
    pub fn apply_mods(&mut self, reload_count: usize, deleted_count: usize, remaining_in_locator_set: usize) {
        self.applied += (reload_count + deleted_count) as u64;
        if self.state == RecipientState::Catchup && reload_count == 0 && deleted_count == 0 && remaining_in_locator_set == 0 {
            self.state = RecipientState::Steady;
        }
    }

    pub fn commit(&mut self) -> Result<(), Status> {
        if self.state != RecipientState::Steady {
            return Err(Status::new(ErrorCode::AssertionFailure, "recipient committed before reaching steady state"));
        }
        self.state = RecipientState::Committed;
        Ok(())
    }

    pub fn abort(&mut self) {
        self.state = RecipientState::Fail;
    }
}

/// Whether a duplicate-key error on insert during clone application should
/// be tolerated: it is, iff the write is marked `fromMigrate`, since the
/// same document can legitimately arrive twice when the initial clone
/// window and the oplog-replicated insert overlap.
pub fn tolerate_duplicate_key(from_migrate: bool) -> bool {
    from_migrate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaches_steady_only_once_backlog_and_locator_set_are_both_empty() {
        let mut recipient = Recipient::new();
        recipient.finish_cloning();
        recipient.apply_mods(2, 0, 5);
        assert_eq!(recipient.state(), RecipientState::Catchup);
        recipient.apply_mods(0, 0, 0);
        assert_eq!(recipient.state(), RecipientState::Steady);
    }

    #[test]
    fn commit_before_steady_fails() {
        let mut recipient = Recipient::new();
        let err = recipient.commit().unwrap_err();
        assert_eq!(err.code, ErrorCode::AssertionFailure);
    }

    #[test]
    fn commit_after_steady_succeeds() {
        let mut recipient = Recipient::new();
        recipient.finish_cloning();
        recipient.apply_mods(0, 0, 0);
        recipient.commit().unwrap();
        assert_eq!(recipient.state(), RecipientState::Committed);
    }

    #[test]
    fn duplicate_key_is_tolerated_only_when_from_migrate() {
        assert!(tolerate_duplicate_key(true));
        assert!(!tolerate_duplicate_key(false));
    }
}
