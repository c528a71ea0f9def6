//! The donor-side migration state machine: `New → Cloning →
//! Critical → Done`, with `Aborted` reachable from any state before
//! cut-over. Cut-over itself — the catalog write that reassigns chunk
//! ownership — is the single linearization point; everything before it
//! is retryable without risk of data loss on either side.

use db_common::{ErrorCode, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DonorState {
    New,
    Cloning,
    Critical,
    Done,
    Aborted,
}

impl DonorState {
    /// Whether a chunk in this state may still legally abort. Once `Done`
    /// the cut-over has already committed at the catalog; there is nothing
    /// left to unwind.
    pub fn can_abort(self) -> bool {
        !matches!(self, DonorState::Done | DonorState::Aborted)
    }

    fn can_transition_to(self, next: DonorState) -> bool {
        use DonorState::*;
        match (self, next) {
            (New, Cloning) => true,
            (Cloning, Critical) => true,
            (Critical, Done) => true,
            (state, Aborted) => state.can_abort(),
            _ => false,
        }
    }
}

/// Drives one chunk migration's donor-side state through its lifecycle,
/// rejecting out-of-order transitions so a bug in the caller fails loudly
/// rather than silently skipping the critical section.
pub struct DonorMachine {
    state: DonorState,
}

impl Default for DonorMachine {
    fn default() -> Self {
        DonorMachine { state: DonorState::New }
    }
}

impl DonorMachine {
    pub fn new() -> Self {
        DonorMachine::default()
    }

    pub fn state(&self) -> DonorState {
        self.state
    }

    pub fn transition(&mut self, next: DonorState) -> Result<(), Status> {
        if !self.state.can_transition_to(next) {
            return Err(Status::new(
                ErrorCode::AssertionFailure,
                format!("illegal donor migration transition {:?} -> {:?}", self.state, next),
            ));
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_happy_path_runs_new_cloning_critical_done() {
        let mut donor = DonorMachine::new();
        donor.transition(DonorState::Cloning).unwrap();
        donor.transition(DonorState::Critical).unwrap();
        donor.transition(DonorState::Done).unwrap();
        assert_eq!(donor.state(), DonorState::Done);
    }

    #[test]
    fn abort_is_reachable_from_cloning_and_critical() {
        let mut donor = DonorMachine::new();
        donor.transition(DonorState::Cloning).unwrap();
        donor.transition(DonorState::Aborted).unwrap();
        assert_eq!(donor.state(), DonorState::Aborted);
    }

    #[test]
    fn done_cannot_abort() {
        let mut donor = DonorMachine::new();
        donor.transition(DonorState::Cloning).unwrap();
        donor.transition(DonorState::Critical).unwrap();
        donor.transition(DonorState::Done).unwrap();
        let err = donor.transition(DonorState::Aborted).unwrap_err();
        assert_eq!(err.code, ErrorCode::AssertionFailure);
    }

    #[test]
    fn cannot_skip_straight_to_critical() {
        let mut donor = DonorMachine::new();
        let err = donor.transition(DonorState::Critical).unwrap_err();
        assert_eq!(err.code, ErrorCode::AssertionFailure);
    }
}
