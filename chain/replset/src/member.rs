//! Member state machine: `Startup → Startup2 → (Recovering |
//! Secondary | Primary) ↔ Rollback → Recovering`, plus the terminal/steady
//! states `Arbiter`, `Down`, `Removed`, `Fatal` a member can be observed in
//! from a peer's point of view.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberState {
    Startup,
    Startup2,
    Recovering,
    Secondary,
    Primary,
    Rollback,
    Arbiter,
    Down,
    Removed,
    Fatal,
}

impl MemberState {
    /// Whether a transition from `self` to `next` is one the coordinator
    /// ever performs. Used both to validate locally-driven transitions and
    /// to sanity-check a heartbeat-reported peer state.
    pub fn can_transition_to(self, next: MemberState) -> bool {
        use MemberState::*;
        if self == next {
            return true;
        }
        match (self, next) {
            (Startup, Startup2) => true,
            (Startup2, Recovering | Secondary) => true,
            (Recovering, Secondary | Rollback | Down) => true,
            (Secondary, Primary | Rollback | Recovering | Down) => true,
            (Primary, Recovering | Down) => true,
            (Rollback, Recovering) => true,
            (_, Removed) => true,
            (_, Fatal) => true,
            (_, Down) => true,
            _ => false,
        }
    }

    /// A member that can be elected primary: must already be caught up
    /// enough to serve reads and not itself mid-rollback or starting up.
    pub fn is_electable(self) -> bool {
        matches!(self, MemberState::Secondary)
    }

    pub fn is_voting_capable(self) -> bool {
        matches!(self, MemberState::Secondary | MemberState::Primary | MemberState::Arbiter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_must_pass_through_startup2_before_secondary() {
        assert!(MemberState::Startup.can_transition_to(MemberState::Startup2));
        assert!(!MemberState::Startup.can_transition_to(MemberState::Secondary));
    }

    #[test]
    fn secondary_can_become_primary_or_enter_rollback() {
        assert!(MemberState::Secondary.can_transition_to(MemberState::Primary));
        assert!(MemberState::Secondary.can_transition_to(MemberState::Rollback));
    }

    #[test]
    fn rollback_only_ever_returns_to_recovering() {
        assert!(MemberState::Rollback.can_transition_to(MemberState::Recovering));
        assert!(!MemberState::Rollback.can_transition_to(MemberState::Primary));
    }

    #[test]
    fn primary_is_not_directly_electable_again_without_stepping_down_first() {
        assert!(!MemberState::Primary.is_electable());
        assert!(MemberState::Secondary.is_electable());
    }

    #[test]
    fn any_state_can_be_reported_removed_or_fatal() {
        assert!(MemberState::Primary.can_transition_to(MemberState::Removed));
        assert!(MemberState::Startup.can_transition_to(MemberState::Fatal));
    }
}
