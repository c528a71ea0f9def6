//! Authorization: every operation declares the actions it requires;
//! the dispatcher checks them against the connection's granted action set
//! before acquiring any lock, so an unauthorized caller never blocks on
//! contention it was never entitled to attempt.

use std::collections::HashSet;

use db_common::{ErrorCode, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Find,
    Insert,
    Update,
    Remove,
    RunCommand,
    ShardingInternal,
}

#[derive(Debug, Clone, Default)]
pub struct Privileges {
    granted: HashSet<Action>,
}

impl Privileges {
    pub fn grant(&mut self, action: Action) {
        self.granted.insert(action);
    }

    pub fn check(&self, required: &[Action]) -> Result<(), Status> {
        for action in required {
            if !self.granted.contains(action) {
                return Err(Status::new(ErrorCode::BadValue, format!("not authorized to perform {action:?}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn an_ungranted_action_is_rejected() {
        let privileges = Privileges::default();
        let err = privileges.check(&[Action::Insert]).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadValue);
    }

    #[test]
    fn a_granted_action_passes() {
        let mut privileges = Privileges::default();
        privileges.grant(Action::Find);
        privileges.check(&[Action::Find]).unwrap();
    }

    #[test]
    fn missing_just_one_of_several_required_actions_fails_the_whole_check() {
        let mut privileges = Privileges::default();
        privileges.grant(Action::Find);
        let err = privileges.check(&[Action::Find, Action::RunCommand]).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadValue);
    }
}
