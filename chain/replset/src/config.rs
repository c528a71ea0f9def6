//! Replica-set configuration: the membership list a reconfig replaces
//! wholesale, plus the per-member settings election and sync-source
//! selection consult (priority, votes, arbiter/hidden flags).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberConfig {
    pub id: u32,
    pub host: String,
    /// Zero disables election eligibility without removing the member.
    pub priority: f64,
    pub votes: u32,
    pub arbiter_only: bool,
    pub hidden: bool,
}

impl MemberConfig {
    pub fn voter(id: u32, host: impl Into<String>) -> Self {
        MemberConfig { id, host: host.into(), priority: 1.0, votes: 1, arbiter_only: false, hidden: false }
    }

    pub fn arbiter(id: u32, host: impl Into<String>) -> Self {
        MemberConfig { id, host: host.into(), priority: 0.0, votes: 1, arbiter_only: true, hidden: false }
    }

    pub fn is_electable(&self) -> bool {
        !self.arbiter_only && self.priority > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplSetConfig {
    pub set_name: String,
    pub version: u64,
    pub members: Vec<MemberConfig>,
}

impl ReplSetConfig {
    pub fn new(set_name: impl Into<String>, members: Vec<MemberConfig>) -> Self {
        ReplSetConfig { set_name: set_name.into(), version: 1, members }
    }

    pub fn member(&self, id: u32) -> Option<&MemberConfig> {
        self.members.iter().find(|m| m.id == id)
    }

    pub fn total_votes(&self) -> u32 {
        self.members.iter().map(|m| m.votes).sum()
    }

    pub fn majority(&self) -> u32 {
        self.total_votes() / 2 + 1
    }

    /// A reconfig with a higher `version` always wins regardless of where
    /// it arrived from; equal or lower versions are ignored by the
    /// receiver.
    pub fn supersedes(&self, other: &ReplSetConfig) -> bool {
        self.version > other.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ReplSetConfig {
        ReplSetConfig::new(
            "rs0",
            vec![MemberConfig::voter(0, "a:27017"), MemberConfig::voter(1, "b:27017"), MemberConfig::voter(2, "c:27017")],
        )
    }

    #[test]
    fn majority_of_three_voters_is_two() {
        assert_eq!(sample().majority(), 2);
    }

    #[test]
    fn arbiter_is_not_electable() {
        let arbiter = MemberConfig::arbiter(3, "d:27017");
        assert!(!arbiter.is_electable());
    }

    #[test]
    fn higher_version_supersedes_lower() {
        let mut newer = sample();
        newer.version = 2;
        assert!(newer.supersedes(&sample()));
        assert!(!sample().supersedes(&newer));
    }
}
