//! The stale-version protocol the router speaks against each shard.
//! Every inter-node operation carries `(ns, shardVersion)`; this module is
//! the router's half — deciding, from a shard's response, whether to
//! refresh cached metadata and whether the request should be retried.

use db_catalog::{compare_versions, ChunkVersion, VersionCompare};
use db_common::{ErrorCode, Status};

/// What the router should do after sending an operation at `sent_version`
/// and either succeeding or receiving a `StaleConfig` response carrying the
/// shard's own idea of the current version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The operation succeeded or failed for an unrelated reason; nothing
    /// to do.
    NoAction,
    /// Reload metadata from the catalog, then retry the operation with the
    /// refreshed version.
    RefreshAndRetry,
    /// The shard is behind the router's own metadata — refresh to confirm
    /// and retry locally without going back to the catalog.
    RetryWithoutCatalogReload,
}

/// Interprets a shard's `StaleConfig(wanted)` response against the version
/// the router sent.
pub fn decide_after_stale_config(sent: ChunkVersion, shard_wanted: ChunkVersion) -> RetryDecision {
    match compare_versions(sent, shard_wanted) {
        VersionCompare::EpochMismatch => RetryDecision::RefreshAndRetry,
        VersionCompare::CallerStale => RetryDecision::RefreshAndRetry,
        VersionCompare::CallerAhead => RetryDecision::RetryWithoutCatalogReload,
        VersionCompare::Equal => RetryDecision::NoAction,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryBudget {
    attempts_made: u32,
    max_attempts: u32,
}

impl RetryBudget {
    pub fn new(max_attempts: u32) -> Self {
        RetryBudget { attempts_made: 0, max_attempts }
    }

    pub fn record_attempt(&mut self) {
        self.attempts_made += 1;
    }

    pub fn exhausted(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }

    /// Returns `Ok(())` while retries remain, or `StaleConfig` once the
    /// bound is hit — surfaced to the client rather than retried forever,
    /// since an operator needs to know routing is persistently stale.
    pub fn check(&self) -> Result<(), Status> {
        if self.exhausted() {
            return Err(Status::new(ErrorCode::StaleConfig, "exceeded bounded retry count reloading shard metadata"));
        }
        Ok(())
    }
}
