//! Ties shard targeting, a cached routing table, and the stale-version
//! retry protocol together. Talking to the actual shards and the
//! config server over the wire is `server/routerd`'s job; this models the
//! decision logic behind a `MetadataSource` trait the same way
//! `db-replset`'s `SyncSource` abstracts the replication wire, so it is
//! exercised without a real config-server connection.

use std::collections::HashMap;

use parking_lot::RwLock;

use db_catalog::{ChunkVersion, CollectionMetadata};
use db_common::{ErrorCode, Status};

use crate::stale_version::{decide_after_stale_config, RetryBudget, RetryDecision};
use crate::target_shards::{target_shards, ShardKeyPredicate};

/// Where the router's cached routing table ultimately comes from — the
/// config server in a real deployment, an in-process `Catalog` in tests.
pub trait MetadataSource {
    fn fetch(&self, ns: &str) -> Result<CollectionMetadata, Status>;
}

/// What sending one shard a request at a given version yielded.
pub enum ShardOutcome<T> {
    Succeeded(T),
    /// The shard rejected the version and reports its own.
    Stale(ChunkVersion),
    Failed(Status),
}

/// Caches `CollectionMetadata` per namespace, refreshing from a
/// `MetadataSource` on demand. Not itself thread-safe across processes —
/// one `Router` lives per routing process, as one cache per `mongos`.
pub struct Router {
    source: Box<dyn MetadataSource + Send + Sync>,
    cache: RwLock<HashMap<String, CollectionMetadata>>,
    max_attempts: u32,
}

impl Router {
    pub fn new(source: Box<dyn MetadataSource + Send + Sync>) -> Self {
        Router { source, cache: RwLock::new(HashMap::new()), max_attempts: 3 }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    fn metadata(&self, ns: &str) -> Result<CollectionMetadata, Status> {
        if let Some(meta) = self.cache.read().get(ns).cloned() {
            return Ok(meta);
        }
        self.refresh(ns)
    }

    /// Forces a reload from the source, overwriting whatever is cached.
    pub fn refresh(&self, ns: &str) -> Result<CollectionMetadata, Status> {
        let meta = self.source.fetch(ns)?;
        self.cache.write().insert(ns.to_string(), meta.clone());
        Ok(meta)
    }

    /// Sends an operation to every shard `predicate` targets, retrying a
    /// shard that reports `StaleConfig` per the bounded-retry protocol.
    /// `send` performs the actual wire call at the version this router
    /// currently believes is correct for that shard's chunks.
    pub fn route<T>(
        &self,
        ns: &str,
        predicate: &ShardKeyPredicate,
        mut send: impl FnMut(&str, ChunkVersion) -> ShardOutcome<T>,
    ) -> Result<Vec<(String, T)>, Status> {
        let mut meta = self.metadata(ns)?;
        let mut results = Vec::new();
        for shard in target_shards(&meta, predicate) {
            let mut budget = RetryBudget::new(self.max_attempts);
            loop {
                budget.check()?;
                budget.record_attempt();
                let sent_version = meta.shard_version(&shard).ok_or_else(|| {
                    Status::new(
                        ErrorCode::AssertionFailure,
                        format!("routing table has no version for shard {shard} of a sharded collection"),
                    )
                })?;
                match send(&shard, sent_version) {
                    ShardOutcome::Succeeded(value) => {
                        results.push((shard.clone(), value));
                        break;
                    }
                    ShardOutcome::Failed(status) => return Err(status),
                    ShardOutcome::Stale(wanted) => {
                        match decide_after_stale_config(sent_version, wanted) {
                            RetryDecision::NoAction => break,
                            RetryDecision::RefreshAndRetry => {
                                meta = self.refresh(ns)?;
                                continue;
                            }
                            RetryDecision::RetryWithoutCatalogReload => continue,
                        }
                    }
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db_catalog::chunk::Chunk;
    use db_document::shard_key::{KeyDirection, ShardKeyPattern, ShardKeyTuple};
    use db_document::{ObjectId, Value};
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

    fn meta_with_version(epoch: ObjectId, major: u64) -> CollectionMetadata {
        let mut meta = CollectionMetadata::new("db.coll", ShardKeyPattern::new(vec![("x".into(), KeyDirection::Ascending)]), false);
        meta.insert_chunk(Chunk {
            id: "c0".into(),
            ns: "db.coll".into(),
            min: ShardKeyTuple(vec![Value::MinKey]),
            max: ShardKeyTuple(vec![Value::MaxKey]),
            shard: "shard0".into(),
            lastmod_version: (major, 0),
            lastmod_epoch: epoch,
            jumbo: false,
        });
        meta
    }

    struct FixedSource {
        epoch: ObjectId,
        major: AtomicU32,
    }

    impl MetadataSource for FixedSource {
        fn fetch(&self, _ns: &str) -> Result<CollectionMetadata, Status> {
            Ok(meta_with_version(self.epoch, self.major.load(AtomicOrdering::SeqCst) as u64))
        }
    }

    #[test]
    fn a_successful_send_requires_no_retry() {
        let epoch = ObjectId([1; 12]);
        let router = Router::new(Box::new(FixedSource { epoch, major: AtomicU32::new(1) }));
        let result = router
            .route::<()>("db.coll", &ShardKeyPredicate::Unconstrained, |_shard, _version| ShardOutcome::Succeeded(()))
            .unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn a_stale_config_response_triggers_refresh_then_succeeds() {
        let epoch = ObjectId([1; 12]);
        let source = FixedSource { epoch, major: AtomicU32::new(1) };
        let router = Router::new(Box::new(source));
        let mut first_call = true;
        let result = router
            .route::<()>("db.coll", &ShardKeyPredicate::Unconstrained, |_shard, version| {
                if first_call {
                    first_call = false;
                    ShardOutcome::Stale(ChunkVersion { epoch, major: 2, minor: 0 })
                } else {
                    assert_eq!(version.major, 2);
                    ShardOutcome::Succeeded(())
                }
            })
            .unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn persistent_staleness_exhausts_the_retry_budget() {
        let epoch = ObjectId([1; 12]);
        let router = Router::new(Box::new(FixedSource { epoch, major: AtomicU32::new(1) })).with_max_attempts(2);
        let err = router
            .route::<()>("db.coll", &ShardKeyPredicate::Unconstrained, |_shard, _version| {
                ShardOutcome::Stale(ChunkVersion { epoch, major: 99, minor: 0 })
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::StaleConfig);
    }

    #[test]
    fn a_multi_shard_collection_sends_each_shard_its_own_version_not_the_collection_version() {
        // After a migrate, shard0 (the donor) still owns only its original
        // chunk at major=1 while shard1 (the recipient) owns a chunk at
        // major=2 — the collection version is 2, but shard0's own version
        // is still 1 and that's what it must be sent.
        let epoch = ObjectId([1; 12]);
        let mut meta =
            CollectionMetadata::new("db.coll", ShardKeyPattern::new(vec![("x".into(), KeyDirection::Ascending)]), false);
        meta.insert_chunk(Chunk {
            id: "c0".into(),
            ns: "db.coll".into(),
            min: ShardKeyTuple(vec![Value::MinKey]),
            max: ShardKeyTuple(vec![Value::Int32(50)]),
            shard: "shard0".into(),
            lastmod_version: (1, 0),
            lastmod_epoch: epoch,
            jumbo: false,
        });
        meta.insert_chunk(Chunk {
            id: "c1".into(),
            ns: "db.coll".into(),
            min: ShardKeyTuple(vec![Value::Int32(50)]),
            max: ShardKeyTuple(vec![Value::MaxKey]),
            shard: "shard1".into(),
            lastmod_version: (2, 0),
            lastmod_epoch: epoch,
            jumbo: false,
        });

        struct StaticSource(CollectionMetadata);
        impl MetadataSource for StaticSource {
            fn fetch(&self, _ns: &str) -> Result<CollectionMetadata, Status> {
                Ok(self.0.clone())
            }
        }

        let router = Router::new(Box::new(StaticSource(meta)));
        let versions_seen = std::sync::Mutex::new(Vec::new());
        let result = router
            .route::<()>("db.coll", &ShardKeyPredicate::Unconstrained, |shard, version| {
                versions_seen.lock().unwrap().push((shard.to_string(), version.major));
                ShardOutcome::Succeeded(())
            })
            .unwrap();
        assert_eq!(result.len(), 2);
        let mut seen = versions_seen.into_inner().unwrap();
        seen.sort();
        assert_eq!(seen, vec![("shard0".to_string(), 1), ("shard1".to_string(), 2)]);
    }

    #[test]
    fn an_epoch_mismatch_also_forces_a_refresh() {
        let epoch = ObjectId([1; 12]);
        let other_epoch = ObjectId([2; 12]);
        let router = Router::new(Box::new(FixedSource { epoch, major: AtomicU32::new(1) }));
        let mut calls = 0;
        let result = router
            .route::<()>("db.coll", &ShardKeyPredicate::Unconstrained, |_shard, _version| {
                calls += 1;
                if calls == 1 {
                    ShardOutcome::Stale(ChunkVersion::new(other_epoch))
                } else {
                    ShardOutcome::Succeeded(())
                }
            })
            .unwrap();
        assert_eq!(result.len(), 1);
    }
}
