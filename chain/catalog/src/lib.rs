//! Chunk catalog: authoritative sharded-collection metadata, held by
//! the config-catalog node and cached (and periodically refreshed) by every
//! router and shard. Exposes the split/move mutation ops and the
//! stale-version protocol routers and shards use to decide whether a
//! request needs a metadata refresh before it can be trusted.

pub mod chunk;
pub mod collection;

pub use chunk::{Chunk, ChunkVersion, VersionCompare, compare_versions};
pub use collection::CollectionMetadata;

use std::collections::HashMap;

use parking_lot::RwLock;

use db_common::{ErrorCode, Status};
use db_document::shard_key::ShardKeyTuple;

/// Authoritative store of every sharded collection's metadata. Held by the
/// config-catalog node; routers and shards hold their own read-only cached
/// copy (not modeled here — that's `chain/router`'s and `chain/dispatch`'s
/// concern) refreshed against this on `StaleConfig`.
#[derive(Default)]
pub struct Catalog {
    collections: RwLock<HashMap<String, CollectionMetadata>>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog { collections: RwLock::new(HashMap::new()) }
    }

    pub fn create_collection(&self, meta: CollectionMetadata) -> Result<(), Status> {
        let mut collections = self.collections.write();
        if collections.contains_key(&meta.ns) {
            return Err(Status::new(ErrorCode::BadValue, format!("collection {} already sharded", meta.ns)));
        }
        collections.insert(meta.ns.clone(), meta);
        Ok(())
    }

    pub fn get(&self, ns: &str) -> Option<CollectionMetadata> {
        self.collections.read().get(ns).cloned()
    }

    /// Splits the chunk owning `at` into two at that key, bumping the
    /// collection's minor version — the catalog-side half of a chunk split;
    /// does not itself decide *when* to split (that's a dispatcher/shard
    /// decision based on chunk size, out of scope here).
    pub fn split_chunk(&self, ns: &str, at: &ShardKeyTuple) -> Result<(), Status> {
        let mut collections = self.collections.write();
        let meta = collections.get_mut(ns).ok_or_else(|| Status::new(ErrorCode::BadValue, format!("no such collection {ns}")))?;
        let idx = meta.chunk_index_for_key(at).ok_or_else(|| {
            Status::new(ErrorCode::BadValue, "split point does not fall within any existing chunk")
        })?;
        let original = meta.chunks()[idx].clone();
        if original.min.compare(at) == std::cmp::Ordering::Equal {
            return Err(Status::new(ErrorCode::BadValue, "split point equals the chunk's own min"));
        }
        let new_version = original.version().bump_minor();
        let mut left = original.clone();
        left.max = at.clone();
        left.set_version(new_version);
        let mut right = original;
        right.id = format!("{}-split", right.id);
        right.min = at.clone();
        right.set_version(new_version.bump_minor());
        meta.replace_chunk_at(idx, left);
        meta.insert_chunk(right);
        Ok(())
    }

    /// Reassigns a chunk to a new shard, bumping the collection's major
    /// version — the catalog-side half of a chunk move, invoked by the
    /// migration engine's recipient at cut-over.
    pub fn move_chunk(&self, ns: &str, chunk_id: &str, to_shard: &str) -> Result<ChunkVersion, Status> {
        let mut collections = self.collections.write();
        let meta = collections.get_mut(ns).ok_or_else(|| Status::new(ErrorCode::BadValue, format!("no such collection {ns}")))?;
        let idx = meta
            .chunks()
            .iter()
            .position(|c| c.id == chunk_id)
            .ok_or_else(|| Status::new(ErrorCode::BadValue, format!("no such chunk {chunk_id}")))?;
        let mut chunk = meta.chunks()[idx].clone();
        let collection_version = meta.version().ok_or_else(|| {
            Status::new(ErrorCode::AssertionFailure, "collection has chunks but no version")
        })?;
        let new_version = collection_version.bump_major();
        chunk.shard = to_shard.to_string();
        chunk.set_version(new_version);
        meta.replace_chunk_at(idx, chunk);
        Ok(new_version)
    }

    /// Checks `caller_version` against the collection's current version,
    /// returning the authoritative version alongside the comparison so the
    /// caller can decide between "proceed", "refresh metadata and retry",
    /// and "refresh and fail loudly" (an ahead caller, which should not
    /// happen absent a bug).
    pub fn check_version(&self, ns: &str, caller_version: ChunkVersion) -> Result<(VersionCompare, Option<ChunkVersion>), Status> {
        let collections = self.collections.read();
        let meta = collections.get(ns).ok_or_else(|| Status::new(ErrorCode::BadValue, format!("no such collection {ns}")))?;
        let authoritative = meta.version();
        match authoritative {
            None => Ok((VersionCompare::Equal, None)),
            Some(authoritative) => Ok((compare_versions(caller_version, authoritative), Some(authoritative))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db_document::shard_key::{KeyDirection, ShardKeyPattern};
    use db_document::{ObjectId, Value};

    fn seeded_catalog() -> (Catalog, ObjectId) {
        let catalog = Catalog::new();
        let epoch = ObjectId([9; 12]);
        let mut meta = CollectionMetadata::new("db.coll", ShardKeyPattern::new(vec![("x".into(), KeyDirection::Ascending)]), false);
        meta.insert_chunk(Chunk {
            id: "chunk-0".into(),
            ns: "db.coll".into(),
            min: ShardKeyTuple(vec![Value::MinKey]),
            max: ShardKeyTuple(vec![Value::MaxKey]),
            shard: "shard0".into(),
            lastmod_version: (1, 0),
            lastmod_epoch: epoch,
            jumbo: false,
        });
        catalog.create_collection(meta).unwrap();
        (catalog, epoch)
    }

    #[test]
    fn split_chunk_produces_two_chunks_with_bumped_minor_version() {
        let (catalog, _) = seeded_catalog();
        catalog.split_chunk("db.coll", &ShardKeyTuple(vec![Value::Int32(50)])).unwrap();
        let meta = catalog.get("db.coll").unwrap();
        assert_eq!(meta.chunks().len(), 2);
        assert_eq!(meta.version().unwrap().major, 1);
        assert!(meta.version().unwrap().minor >= 1);
    }

    #[test]
    fn move_chunk_bumps_major_version_and_reassigns_shard() {
        let (catalog, _) = seeded_catalog();
        let new_version = catalog.move_chunk("db.coll", "chunk-0", "shard1").unwrap();
        assert_eq!(new_version.major, 2);
        let meta = catalog.get("db.coll").unwrap();
        assert_eq!(meta.chunks()[0].shard, "shard1");
    }

    #[test]
    fn check_version_reports_epoch_mismatch_for_a_stale_epoch() {
        let (catalog, _) = seeded_catalog();
        let wrong_epoch = ChunkVersion::new(ObjectId([1; 12]));
        let (cmp, _) = catalog.check_version("db.coll", wrong_epoch).unwrap();
        assert_eq!(cmp, VersionCompare::EpochMismatch);
    }

    #[test]
    fn check_version_reports_caller_stale_after_a_move() {
        let (catalog, epoch) = seeded_catalog();
        let caller_version = ChunkVersion::new(epoch);
        catalog.move_chunk("db.coll", "chunk-0", "shard1").unwrap();
        let (cmp, _) = catalog.check_version("db.coll", caller_version).unwrap();
        assert_eq!(cmp, VersionCompare::CallerStale);
    }
}
