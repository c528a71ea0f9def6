use db_document::shard_key::{ShardKeyPattern, ShardKeyTuple};

use crate::chunk::{Chunk, ChunkVersion};

/// A sharded collection's metadata: its shard-key pattern and its chunks,
/// kept sorted by `min` so range lookups are a binary search. Field names
/// mirror `config.collections` (`_id` as the full namespace, `key` as the
/// shard-key pattern, `unique`, `dropped`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CollectionMetadata {
    #[serde(rename = "_id")]
    pub ns: String,
    pub key: ShardKeyPattern,
    pub unique: bool,
    #[serde(default)]
    pub dropped: bool,
    chunks: Vec<Chunk>,
}

impl CollectionMetadata {
    pub fn new(ns: impl Into<String>, key: ShardKeyPattern, unique: bool) -> Self {
        CollectionMetadata { ns: ns.into(), key, unique, dropped: false, chunks: Vec::new() }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Inserts a chunk, keeping `chunks` sorted by `min` — callers
    /// (catalog mutation ops) are expected to maintain the "chunks
    /// partition the full key space with no gaps or overlaps" invariant
    /// themselves; this just keeps the backing vector searchable.
    pub fn insert_chunk(&mut self, chunk: Chunk) {
        let pos = self.chunks.partition_point(|c| c.min.compare(&chunk.min) == std::cmp::Ordering::Less);
        self.chunks.insert(pos, chunk);
    }

    pub fn replace_chunk_at(&mut self, index: usize, chunk: Chunk) {
        self.chunks[index] = chunk;
    }

    /// Finds the chunk owning `key`, if the collection has one covering it.
    pub fn chunk_for_key(&self, key: &ShardKeyTuple) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.contains(key))
    }

    pub fn chunk_index_for_key(&self, key: &ShardKeyTuple) -> Option<usize> {
        self.chunks.iter().position(|c| c.contains(key))
    }

    /// The collection's version: the highest version among its chunks, or
    /// a freshly-minted zero version if it has none yet (unsharded or just
    /// created).
    pub fn version(&self) -> Option<ChunkVersion> {
        self.chunks.iter().map(Chunk::version).max_by_key(|v| (v.major, v.minor))
    }

    /// A given shard's version: the highest version among the chunks it
    /// owns, or `None` if it owns no chunk of this collection. This, not
    /// the collection version, is what a caller sends on an operation
    /// targeted at that shard (spec.md §4.7) — after a migrate the donor's
    /// own max version can trail the collection version held by whichever
    /// shard now owns the highest chunk.
    pub fn shard_version(&self, shard: &str) -> Option<ChunkVersion> {
        self.chunks.iter().filter(|c| c.shard == shard).map(Chunk::version).max_by_key(|v| (v.major, v.minor))
    }

    /// Every shard that currently owns at least one chunk of this
    /// collection — the router's fan-out target set for an unconstrained
    /// (scatter/gather) query.
    pub fn shards(&self) -> Vec<String> {
        let mut shards: Vec<String> = self.chunks.iter().map(|c| c.shard.clone()).collect();
        shards.sort();
        shards.dedup();
        shards
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db_document::shard_key::KeyDirection;
    use db_document::{ObjectId, Value};

    fn chunk(min: i32, max: i32, shard: &str, epoch: ObjectId) -> Chunk {
        Chunk {
            id: format!("ns-{min}"),
            ns: "db.coll".into(),
            min: ShardKeyTuple(vec![Value::Int32(min)]),
            max: ShardKeyTuple(vec![Value::Int32(max)]),
            shard: shard.into(),
            lastmod_version: (1, 0),
            lastmod_epoch: epoch,
            jumbo: false,
        }
    }

    #[test]
    fn insert_chunk_keeps_chunks_sorted_by_min() {
        let epoch = ObjectId([1; 12]);
        let mut meta = CollectionMetadata::new("db.coll", ShardKeyPattern::new(vec![("x".into(), KeyDirection::Ascending)]), false);
        meta.insert_chunk(chunk(10, 20, "shard1", epoch));
        meta.insert_chunk(chunk(0, 10, "shard0", epoch));
        let mins: Vec<i32> = meta.chunks().iter().map(|c| match &c.min.0[0] { Value::Int32(n) => *n, _ => panic!() }).collect();
        assert_eq!(mins, vec![0, 10]);
    }

    #[test]
    fn chunk_for_key_finds_the_owning_range() {
        let epoch = ObjectId([1; 12]);
        let mut meta = CollectionMetadata::new("db.coll", ShardKeyPattern::new(vec![("x".into(), KeyDirection::Ascending)]), false);
        meta.insert_chunk(chunk(0, 10, "shard0", epoch));
        meta.insert_chunk(chunk(10, 20, "shard1", epoch));
        let found = meta.chunk_for_key(&ShardKeyTuple(vec![Value::Int32(15)])).unwrap();
        assert_eq!(found.shard, "shard1");
    }

    #[test]
    fn shards_lists_each_owner_once() {
        let epoch = ObjectId([1; 12]);
        let mut meta = CollectionMetadata::new("db.coll", ShardKeyPattern::new(vec![("x".into(), KeyDirection::Ascending)]), false);
        meta.insert_chunk(chunk(0, 10, "shard0", epoch));
        meta.insert_chunk(chunk(10, 20, "shard0", epoch));
        meta.insert_chunk(chunk(20, 30, "shard1", epoch));
        assert_eq!(meta.shards(), vec!["shard0".to_string(), "shard1".to_string()]);
    }
}
