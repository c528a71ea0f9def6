//! Computing the set of shards an operation must reach: intersect the operation's predicate against the
//! collection's chunk ranges.

use db_catalog::CollectionMetadata;
use db_document::shard_key::ShardKeyTuple;

/// What an operation's query predicate implies about the shard-key space it
/// touches. The planner/dispatcher is responsible for deriving this from
/// the actual query document; the router only needs the result.
#[derive(Debug, Clone)]
pub enum ShardKeyPredicate {
    /// An exact shard-key equality match — always exactly one shard.
    Equality(ShardKeyTuple),
    /// A half-open range `[min, max)`; either bound may be absent meaning
    /// unbounded on that side.
    Range { min: Option<ShardKeyTuple>, max: Option<ShardKeyTuple> },
    /// No shard-key predicate at all: every shard holding a chunk of the
    /// collection must be targeted (scatter/gather).
    Unconstrained,
}

/// Returns the shards an operation with `predicate` must be sent to,
/// deduplicated and sorted for deterministic fan-out order.
pub fn target_shards(meta: &CollectionMetadata, predicate: &ShardKeyPredicate) -> Vec<String> {
    let mut shards = match predicate {
        ShardKeyPredicate::Equality(key) => {
            meta.chunk_for_key(key).map(|c| vec![c.shard.clone()]).unwrap_or_default()
        }
        ShardKeyPredicate::Range { min, max } => meta
            .chunks()
            .iter()
            .filter(|c| range_overlaps(min, max, &c.min, &c.max))
            .map(|c| c.shard.clone())
            .collect(),
        ShardKeyPredicate::Unconstrained => meta.shards(),
    };
    shards.sort();
    shards.dedup();
    shards
}

/// Whether chunk range `[chunk_min, chunk_max)` overlaps predicate range
/// `[min, max)` (absent bound = unbounded on that side): overlap is just
/// "neither range entirely precedes the other".
fn range_overlaps(
    min: &Option<ShardKeyTuple>,
    max: &Option<ShardKeyTuple>,
    chunk_min: &ShardKeyTuple,
    chunk_max: &ShardKeyTuple,
) -> bool {
    let predicate_ends_before_chunk = match max {
        Some(max) => max.compare(chunk_min) != std::cmp::Ordering::Greater,
        None => false,
    };
    let predicate_starts_after_chunk = match min {
        Some(min) => min.compare(chunk_max) != std::cmp::Ordering::Less,
        None => false,
    };
    !predicate_ends_before_chunk && !predicate_starts_after_chunk
}

#[cfg(test)]
mod tests {
    use super::*;
    use db_catalog::{chunk::Chunk, CollectionMetadata};
    use db_document::shard_key::{KeyDirection, ShardKeyPattern};
    use db_document::{ObjectId, Value};

    fn meta() -> CollectionMetadata {
        let epoch = ObjectId([1; 12]);
        let mut meta = CollectionMetadata::new("db.coll", ShardKeyPattern::new(vec![("x".into(), KeyDirection::Ascending)]), false);
        meta.insert_chunk(Chunk {
            id: "c0".into(),
            ns: "db.coll".into(),
            min: ShardKeyTuple(vec![Value::MinKey]),
            max: ShardKeyTuple(vec![Value::Int32(100)]),
            shard: "shard0".into(),
            lastmod_version: (1, 0),
            lastmod_epoch: epoch,
            jumbo: false,
        });
        meta.insert_chunk(Chunk {
            id: "c1".into(),
            ns: "db.coll".into(),
            min: ShardKeyTuple(vec![Value::Int32(100)]),
            max: ShardKeyTuple(vec![Value::MaxKey]),
            shard: "shard1".into(),
            lastmod_version: (1, 0),
            lastmod_epoch: epoch,
            jumbo: false,
        });
        meta
    }

    #[test]
    fn equality_on_the_shard_key_targets_exactly_one_shard() {
        let shards = target_shards(&meta(), &ShardKeyPredicate::Equality(ShardKeyTuple(vec![Value::Int32(50)])));
        assert_eq!(shards, vec!["shard0".to_string()]);
    }

    #[test]
    fn unconstrained_targets_every_shard() {
        let shards = target_shards(&meta(), &ShardKeyPredicate::Unconstrained);
        assert_eq!(shards, vec!["shard0".to_string(), "shard1".to_string()]);
    }

    #[test]
    fn a_range_spanning_the_split_point_targets_both_shards() {
        let predicate = ShardKeyPredicate::Range {
            min: Some(ShardKeyTuple(vec![Value::Int32(50)])),
            max: Some(ShardKeyTuple(vec![Value::Int32(150)])),
        };
        let shards = target_shards(&meta(), &predicate);
        assert_eq!(shards, vec!["shard0".to_string(), "shard1".to_string()]);
    }

    #[test]
    fn a_range_entirely_within_one_chunk_targets_only_that_shard() {
        let predicate = ShardKeyPredicate::Range {
            min: Some(ShardKeyTuple(vec![Value::Int32(10)])),
            max: Some(ShardKeyTuple(vec![Value::Int32(20)])),
        };
        let shards = target_shards(&meta(), &predicate);
        assert_eq!(shards, vec!["shard0".to_string()]);
    }
}
