//! Read-concern levels bound which snapshot a read is allowed to use.
//! `local` reads whatever the storage engine's latest snapshot is;
//! `majority` reads are pinned to a snapshot no newer than the
//! majority-committed point reported by the replica set (spec.md §5's
//! ordering guarantee: "a majority read returns a snapshot whose ts is
//! <= the majority-committed point at the moment the snapshot was taken").

use db_document::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadConcernLevel {
    Local,
    Majority,
}

/// Whether a snapshot taken at `snapshot_ts` satisfies `level`, given the
/// replica set's current majority-committed point. `Local` is always
/// satisfied; `Majority` requires the snapshot not to be ahead of the
/// committed point, since a majority read must not observe writes that
/// could still be rolled back.
pub fn snapshot_satisfies(level: ReadConcernLevel, snapshot_ts: Timestamp, majority_committed_ts: Timestamp) -> bool {
    match level {
        ReadConcernLevel::Local => true,
        ReadConcernLevel::Majority => snapshot_ts <= majority_committed_ts,
    }
}

/// The snapshot ts a `majority` read should actually use: the
/// majority-committed point itself, clamped down if the caller's
/// requested snapshot is ahead of it. `local` reads pass the requested
/// snapshot through unchanged.
pub fn bound_snapshot(
    level: ReadConcernLevel,
    requested_ts: Timestamp,
    majority_committed_ts: Timestamp,
) -> Timestamp {
    match level {
        ReadConcernLevel::Local => requested_ts,
        ReadConcernLevel::Majority => requested_ts.min(majority_committed_ts),
    }
}
