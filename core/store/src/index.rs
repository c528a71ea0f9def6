use std::collections::BTreeSet;

use db_common::Status;
use db_document::Document;

use crate::locator::RecordLocator;
use crate::record_store::ScanDirection;

/// A sorted byte key. Full-text tokenization, geo indexing, and other
/// index-type-specific key derivation are out of scope; every access
/// method, whatever it derives keys from, produces these.
pub type IndexKey = Vec<u8>;

#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOptions {
    pub dups_allowed: bool,
    pub drop_dups: bool,
    pub log_if_error: bool,
}

/// Derives sorted keys from documents and maintains a secondary index over
/// them. A **multikey** index is one where at least one document
/// produced more than one key.
pub trait IndexAccessMethod: Send + Sync {
    fn generate_keys(&self, doc: &Document) -> BTreeSet<IndexKey>;

    fn insert(&self, keys: &BTreeSet<IndexKey>, loc: RecordLocator, opts: IndexOptions) -> Result<(), Status>;

    fn remove(&self, keys: &BTreeSet<IndexKey>, loc: RecordLocator);

    fn new_cursor(&self, direction: ScanDirection) -> Box<dyn IndexCursor>;

    fn validate(&self) -> Result<IndexValidationReport, Status>;

    fn is_multikey(&self) -> bool;
}

pub trait IndexCursor: Send {
    fn next(&mut self) -> Option<(IndexKey, RecordLocator)>;

    /// Seeks to the first entry at or after `key` (or at/before, for a
    /// backward cursor), for range-scan starting points.
    fn seek(&mut self, key: &IndexKey);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexValidationReport {
    pub keys_examined: u64,
    pub records_examined: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexBuildMode {
    /// Exclusive collection lock, in-order bulk build ending in a single
    /// commit. `opts.drop_dups` governs whether a duplicate key drops the
    /// record (logging a delete oplog entry) or aborts the build.
    Foreground,
    /// Yielding scan with a duplicate-notification stage: concurrent
    /// deletes invalidate in-flight key material rather than the builder
    /// observing stale locators.
    Background,
}

/// Tracks an index build in progress. While `committed` is false the index
/// is present in the catalog but invisible to query planning — this is the
/// "index under construction" state.
pub struct IndexBuilder {
    mode: IndexBuildMode,
    committed: bool,
    dropped_dup_locs: Vec<RecordLocator>,
}

impl IndexBuilder {
    pub fn new(mode: IndexBuildMode) -> Self {
        IndexBuilder { mode, committed: false, dropped_dup_locs: Vec::new() }
    }

    pub fn mode(&self) -> IndexBuildMode {
        self.mode
    }

    pub fn is_visible_to_planning(&self) -> bool {
        self.committed
    }

    /// Called by the bulk loader when a duplicate key is dropped rather than
    /// failing the build; the caller (the foreground build driver) is
    /// responsible for appending the corresponding delete oplog entry.
    pub fn record_dropped_duplicate(&mut self, loc: RecordLocator) {
        self.dropped_dup_locs.push(loc);
    }

    pub fn dropped_duplicates(&self) -> &[RecordLocator] {
        &self.dropped_dup_locs
    }

    pub fn commit(&mut self) {
        self.committed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_starts_invisible_to_planning() {
        let builder = IndexBuilder::new(IndexBuildMode::Background);
        assert!(!builder.is_visible_to_planning());
    }

    #[test]
    fn commit_makes_the_index_visible() {
        let mut builder = IndexBuilder::new(IndexBuildMode::Foreground);
        builder.commit();
        assert!(builder.is_visible_to_planning());
    }

    #[test]
    fn dropped_duplicates_accumulate_in_order() {
        let mut builder = IndexBuilder::new(IndexBuildMode::Foreground);
        builder.record_dropped_duplicate(RecordLocator::new(1));
        builder.record_dropped_duplicate(RecordLocator::new(2));
        assert_eq!(builder.dropped_duplicates(), &[RecordLocator::new(1), RecordLocator::new(2)]);
    }
}
