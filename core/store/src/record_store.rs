use db_common::Status;

use crate::locator::RecordLocator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    Forward,
    Backward,
}

/// Ordered mapping from opaque record-locator to record bytes, with cursor
/// iteration and snapshot reads. Every call is expected to execute
/// within the caller's current recovery unit, which establishes the read
/// snapshot on first access.
pub trait RecordStore: Send + Sync {
    fn insert(&self, data: &[u8]) -> Result<RecordLocator, Status>;
    fn update(&self, loc: RecordLocator, data: &[u8]) -> Result<(), Status>;
    fn delete(&self, loc: RecordLocator) -> Result<(), Status>;
    fn find_by_loc(&self, loc: RecordLocator) -> Result<Option<Vec<u8>>, Status>;
    fn scan(&self, direction: ScanDirection, start: Option<RecordLocator>) -> Box<dyn RecordCursor>;
    fn truncate(&self) -> Result<(), Status>;
    fn size(&self) -> u64;
    fn count(&self) -> u64;
}

/// A `RecordStore` that is also a bounded ring: oldest records are evicted
/// once the capped size (or, if set, the capped document count) is
/// exceeded, FIFO, with a truncation callback so dependents (the oplog-tail
/// cursor) can reposition rather than crash.
pub trait CappedRecordStore: RecordStore {
    fn cap_bytes(&self) -> u64;
    fn cap_max_docs(&self) -> Option<u64>;

    /// Registers a callback invoked with the locator of each record evicted
    /// by capped truncation, in eviction order.
    fn on_truncate(&self, callback: Box<dyn Fn(RecordLocator) + Send + Sync>);
}

pub trait RecordCursor: Send {
    /// Advances and returns the next `(locator, data)` pair, or `None` at
    /// end of stream. Capped-collection tailing cursors instead use
    /// `AwaitData` semantics implemented one level up (`chain::oplog`),
    /// since blocking belongs to the tailer, not the storage cursor.
    fn next(&mut self) -> Option<(RecordLocator, Vec<u8>)>;
}
