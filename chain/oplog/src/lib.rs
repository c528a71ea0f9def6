//! The replicated oplog: a capped record store holding a single
//! strictly-increasing `ts` stream, with tailing cursors that block for new
//! data rather than returning end-of-stream, and truncation detection so a
//! cursor that fell too far behind reports a hard error instead of silently
//! skipping entries.

pub mod entry;

pub use entry::{OpKind, OplogEntry};

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use db_common::{ErrorCode, Status};
use db_document::Timestamp;
use db_store::{CappedRecordStore, RecordLocator, RecordStore, ScanDirection};

fn ts_to_u64(ts: Timestamp) -> u64 {
    (u64::from(ts.t) << 32) | u64::from(ts.i)
}

/// Thin wrapper around a capped record store enforcing the oplog's single
/// invariant: every appended entry's `ts` is strictly greater than the last
/// one appended, under one writer (the global write lock makes this safe —
/// concurrent appenders are a dispatcher-level concern, not this crate's).
pub struct Oplog {
    store: Arc<dyn CappedRecordStore>,
    last_ts: AtomicU64,
    last_hash: AtomicI64,
    /// Highest `ts` (as the packed `t<<32|i` key) among the records evicted
    /// by capped truncation so far; a tailing cursor resuming from before
    /// this point can no longer be served.
    truncated_through: Arc<AtomicU64>,
    /// Locator-to-ts lookup populated on insert and drained by the
    /// truncation callback, since `CappedRecordStore::on_truncate` reports
    /// only the evicted locator.
    loc_ts: Arc<Mutex<HashMap<RecordLocator, u64>>>,
}

impl Oplog {
    pub fn new(store: Arc<dyn CappedRecordStore>) -> Self {
        let truncated_through = Arc::new(AtomicU64::new(0));
        let loc_ts: Arc<Mutex<HashMap<RecordLocator, u64>>> = Arc::new(Mutex::new(HashMap::new()));
        let watermark = truncated_through.clone();
        let lookup = loc_ts.clone();
        store.on_truncate(Box::new(move |loc: RecordLocator| {
            if let Some(packed) = lookup.lock().remove(&loc) {
                let mut prev = watermark.load(Ordering::SeqCst);
                while packed > prev {
                    match watermark.compare_exchange(prev, packed, Ordering::SeqCst, Ordering::SeqCst) {
                        Ok(_) => break,
                        Err(cur) => prev = cur,
                    }
                }
            }
        }));
        Oplog { store, last_ts: AtomicU64::new(0), last_hash: AtomicI64::new(0), truncated_through, loc_ts }
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        let packed = self.last_ts.load(Ordering::SeqCst);
        (packed != 0).then(|| Timestamp::new((packed >> 32) as u32, packed as u32))
    }

    /// Appends one entry, rejecting it with `WriteConflict` if `ts` is not
    /// strictly greater than the last appended entry's `ts` — the oplog
    /// equivalent of a write conflict, since it means two writers raced
    /// under what should have been exclusive access.
    pub fn append(&self, entry: &OplogEntry) -> Result<(), Status> {
        let packed = ts_to_u64(entry.ts);
        let prev = self.last_ts.load(Ordering::SeqCst);
        if packed <= prev {
            return Err(Status::new(ErrorCode::WriteConflict, "oplog entry ts did not strictly increase"));
        }
        let bytes = serde_json::to_vec(entry).map_err(|e| Status::new(ErrorCode::BadValue, e.to_string()))?;
        let loc = self.store.insert(&bytes)?;
        self.loc_ts.lock().insert(loc, packed);
        self.last_ts.store(packed, Ordering::SeqCst);
        self.last_hash.store(entry.h, Ordering::SeqCst);
        Ok(())
    }

    pub fn last_hash(&self) -> i64 {
        self.last_hash.load(Ordering::SeqCst)
    }

    /// Opens a tailing cursor positioned to read entries with `ts` strictly
    /// after `after` (or from the start of the log if `None`).
    pub fn tail(&self, after: Option<Timestamp>) -> TailingCursor {
        TailingCursor {
            store: self.store.clone(),
            truncated_through: self.truncated_through.clone(),
            position: after.map(ts_to_u64).unwrap_or(0),
            cursor: None,
        }
    }
}

/// A cursor that blocks (up to a deadline) rather than returning end of
/// stream when it catches up to the end of the log — `awaitData` semantics.
/// Transitions to `Dead` (surfaced as `CursorNotFound`) if its position was
/// truncated out of the capped log while it wasn't looking.
pub struct TailingCursor {
    store: Arc<dyn CappedRecordStore>,
    truncated_through: Arc<AtomicU64>,
    position: u64,
    cursor: Option<Box<dyn db_store::RecordCursor>>,
}

impl TailingCursor {
    fn refill(&mut self) {
        self.cursor = Some(self.store.scan(ScanDirection::Forward, None));
    }

    /// Returns the next entry with `ts` greater than the cursor's current
    /// position, blocking in short increments until `deadline` if none is
    /// immediately available. Returns `Ok(None)` on a clean timeout (the
    /// caller should retry, e.g. the next `getMore`) and `Err` with
    /// `CursorNotFound` if the position was truncated away.
    pub fn next_blocking(&mut self, deadline: Instant) -> Result<Option<OplogEntry>, Status> {
        loop {
            // A nonzero truncation watermark past our position means the
            // entries we still need to read are gone; there is no way to
            // catch up without a full resync.
            if self.truncated_through.load(Ordering::SeqCst) > self.position {
                return Err(Status::new(ErrorCode::CursorNotFound, "oplog tailing cursor fell off the back of the capped log"));
            }
            self.refill();
            let cursor = self.cursor.as_mut().expect("refill always populates it");
            while let Some((_loc, bytes)) = cursor.next() {
                let entry: OplogEntry =
                    serde_json::from_slice(&bytes).map_err(|e| Status::new(ErrorCode::BadValue, e.to_string()))?;
                let packed = ts_to_u64(entry.ts);
                if packed > self.position {
                    self.position = packed;
                    return Ok(Some(entry));
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db_document::Document;
    use db_store::RecordStoreOptions;
    use db_store::memory_engine::MemoryRecordStore;

    fn capped(cap_bytes: u64) -> Arc<MemoryRecordStore> {
        Arc::new(MemoryRecordStore::new(RecordStoreOptions { capped: true, capped_size_bytes: cap_bytes, capped_max_docs: None }))
    }

    #[test]
    fn append_rejects_non_increasing_timestamps() {
        let oplog = Oplog::new(capped(1 << 20));
        oplog.append(&OplogEntry::noop(Timestamp::new(2, 0), "a", 0)).unwrap();
        let err = oplog.append(&OplogEntry::noop(Timestamp::new(1, 0), "b", 0)).unwrap_err();
        assert_eq!(err.code, ErrorCode::WriteConflict);
    }

    #[test]
    fn tailing_cursor_reads_entries_appended_after_it_was_opened() {
        let oplog = Oplog::new(capped(1 << 20));
        oplog.append(&OplogEntry::insert(Timestamp::new(1, 0), "db.coll", Document::new(), 1)).unwrap();
        let mut cursor = oplog.tail(None);
        let entry = cursor.next_blocking(Instant::now() + Duration::from_millis(50)).unwrap();
        assert!(entry.is_some());
        let none = cursor.next_blocking(Instant::now() + Duration::from_millis(20)).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn tailing_cursor_resumes_from_its_last_position() {
        let oplog = Oplog::new(capped(1 << 20));
        oplog.append(&OplogEntry::insert(Timestamp::new(1, 0), "db.coll", Document::new(), 1)).unwrap();
        oplog.append(&OplogEntry::insert(Timestamp::new(2, 0), "db.coll", Document::new(), 2)).unwrap();
        let mut cursor = oplog.tail(Some(Timestamp::new(1, 0)));
        let entry = cursor.next_blocking(Instant::now() + Duration::from_millis(50)).unwrap().unwrap();
        assert_eq!(entry.ts, Timestamp::new(2, 0));
    }

    #[test]
    fn cursor_positioned_before_a_truncated_entry_reports_cursor_not_found() {
        let oplog = Oplog::new(capped(40));
        oplog.append(&OplogEntry::insert(Timestamp::new(1, 0), "db.coll", Document::new(), 1)).unwrap();
        let mut cursor = oplog.tail(Some(Timestamp::new(1, 0)));
        for t in 2..30 {
            oplog
                .append(&OplogEntry::insert(
                    Timestamp::new(t, 0),
                    "db.coll",
                    Document::builder().field("pad", db_document::Value::String("x".repeat(20))).build(),
                    t as i64,
                ))
                .unwrap();
        }
        let err = cursor.next_blocking(Instant::now() + Duration::from_millis(20)).unwrap_err();
        assert_eq!(err.code, ErrorCode::CursorNotFound);
    }
}
