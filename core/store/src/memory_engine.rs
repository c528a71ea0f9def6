//! In-memory reference storage engine. Used by the default test harness and
//! by `server/dbnode` when no `--dbpath` engine is configured; a
//! RocksDB-backed `StorageEngine` is the production choice (see
//! `RecordStoreOptions`/`db-common` for where that selection happens) but is
//! not exercised by this crate's own test suite, which avoids a real
//! RocksDB instance where it can.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use db_common::{ErrorCode, Status};
use db_document::Document;

use crate::index::{IndexAccessMethod, IndexCursor, IndexKey, IndexOptions, IndexValidationReport};
use crate::locator::{LocatorAllocator, RecordLocator};
use crate::record_store::{CappedRecordStore, RecordCursor, RecordStore, ScanDirection};
use crate::recovery_unit::{InMemoryRecoveryUnit, RecoveryUnit};
use crate::{RecordStoreOptions, StorageEngine};

pub struct MemoryRecordStore {
    allocator: LocatorAllocator,
    data: RwLock<BTreeMap<RecordLocator, Vec<u8>>>,
    capped: Option<CappedState>,
}

struct CappedState {
    cap_bytes: u64,
    cap_max_docs: Option<u64>,
    current_bytes: AtomicU64,
    on_truncate: Mutex<Vec<Box<dyn Fn(RecordLocator) + Send + Sync>>>,
}

impl MemoryRecordStore {
    pub fn new(options: RecordStoreOptions) -> Self {
        let capped = options.capped.then(|| CappedState {
            cap_bytes: options.capped_size_bytes,
            cap_max_docs: options.capped_max_docs,
            current_bytes: AtomicU64::new(0),
            on_truncate: Mutex::new(Vec::new()),
        });
        MemoryRecordStore { allocator: LocatorAllocator::default(), data: RwLock::new(BTreeMap::new()), capped }
    }

    fn evict_if_over_cap(&self) {
        let Some(capped) = &self.capped else { return };
        let mut data = self.data.write().unwrap();
        loop {
            let over_bytes = capped.current_bytes.load(Ordering::Relaxed) > capped.cap_bytes;
            let over_docs = capped.cap_max_docs.is_some_and(|max| data.len() as u64 > max);
            if !over_bytes && !over_docs {
                break;
            }
            let Some((&oldest, _)) = data.iter().next() else { break };
            if let Some(removed) = data.remove(&oldest) {
                capped.current_bytes.fetch_sub(removed.len() as u64, Ordering::Relaxed);
            }
            for cb in capped.on_truncate.lock().unwrap().iter() {
                cb(oldest);
            }
        }
    }
}

impl RecordStore for MemoryRecordStore {
    fn insert(&self, data: &[u8]) -> Result<RecordLocator, Status> {
        let loc = self.allocator.alloc();
        if let Some(capped) = &self.capped {
            capped.current_bytes.fetch_add(data.len() as u64, Ordering::Relaxed);
        }
        self.data.write().unwrap().insert(loc, data.to_vec());
        self.evict_if_over_cap();
        Ok(loc)
    }

    fn update(&self, loc: RecordLocator, data: &[u8]) -> Result<(), Status> {
        let mut guard = self.data.write().unwrap();
        if !guard.contains_key(&loc) {
            return Err(Status::new(ErrorCode::BadValue, format!("no record at {loc}")));
        }
        guard.insert(loc, data.to_vec());
        Ok(())
    }

    fn delete(&self, loc: RecordLocator) -> Result<(), Status> {
        self.data.write().unwrap().remove(&loc);
        Ok(())
    }

    fn find_by_loc(&self, loc: RecordLocator) -> Result<Option<Vec<u8>>, Status> {
        Ok(self.data.read().unwrap().get(&loc).cloned())
    }

    fn scan(&self, direction: ScanDirection, start: Option<RecordLocator>) -> Box<dyn RecordCursor> {
        let guard = self.data.read().unwrap();
        let mut items: Vec<(RecordLocator, Vec<u8>)> = match (direction, start) {
            (ScanDirection::Forward, Some(s)) => {
                guard.range(s..).map(|(k, v)| (*k, v.clone())).collect()
            }
            (ScanDirection::Forward, None) => guard.iter().map(|(k, v)| (*k, v.clone())).collect(),
            (ScanDirection::Backward, Some(s)) => {
                guard.range(..=s).rev().map(|(k, v)| (*k, v.clone())).collect()
            }
            (ScanDirection::Backward, None) => guard.iter().rev().map(|(k, v)| (*k, v.clone())).collect(),
        };
        items.reverse();
        Box::new(MemoryCursor { items })
    }

    fn truncate(&self) -> Result<(), Status> {
        self.data.write().unwrap().clear();
        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.read().unwrap().values().map(|v| v.len() as u64).sum()
    }

    fn count(&self) -> u64 {
        self.data.read().unwrap().len() as u64
    }
}

impl CappedRecordStore for MemoryRecordStore {
    fn cap_bytes(&self) -> u64 {
        self.capped.as_ref().map(|c| c.cap_bytes).unwrap_or(u64::MAX)
    }

    fn cap_max_docs(&self) -> Option<u64> {
        self.capped.as_ref().and_then(|c| c.cap_max_docs)
    }

    fn on_truncate(&self, callback: Box<dyn Fn(RecordLocator) + Send + Sync>) {
        if let Some(capped) = &self.capped {
            capped.on_truncate.lock().unwrap().push(callback);
        }
    }
}

struct MemoryCursor {
    items: Vec<(RecordLocator, Vec<u8>)>,
}

impl RecordCursor for MemoryCursor {
    fn next(&mut self) -> Option<(RecordLocator, Vec<u8>)> {
        self.items.pop()
    }
}

/// Reference `IndexAccessMethod`: keys are derived by a caller-supplied
/// closure (standing in for a real key-derivation strategy per index type —
/// out of scope here) and stored in a sorted map to an owning set of
/// locators.
pub struct MemoryIndex {
    generate: Box<dyn Fn(&Document) -> BTreeSet<IndexKey> + Send + Sync>,
    entries: RwLock<BTreeMap<IndexKey, BTreeSet<RecordLocator>>>,
    multikey: std::sync::atomic::AtomicBool,
}

impl MemoryIndex {
    pub fn new(generate: impl Fn(&Document) -> BTreeSet<IndexKey> + Send + Sync + 'static) -> Self {
        MemoryIndex {
            generate: Box::new(generate),
            entries: RwLock::new(BTreeMap::new()),
            multikey: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

impl IndexAccessMethod for MemoryIndex {
    fn generate_keys(&self, doc: &Document) -> BTreeSet<IndexKey> {
        let keys = (self.generate)(doc);
        if keys.len() > 1 {
            self.multikey.store(true, Ordering::Relaxed);
        }
        keys
    }

    fn insert(&self, keys: &BTreeSet<IndexKey>, loc: RecordLocator, opts: IndexOptions) -> Result<(), Status> {
        let mut entries = self.entries.write().unwrap();
        for key in keys {
            let bucket = entries.entry(key.clone()).or_default();
            if !opts.dups_allowed && !bucket.is_empty() && !bucket.contains(&loc) {
                if opts.drop_dups {
                    continue;
                }
                return Err(Status::new(ErrorCode::DuplicateKey, "duplicate key in unique index"));
            }
            bucket.insert(loc);
        }
        Ok(())
    }

    fn remove(&self, keys: &BTreeSet<IndexKey>, loc: RecordLocator) {
        let mut entries = self.entries.write().unwrap();
        for key in keys {
            if let Some(bucket) = entries.get_mut(key) {
                bucket.remove(&loc);
                if bucket.is_empty() {
                    entries.remove(key);
                }
            }
        }
    }

    fn new_cursor(&self, direction: ScanDirection) -> Box<dyn IndexCursor> {
        let entries = self.entries.read().unwrap();
        let mut flattened: Vec<(IndexKey, RecordLocator)> = entries
            .iter()
            .flat_map(|(k, locs)| locs.iter().map(move |l| (k.clone(), *l)))
            .collect();
        if direction == ScanDirection::Backward {
            flattened.reverse();
        }
        flattened.reverse();
        Box::new(MemoryIndexCursor { items: flattened })
    }

    fn validate(&self) -> Result<IndexValidationReport, Status> {
        let entries = self.entries.read().unwrap();
        let keys_examined = entries.len() as u64;
        let records_examined = entries.values().map(|v| v.len() as u64).sum();
        Ok(IndexValidationReport { keys_examined, records_examined, errors: Vec::new() })
    }

    fn is_multikey(&self) -> bool {
        self.multikey.load(Ordering::Relaxed)
    }
}

struct MemoryIndexCursor {
    items: Vec<(IndexKey, RecordLocator)>,
}

impl IndexCursor for MemoryIndexCursor {
    fn next(&mut self) -> Option<(IndexKey, RecordLocator)> {
        self.items.pop()
    }

    fn seek(&mut self, key: &IndexKey) {
        self.items.retain(|(k, _)| k >= key);
    }
}

/// In-memory `StorageEngine`: a namespace-keyed table of `MemoryRecordStore`s.
#[derive(Default)]
pub struct MemoryStorageEngine {
    stores: RwLock<std::collections::HashMap<String, Arc<MemoryRecordStore>>>,
}

impl StorageEngine for MemoryStorageEngine {
    fn create_record_store(&self, ns: &str, options: &RecordStoreOptions) -> Result<(), Status> {
        let mut stores = self.stores.write().unwrap();
        if stores.contains_key(ns) {
            return Err(Status::new(ErrorCode::BadValue, format!("record store {ns} already exists")));
        }
        stores.insert(ns.to_string(), Arc::new(MemoryRecordStore::new(options.clone())));
        Ok(())
    }

    fn get_record_store(&self, ns: &str) -> Option<Arc<dyn RecordStore>> {
        self.stores.read().unwrap().get(ns).map(|s| s.clone() as Arc<dyn RecordStore>)
    }

    fn drop_ident(&self, ns: &str) -> Result<(), Status> {
        self.stores.write().unwrap().remove(ns);
        Ok(())
    }

    fn new_recovery_unit(&self) -> Box<dyn RecoveryUnit> {
        Box::new(InMemoryRecoveryUnit::default())
    }
}

impl MemoryStorageEngine {
    /// Non-trait accessor for callers that need the concrete capped type
    /// (e.g. the oplog, which registers a truncation callback).
    pub fn get_capped_record_store(&self, ns: &str) -> Option<Arc<MemoryRecordStore>> {
        self.stores.read().unwrap().get(ns).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capped_store_evicts_oldest_past_byte_ceiling() {
        let store = MemoryRecordStore::new(RecordStoreOptions { capped: true, capped_size_bytes: 10, capped_max_docs: None });
        let first = store.insert(b"aaaaa").unwrap();
        store.insert(b"bbbbb").unwrap();
        store.insert(b"ccccc").unwrap();
        assert_eq!(store.find_by_loc(first).unwrap(), None);
    }

    #[test]
    fn index_insert_rejects_duplicate_unless_dups_allowed() {
        let index = MemoryIndex::new(|doc: &Document| {
            let mut set = BTreeSet::new();
            if let Some(v) = doc.get("k") {
                set.insert(format!("{v:?}").into_bytes());
            }
            set
        });
        let doc = Document::builder().field("k", db_document::Value::Int32(1)).build();
        let keys = index.generate_keys(&doc);
        index.insert(&keys, RecordLocator::new(1), IndexOptions::default()).unwrap();
        let err = index.insert(&keys, RecordLocator::new(2), IndexOptions::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateKey);
    }

    #[test]
    fn multikey_flag_set_once_a_document_yields_multiple_keys() {
        let index = MemoryIndex::new(|doc: &Document| {
            if let Some(db_document::Value::Array(items)) = doc.get("tags") {
                items.iter().map(|v| format!("{v:?}").into_bytes()).collect()
            } else {
                BTreeSet::new()
            }
        });
        let doc = Document::builder()
            .field("tags", db_document::Value::Array(vec![db_document::Value::Int32(1), db_document::Value::Int32(2)]))
            .build();
        let keys = index.generate_keys(&doc);
        assert!(index.is_multikey());
        assert_eq!(keys.len(), 2);
    }
}
