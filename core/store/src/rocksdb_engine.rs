//! RocksDB-backed `StorageEngine`, the production choice behind the same
//! trait the in-memory engine implements. Each namespace gets its own
//! column family; locators are the namespace's monotone row counter encoded
//! big-endian so that `scan` returns insertion order directly from RocksDB's
//! own key order, keying column families by logical collection.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use db_common::{ErrorCode, Status};
use rocksdb::{ColumnFamilyDescriptor, Options, DB};

use crate::locator::RecordLocator;
use crate::record_store::{RecordCursor, RecordStore, ScanDirection};
use crate::recovery_unit::{InMemoryRecoveryUnit, RecoveryUnit};
use crate::{RecordStoreOptions, StorageEngine};

fn encode_loc(loc: RecordLocator) -> [u8; 8] {
    loc.raw().to_be_bytes()
}

fn decode_loc(bytes: &[u8]) -> RecordLocator {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(bytes);
    RecordLocator::new(u64::from_be_bytes(arr))
}

pub struct RocksDbRecordStore {
    db: Arc<DB>,
    cf_name: String,
    next_loc: AtomicU64,
}

impl RocksDbRecordStore {
    fn cf(&self) -> &rocksdb::ColumnFamily {
        self.db.cf_handle(&self.cf_name).expect("column family created at store-open time")
    }
}

impl RecordStore for RocksDbRecordStore {
    fn insert(&self, data: &[u8]) -> Result<RecordLocator, Status> {
        let raw = self.next_loc.fetch_add(1, Ordering::SeqCst);
        let loc = RecordLocator::new(raw);
        self.db
            .put_cf(self.cf(), encode_loc(loc), data)
            .map_err(|e| Status::new(ErrorCode::BadValue, format!("rocksdb put failed: {e}")))?;
        Ok(loc)
    }

    fn update(&self, loc: RecordLocator, data: &[u8]) -> Result<(), Status> {
        self.db
            .put_cf(self.cf(), encode_loc(loc), data)
            .map_err(|e| Status::new(ErrorCode::BadValue, format!("rocksdb put failed: {e}")))
    }

    fn delete(&self, loc: RecordLocator) -> Result<(), Status> {
        self.db
            .delete_cf(self.cf(), encode_loc(loc))
            .map_err(|e| Status::new(ErrorCode::BadValue, format!("rocksdb delete failed: {e}")))
    }

    fn find_by_loc(&self, loc: RecordLocator) -> Result<Option<Vec<u8>>, Status> {
        self.db
            .get_cf(self.cf(), encode_loc(loc))
            .map_err(|e| Status::new(ErrorCode::BadValue, format!("rocksdb get failed: {e}")))
    }

    fn scan(&self, direction: ScanDirection, start: Option<RecordLocator>) -> Box<dyn RecordCursor> {
        let mode = match (direction, start) {
            (ScanDirection::Forward, None) => rocksdb::IteratorMode::Start,
            (ScanDirection::Backward, None) => rocksdb::IteratorMode::End,
            (ScanDirection::Forward, Some(s)) => {
                rocksdb::IteratorMode::From(Box::leak(encode_loc(s).to_vec().into_boxed_slice()), rocksdb::Direction::Forward)
            }
            (ScanDirection::Backward, Some(s)) => {
                rocksdb::IteratorMode::From(Box::leak(encode_loc(s).to_vec().into_boxed_slice()), rocksdb::Direction::Reverse)
            }
        };
        let items: Vec<(RecordLocator, Vec<u8>)> = self
            .db
            .iterator_cf(self.cf(), mode)
            .filter_map(|item| item.ok())
            .map(|(k, v)| (decode_loc(&k), v.to_vec()))
            .collect();
        Box::new(VecCursor { items: items.into_iter() })
    }

    fn truncate(&self) -> Result<(), Status> {
        let keys: Vec<Vec<u8>> =
            self.db.iterator_cf(self.cf(), rocksdb::IteratorMode::Start).filter_map(|i| i.ok()).map(|(k, _)| k.to_vec()).collect();
        for k in keys {
            self.db
                .delete_cf(self.cf(), k)
                .map_err(|e| Status::new(ErrorCode::BadValue, format!("rocksdb delete failed: {e}")))?;
        }
        Ok(())
    }

    fn size(&self) -> u64 {
        self.db
            .iterator_cf(self.cf(), rocksdb::IteratorMode::Start)
            .filter_map(|i| i.ok())
            .map(|(_, v)| v.len() as u64)
            .sum()
    }

    fn count(&self) -> u64 {
        self.db.iterator_cf(self.cf(), rocksdb::IteratorMode::Start).filter_map(|i| i.ok()).count() as u64
    }
}

struct VecCursor {
    items: std::vec::IntoIter<(RecordLocator, Vec<u8>)>,
}

impl RecordCursor for VecCursor {
    fn next(&mut self) -> Option<(RecordLocator, Vec<u8>)> {
        self.items.next()
    }
}

pub struct RocksDbStorageEngine {
    db: Arc<DB>,
    stores: RwLock<HashMap<String, Arc<RocksDbRecordStore>>>,
}

impl RocksDbStorageEngine {
    pub fn open(dbpath: &Path, known_namespaces: &[String]) -> Result<Self, Status> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        let cfs: Vec<ColumnFamilyDescriptor> = known_namespaces
            .iter()
            .map(|ns| ColumnFamilyDescriptor::new(ns, Options::default()))
            .collect();
        let db = if cfs.is_empty() {
            DB::open(&opts, dbpath)
        } else {
            DB::open_cf_descriptors(&opts, dbpath, cfs)
        }
        .map_err(|e| Status::new(ErrorCode::BadValue, format!("failed to open rocksdb at {dbpath:?}: {e}")))?;
        Ok(RocksDbStorageEngine { db: Arc::new(db), stores: RwLock::new(HashMap::new()) })
    }
}

impl StorageEngine for RocksDbStorageEngine {
    fn create_record_store(&self, ns: &str, _options: &RecordStoreOptions) -> Result<(), Status> {
        if self.db.cf_handle(ns).is_none() {
            self.db
                .create_cf(ns, &Options::default())
                .map_err(|e| Status::new(ErrorCode::BadValue, format!("failed to create column family: {e}")))?;
        }
        self.stores
            .write()
            .unwrap()
            .insert(ns.to_string(), Arc::new(RocksDbRecordStore { db: self.db.clone(), cf_name: ns.to_string(), next_loc: AtomicU64::new(0) }));
        Ok(())
    }

    fn get_record_store(&self, ns: &str) -> Option<Arc<dyn RecordStore>> {
        self.stores.read().unwrap().get(ns).map(|s| s.clone() as Arc<dyn RecordStore>)
    }

    fn drop_ident(&self, ns: &str) -> Result<(), Status> {
        self.stores.write().unwrap().remove(ns);
        let _ = self.db.drop_cf(ns);
        Ok(())
    }

    fn new_recovery_unit(&self) -> Box<dyn RecoveryUnit> {
        Box::new(InMemoryRecoveryUnit::default())
    }
}
