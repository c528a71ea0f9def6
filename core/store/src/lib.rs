//! The storage-engine boundary and the record store / index access
//! method contracts built on top of it. The core only assumes the
//! contract in this crate; a concrete engine (RocksDB-backed, or the
//! in-memory reference engine used by tests) lives behind [`StorageEngine`].

pub mod index;
pub mod locator;
pub mod memory_engine;
pub mod opener;
pub mod record_store;
pub mod recovery_unit;
pub mod rocksdb_engine;

pub use index::{IndexAccessMethod, IndexOptions};
pub use locator::RecordLocator;
pub use memory_engine::MemoryStorageEngine;
pub use record_store::{CappedRecordStore, RecordStore, ScanDirection};
pub use recovery_unit::{ChangeCallback, RecoveryUnit};
pub use rocksdb_engine::RocksDbStorageEngine;

use db_common::Status;

/// Bottom boundary of the core: the set of operations every storage engine
/// must provide so that the record store, index access method, and execution engine can be engine-agnostic.
pub trait StorageEngine: Send + Sync {
    fn create_record_store(&self, ns: &str, options: &RecordStoreOptions) -> Result<(), Status>;
    fn get_record_store(&self, ns: &str) -> Option<std::sync::Arc<dyn RecordStore>>;
    fn drop_ident(&self, ns: &str) -> Result<(), Status>;
    fn new_recovery_unit(&self) -> Box<dyn RecoveryUnit>;
}

#[derive(Debug, Clone, Default)]
pub struct RecordStoreOptions {
    pub capped: bool,
    pub capped_size_bytes: u64,
    pub capped_max_docs: Option<u64>,
}
