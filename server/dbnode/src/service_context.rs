//! Aggregate owning every long-lived singleton a running data node needs
//!.
//! Components that need one of these take a reference to the context
//! rather than reaching for a static.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use db_catalog::Catalog;
use db_dispatch::{Dispatcher, Profiler};
use db_exec::cursor_registry::CursorRegistry;
use db_oplog::Oplog;
use db_store::opener::{check_journal_flag, LockFile};
use db_store::{MemoryStorageEngine, RecordStoreOptions, StorageEngine};

use crate::config::Config;

const OPLOG_NS: &str = "local.oplog.rs";
const SYSTEM_PROFILE_NS: &str = "local.system.profile";
const CURSOR_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

pub struct ServiceContext {
    pub storage: Arc<dyn StorageEngine>,
    pub oplog: Arc<Oplog>,
    pub catalog: Arc<Catalog>,
    pub dispatcher: Arc<Dispatcher>,
    pub cursors: Arc<CursorRegistry>,
    lock_file: Option<LockFile>,
}

impl ServiceContext {
    /// Bootstraps a data node's process-wide state: acquires the dbpath
    /// lock, checks the journal-flag invariant, then wires storage, oplog,
    /// catalog cache, dispatcher, and cursor registry together. Uses the
    /// in-memory reference storage engine; a RocksDB-backed node would
    /// swap only this one line.
    pub fn bootstrap(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.dbpath)
            .with_context(|| format!("creating dbpath {}", config.dbpath.display()))?;
        check_journal_flag(&config.dbpath, config.journal_enabled)
            .with_context(|| "journal flag check failed")?;
        let lock_file = if config.repair {
            None
        } else {
            Some(LockFile::acquire(&config.dbpath, std::process::id()).with_context(|| "acquiring dbpath lock")?)
        };

        let storage: Arc<dyn StorageEngine> = Arc::new(MemoryStorageEngine::default());
        storage
            .create_record_store(
                OPLOG_NS,
                &RecordStoreOptions { capped: true, capped_size_bytes: config.oplog_size_mb * 1024 * 1024, capped_max_docs: None },
            )
            .map_err(|status| anyhow::anyhow!("creating oplog record store: {status}"))?;
        storage
            .create_record_store(SYSTEM_PROFILE_NS, &RecordStoreOptions { capped: true, capped_size_bytes: 1024 * 1024, capped_max_docs: None })
            .map_err(|status| anyhow::anyhow!("creating system.profile: {status}"))?;

        let memory_engine = storage
            .as_any_memory_engine()
            .expect("in-memory bootstrap always uses MemoryStorageEngine");
        let oplog_store = memory_engine.get_capped_record_store(OPLOG_NS).expect("just created");
        let oplog = Arc::new(Oplog::new(oplog_store));

        let dispatcher = Arc::new(Dispatcher::new(Profiler::new(config.profile, config.slowms), Duration::from_secs(5)));

        Ok(ServiceContext {
            storage,
            oplog,
            catalog: Arc::new(Catalog::new()),
            dispatcher,
            cursors: Arc::new(CursorRegistry::new()),
            lock_file,
        })
    }

    pub fn reap_idle_cursors(&self) -> usize {
        self.cursors.reap_idle(CURSOR_IDLE_TIMEOUT).len()
    }

    pub fn shutdown(self) -> Result<()> {
        if let Some(lock) = self.lock_file {
            lock.release().with_context(|| "releasing dbpath lock")?;
        }
        Ok(())
    }
}
