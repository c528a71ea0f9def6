//! Slow-query profiling: operations slower than the configured
//! threshold (or all operations, at profiling level 2) are appended as a
//! document to `system.profile`, a capped collection like any other.

use std::time::Duration;

use db_common::Status;
use db_store::CappedRecordStore;

use crate::classify::OperationKind;

/// Mirrors `--profile {0,1,2}`: off, slow-only, or every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileLevel {
    Off,
    SlowOnly,
    All,
}

pub struct Profiler {
    level: ProfileLevel,
    slowms: Duration,
}

impl Profiler {
    pub fn new(level: ProfileLevel, slowms: Duration) -> Self {
        Profiler { level, slowms }
    }

    pub fn should_log(&self, elapsed: Duration) -> bool {
        match self.level {
            ProfileLevel::Off => false,
            ProfileLevel::All => true,
            ProfileLevel::SlowOnly => elapsed >= self.slowms,
        }
    }

    /// Appends a profile entry to `system.profile` if `should_log` says to.
    /// The entry document's exact shape is left to the caller to build
    /// (it varies by operation kind); this only owns the decision and the
    /// append.
    pub fn maybe_log(
        &self,
        system_profile: &dyn CappedRecordStore,
        kind: OperationKind,
        ns: &str,
        elapsed: Duration,
        entry_bytes: &[u8],
    ) -> Result<(), Status> {
        if !self.should_log(elapsed) {
            return Ok(());
        }
        tracing::debug!(?kind, ns, elapsed_ms = elapsed.as_millis() as u64, "logging slow operation to system.profile");
        system_profile.insert(entry_bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db_store::memory_engine::MemoryRecordStore;
    use db_store::record_store::ScanDirection;
    use db_store::RecordStoreOptions;

    fn capped() -> MemoryRecordStore {
        MemoryRecordStore::new(RecordStoreOptions { capped: true, capped_size_bytes: 1024 * 1024, capped_max_docs: None })
    }

    #[test]
    fn off_level_never_logs() {
        let profiler = Profiler::new(ProfileLevel::Off, Duration::from_millis(100));
        assert!(!profiler.should_log(Duration::from_secs(10)));
    }

    #[test]
    fn slow_only_logs_past_the_threshold_but_not_before() {
        let profiler = Profiler::new(ProfileLevel::SlowOnly, Duration::from_millis(100));
        assert!(!profiler.should_log(Duration::from_millis(50)));
        assert!(profiler.should_log(Duration::from_millis(150)));
    }

    #[test]
    fn maybe_log_appends_an_entry_when_it_decides_to_log() {
        let profiler = Profiler::new(ProfileLevel::All, Duration::from_millis(100));
        let store = capped();
        profiler.maybe_log(&store, OperationKind::Query, "db.coll", Duration::from_millis(1), b"entry").unwrap();
        let mut cursor = store.scan(ScanDirection::Forward, None);
        assert!(cursor.next().is_some());
    }

    #[test]
    fn maybe_log_is_a_no_op_when_the_level_says_not_to_log() {
        let profiler = Profiler::new(ProfileLevel::Off, Duration::from_millis(100));
        let store = capped();
        profiler.maybe_log(&store, OperationKind::Query, "db.coll", Duration::from_secs(10), b"entry").unwrap();
        let mut cursor = store.scan(ScanDirection::Forward, None);
        assert!(cursor.next().is_none());
    }
}
