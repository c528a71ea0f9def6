//! The donor's mod log: a commit-time hook on the recovery
//! unit appends every insert/update/delete touching the chunk range to
//! this log while the transfer loop is draining the locator set. Polled
//! by `_transferMods`, which returns and clears it each call.

use db_document::Value;

/// Running size estimate used for the ~500 MiB memory-pressure abort
/// threshold; a fixed per-entry overhead plus an estimate of the `_id`'s
/// own size, since the mod log holds ids, not full documents.
const PER_ENTRY_OVERHEAD_BYTES: usize = 64;

pub const MEMORY_PRESSURE_ABORT_BYTES: usize = 500 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct ModLog {
    reload: Vec<Value>,
    deleted: Vec<Value>,
    size_bytes: usize,
}

impl ModLog {
    pub fn new() -> Self {
        ModLog::default()
    }

    /// Recorded on insert or update commit: the document must be
    /// refetched and reshipped.
    pub fn record_reload(&mut self, id: Value) {
        self.size_bytes += PER_ENTRY_OVERHEAD_BYTES + estimate_id_size(&id);
        self.reload.push(id);
    }

    /// Recorded on delete commit.
    pub fn record_deleted(&mut self, id: Value) {
        self.size_bytes += PER_ENTRY_OVERHEAD_BYTES + estimate_id_size(&id);
        self.deleted.push(id);
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn over_memory_pressure_threshold(&self) -> bool {
        self.size_bytes >= MEMORY_PRESSURE_ABORT_BYTES
    }

    /// `_transferMods`: drains and returns everything recorded since the
    /// last call.
    pub fn drain(&mut self) -> TransferModsBatch {
        TransferModsBatch {
            reload: std::mem::take(&mut self.reload),
            deleted: std::mem::take(&mut self.deleted),
            size: std::mem::take(&mut self.size_bytes),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransferModsBatch {
    pub reload: Vec<Value>,
    pub deleted: Vec<Value>,
    pub size: usize,
}

fn estimate_id_size(id: &Value) -> usize {
    match id {
        Value::String(s) => s.len(),
        Value::ObjectId(_) => 12,
        Value::Int32(_) => 4,
        Value::Int64(_) => 8,
        _ => 16,
    }
}
