//! Per-operation handle to the storage engine. A
//! recovery unit establishes a read snapshot on first access and is either
//! committed (writes become durable) or rolled back; registered callbacks
//! fire on whichever outcome occurs so that in-memory bookkeeping (counters,
//! oplog-to-shard hooks) stays consistent with what actually persisted.

use std::sync::Mutex;

/// A callback registered against a recovery unit, fired with `true` on
/// commit and `false` on rollback.
pub type ChangeCallback = Box<dyn FnOnce(bool) + Send>;

pub trait RecoveryUnit: Send {
    /// Marks that the snapshot should be established now if it has not been
    /// already. Idempotent.
    fn establish_snapshot(&mut self);

    fn register_change(&mut self, callback: ChangeCallback);

    fn commit(self: Box<Self>);

    fn rollback(self: Box<Self>);
}

/// Reference recovery unit used by the in-memory engine and by tests: no
/// real MVCC snapshot, just a callback queue and a flag tracking whether a
/// snapshot has been "established" (for yield/restore bookkeeping in the execution engine).
pub struct InMemoryRecoveryUnit {
    snapshot_established: bool,
    callbacks: Mutex<Vec<ChangeCallback>>,
}

impl Default for InMemoryRecoveryUnit {
    fn default() -> Self {
        InMemoryRecoveryUnit { snapshot_established: false, callbacks: Mutex::new(Vec::new()) }
    }
}

impl InMemoryRecoveryUnit {
    pub fn has_snapshot(&self) -> bool {
        self.snapshot_established
    }

    fn run_callbacks(&self, committed: bool) {
        let mut callbacks = self.callbacks.lock().unwrap();
        for cb in callbacks.drain(..) {
            cb(committed);
        }
    }
}

impl RecoveryUnit for InMemoryRecoveryUnit {
    fn establish_snapshot(&mut self) {
        self.snapshot_established = true;
    }

    fn register_change(&mut self, callback: ChangeCallback) {
        self.callbacks.lock().unwrap().push(callback);
    }

    fn commit(self: Box<Self>) {
        self.run_callbacks(true);
    }

    fn rollback(self: Box<Self>) {
        self.run_callbacks(false);
    }
}
