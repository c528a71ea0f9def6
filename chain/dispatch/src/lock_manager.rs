//! The multi-granularity lock hierarchy: Global → Database →
//! Collection, modes IS/IX/S/X with the standard compatibility matrix. A
//! command declares the mode it needs at each level; the dispatcher
//! acquires top-down and releases bottom-up on unwind.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use db_common::{ErrorCode, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Intent shared: the holder intends to take `S` on some descendant.
    IntentShared,
    /// Intent exclusive: the holder intends to take `X` on some descendant.
    IntentExclusive,
    Shared,
    Exclusive,
}

impl LockMode {
    /// The standard multi-granularity compatibility matrix: whether a
    /// lock already held in `self` mode permits a concurrent grant of
    /// `other`.
    pub fn compatible_with(self, other: LockMode) -> bool {
        use LockMode::*;
        match (self, other) {
            (IntentShared, IntentShared) => true,
            (IntentShared, IntentExclusive) => true,
            (IntentShared, Shared) => true,
            (IntentShared, Exclusive) => false,
            (IntentExclusive, IntentShared) => true,
            (IntentExclusive, IntentExclusive) => true,
            (IntentExclusive, Shared) => false,
            (IntentExclusive, Exclusive) => false,
            (Shared, IntentShared) => true,
            (Shared, IntentExclusive) => false,
            (Shared, Shared) => true,
            (Shared, Exclusive) => false,
            (Exclusive, _) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockLevel {
    Global,
    Database(String),
    Collection(String),
}

#[derive(Default)]
struct LockState {
    holders: HashMap<LockLevel, Vec<LockMode>>,
}

impl LockState {
    fn can_grant(&self, level: &LockLevel, mode: LockMode) -> bool {
        match self.holders.get(level) {
            None => true,
            Some(held) => held.iter().all(|h| h.compatible_with(mode)),
        }
    }
}

/// A single granted lock, released automatically when dropped — an early
/// return or panic can't leak a held lock.
pub struct LockGuard<'a> {
    manager: &'a LockManager,
    level: LockLevel,
    mode: LockMode,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.manager.release(&self.level, self.mode);
    }
}

pub struct LockManager {
    state: Mutex<LockState>,
    released: Condvar,
}

impl Default for LockManager {
    fn default() -> Self {
        LockManager { state: Mutex::new(LockState::default()), released: Condvar::new() }
    }
}

impl LockManager {
    pub fn new() -> Self {
        LockManager::default()
    }

    /// Blocks until `mode` can be granted at `level` or `timeout` elapses,
    /// in which case it returns `LockTimeout` rather than blocking
    /// indefinitely.
    pub fn acquire(&self, level: LockLevel, mode: LockMode, timeout: Duration) -> Result<LockGuard<'_>, Status> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.can_grant(&level, mode) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Status::new(ErrorCode::LockTimeout, format!("timed out acquiring {mode:?} on {level:?}")));
            }
            let timed_out = self.released.wait_for(&mut state, remaining).timed_out();
            if timed_out && !state.can_grant(&level, mode) {
                return Err(Status::new(ErrorCode::LockTimeout, format!("timed out acquiring {mode:?} on {level:?}")));
            }
        }
        state.holders.entry(level.clone()).or_default().push(mode);
        Ok(LockGuard { manager: self, level, mode })
    }

    fn release(&self, level: &LockLevel, mode: LockMode) {
        let mut state = self.state.lock();
        if let Some(held) = state.holders.get_mut(level) {
            if let Some(pos) = held.iter().position(|m| *m == mode) {
                held.remove(pos);
            }
            if held.is_empty() {
                state.holders.remove(level);
            }
        }
        drop(state);
        self.released.notify_all();
    }
}

/// Acquires Global/Database/Collection locks in order for one namespace
/// access, returning guards that must be dropped in reverse (last-acquired
/// first) — the caller gets them bundled in a single struct specifically
/// so normal `Drop` order (reverse declaration order) does the right thing
/// without the caller needing to think about it.
pub struct NamespaceLock<'a> {
    pub collection: LockGuard<'a>,
    pub database: LockGuard<'a>,
    pub global: LockGuard<'a>,
}

pub fn lock_namespace<'a>(
    manager: &'a LockManager,
    db_name: &str,
    collection_name: &str,
    mode: LockMode,
    timeout: Duration,
) -> Result<NamespaceLock<'a>, Status> {
    let intent = match mode {
        LockMode::Shared | LockMode::IntentShared => LockMode::IntentShared,
        LockMode::Exclusive | LockMode::IntentExclusive => LockMode::IntentExclusive,
    };
    let global = manager.acquire(LockLevel::Global, intent, timeout)?;
    let database = manager.acquire(LockLevel::Database(db_name.to_string()), intent, timeout)?;
    let collection = manager.acquire(LockLevel::Collection(format!("{db_name}.{collection_name}")), mode, timeout)?;
    Ok(NamespaceLock { collection, database, global })
}
