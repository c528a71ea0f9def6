use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use db_common::{ErrorCode, Status};

use crate::interrupt::OperationContext;
use crate::stage::Stage;
use crate::working_set::WorkingSet;

pub type CursorId = i64;

/// A client-visible, server-side `work()` loop sitting between `find`'s
/// first batch and the `getMore`s that follow it. Registered when a query
/// returns a batch smaller than its full result set and the caller didn't
/// ask to close it; torn down on exhaustion, explicit `killCursors`, or idle
/// timeout.
pub struct OpenCursor {
    pub root: Box<dyn Stage>,
    pub ws: WorkingSet,
    pub ctx: OperationContext,
    pub ns: String,
    last_used: Instant,
}

struct Entry {
    cursor: Mutex<OpenCursor>,
    pinned: bool,
}

/// Tracks every open cursor server-wide, keyed by the id handed back in a
/// query/`getMore` reply. A background sweeper periodically calls
/// `reap_idle` to close cursors nobody has touched within the idle timeout,
/// matching the no-timeout-cursor opt-out used by tailing oplog readers.
#[derive(Default)]
pub struct CursorRegistry {
    cursors: Mutex<HashMap<CursorId, Entry>>,
    next_id: Mutex<CursorId>,
}

impl CursorRegistry {
    pub fn new() -> Self {
        CursorRegistry { cursors: Mutex::new(HashMap::new()), next_id: Mutex::new(1) }
    }

    pub fn register(&self, root: Box<dyn Stage>, ws: WorkingSet, ctx: OperationContext, ns: impl Into<String>) -> CursorId {
        let mut next_id = self.next_id.lock();
        let id = *next_id;
        *next_id += 1;
        let cursor = OpenCursor { root, ws, ctx, ns: ns.into(), last_used: Instant::now() };
        self.cursors.lock().insert(id, Entry { cursor: Mutex::new(cursor), pinned: false });
        id
    }

    /// Looks up a cursor for a `getMore`, bumping its last-used time. Fails
    /// with `CursorNotFound` if it was killed, reaped, or never existed —
    /// the same code used when a tailing cursor's position fell off the
    /// back of a capped collection.
    pub fn touch(&self, id: CursorId) -> Result<(), Status> {
        let cursors = self.cursors.lock();
        let entry = cursors.get(&id).ok_or_else(|| {
            Status::new(ErrorCode::CursorNotFound, format!("cursor {id} not found"))
        })?;
        entry.cursor.lock().last_used = Instant::now();
        Ok(())
    }

    pub fn with_cursor<R>(&self, id: CursorId, f: impl FnOnce(&mut OpenCursor) -> R) -> Result<R, Status> {
        let cursors = self.cursors.lock();
        let entry = cursors.get(&id).ok_or_else(|| {
            Status::new(ErrorCode::CursorNotFound, format!("cursor {id} not found"))
        })?;
        let mut guard = entry.cursor.lock();
        guard.last_used = Instant::now();
        Ok(f(&mut guard))
    }

    pub fn kill(&self, id: CursorId) -> bool {
        self.cursors.lock().remove(&id).is_some()
    }

    pub fn kill_many(&self, ids: &[CursorId]) -> (Vec<CursorId>, Vec<CursorId>) {
        let mut killed = Vec::new();
        let mut not_found = Vec::new();
        for &id in ids {
            if self.kill(id) {
                killed.push(id);
            } else {
                not_found.push(id);
            }
        }
        (killed, not_found)
    }

    pub fn len(&self) -> usize {
        self.cursors.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes every unpinned cursor that hasn't been touched within `idle`.
    /// Returns the ids reaped, so the caller can log or expose them via a
    /// counter.
    pub fn reap_idle(&self, idle: Duration) -> Vec<CursorId> {
        let mut cursors = self.cursors.lock();
        let stale: Vec<CursorId> = cursors
            .iter()
            .filter(|(_, e)| !e.pinned && e.cursor.lock().last_used.elapsed() >= idle)
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            cursors.remove(id);
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{InvalidationKind, StageState};
    use db_store::RecordLocator;

    struct StubStage;
    impl Stage for StubStage {
        fn work(&mut self, _ws: &mut WorkingSet) -> StageState {
            StageState::IsEof
        }
        fn save_state(&mut self) {}
        fn restore_state(&mut self, _ws: &mut WorkingSet) -> Result<(), Status> {
            Ok(())
        }
        fn invalidate(&mut self, _loc: RecordLocator, _kind: InvalidationKind) {}
    }

    #[test]
    fn registering_then_killing_a_cursor_removes_it() {
        let registry = CursorRegistry::new();
        let id = registry.register(Box::new(StubStage), WorkingSet::default(), OperationContext::new(), "db.coll");
        assert_eq!(registry.len(), 1);
        assert!(registry.kill(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn touching_an_unknown_cursor_is_cursor_not_found() {
        let registry = CursorRegistry::new();
        let err = registry.touch(999).unwrap_err();
        assert_eq!(err.code, ErrorCode::CursorNotFound);
    }

    #[test]
    fn reap_idle_only_removes_cursors_past_the_timeout() {
        let registry = CursorRegistry::new();
        registry.register(Box::new(StubStage), WorkingSet::default(), OperationContext::new(), "db.coll");
        let reaped = registry.reap_idle(Duration::from_secs(600));
        assert!(reaped.is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn kill_many_partitions_found_from_not_found() {
        let registry = CursorRegistry::new();
        let id = registry.register(Box::new(StubStage), WorkingSet::default(), OperationContext::new(), "db.coll");
        let (killed, not_found) = registry.kill_many(&[id, 12345]);
        assert_eq!(killed, vec![id]);
        assert_eq!(not_found, vec![12345]);
    }
}
