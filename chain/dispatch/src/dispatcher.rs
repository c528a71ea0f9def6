//! The command dispatcher: the single entry point every inbound
//! operation passes through, in order — classify, authorize, acquire
//! locks, run, release, profile. A thin per-connection task hands off to
//! shared singletons rather than each connection owning its own copy of
//! dispatch state.

use std::time::{Duration, Instant};

use db_common::counters::GLOBAL_OP_COUNTERS;
use db_common::Status;

use crate::authorization::{Action, Privileges};
use crate::classify::OperationKind;
use crate::lock_manager::{lock_namespace, LockManager};
use crate::profiler::Profiler;

/// The actions an `OperationKind` requires, used for the authorization
/// check that runs before any lock is requested.
fn required_actions(kind: OperationKind) -> Vec<Action> {
    match kind {
        OperationKind::Query | OperationKind::GetMore => vec![Action::Find],
        OperationKind::Insert => vec![Action::Insert],
        OperationKind::Update => vec![Action::Update],
        OperationKind::Delete => vec![Action::Remove],
        OperationKind::KillCursors => vec![Action::Find],
        OperationKind::Command => vec![Action::RunCommand],
    }
}

fn record_counter(kind: OperationKind) {
    match kind {
        OperationKind::Query => GLOBAL_OP_COUNTERS.got_query(),
        OperationKind::Insert => GLOBAL_OP_COUNTERS.got_insert(),
        OperationKind::Update => GLOBAL_OP_COUNTERS.got_update(),
        OperationKind::Delete => GLOBAL_OP_COUNTERS.got_delete(),
        OperationKind::GetMore => GLOBAL_OP_COUNTERS.got_getmore(),
        OperationKind::KillCursors | OperationKind::Command => GLOBAL_OP_COUNTERS.got_command(),
    }
}

pub struct Dispatcher {
    locks: LockManager,
    profiler: Profiler,
    lock_timeout: Duration,
}

impl Dispatcher {
    pub fn new(profiler: Profiler, lock_timeout: Duration) -> Self {
        Dispatcher { locks: LockManager::new(), profiler, lock_timeout }
    }

    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    /// Runs `body` as one dispatched operation: authorizes, acquires the
    /// namespace lock at the mode `kind` requires, counts it, and reports
    /// elapsed time to the caller so it can decide (alongside the
    /// profiler) whether to log to `system.profile`. Lock release happens
    /// on `body`'s return via `NamespaceLock`'s `Drop`.
    pub fn dispatch<T>(
        &self,
        kind: OperationKind,
        db_name: &str,
        collection_name: &str,
        privileges: &Privileges,
        body: impl FnOnce() -> Result<T, Status>,
    ) -> Result<(T, Duration), Status> {
        privileges.check(&required_actions(kind))?;
        let _ns_lock = lock_namespace(&self.locks, db_name, collection_name, kind.required_lock_mode(), self.lock_timeout)?;
        record_counter(kind);
        let started = Instant::now();
        let result = body()?;
        Ok((result, started.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiler::ProfileLevel;

    #[test]
    fn dispatch_rejects_an_unauthorized_operation_before_touching_locks() {
        let dispatcher = Dispatcher::new(Profiler::new(ProfileLevel::Off, Duration::from_millis(100)), Duration::from_millis(50));
        let privileges = Privileges::default();
        let err = dispatcher
            .dispatch(OperationKind::Insert, "db", "coll", &privileges, || Ok::<(), Status>(()))
            .unwrap_err();
        assert_eq!(err.code, db_common::ErrorCode::BadValue);
    }

    #[test]
    fn dispatch_runs_the_body_and_reports_elapsed_time() {
        let dispatcher = Dispatcher::new(Profiler::new(ProfileLevel::Off, Duration::from_millis(100)), Duration::from_millis(50));
        let mut privileges = Privileges::default();
        privileges.grant(Action::Find);
        let (value, _elapsed) = dispatcher
            .dispatch(OperationKind::Query, "db", "coll", &privileges, || Ok(42))
            .unwrap();
        assert_eq!(value, 42);
    }
}
