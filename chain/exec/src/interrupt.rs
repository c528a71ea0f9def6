use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use db_common::{ErrorCode, Status};

/// Per-operation interrupt and deadline state, shared (via `Arc`) between the
/// client-facing op handler and every stage executing on its behalf. `killOp`
/// and shutdown both act by flipping `killed`; a deadline is checked the same
/// way so a single `check_for_interrupt` call covers both.
#[derive(Debug)]
struct Inner {
    killed: AtomicBool,
    shutting_down: AtomicBool,
    deadline: Mutex<Option<Instant>>,
}

#[derive(Debug, Clone)]
pub struct OperationContext {
    inner: Arc<Inner>,
}

impl Default for OperationContext {
    fn default() -> Self {
        OperationContext {
            inner: Arc::new(Inner {
                killed: AtomicBool::new(false),
                shutting_down: AtomicBool::new(false),
                deadline: Mutex::new(None),
            }),
        }
    }
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `maxTimeMS`-style deadline, relative to `now`.
    pub fn set_max_time(&self, max_time: Duration, now: Instant) {
        *self.inner.deadline.lock() = Some(now + max_time);
    }

    pub fn kill(&self) {
        self.inner.killed.store(true, Ordering::SeqCst);
    }

    pub fn is_killed(&self) -> bool {
        self.inner.killed.load(Ordering::SeqCst)
    }

    pub fn mark_shutting_down(&self) {
        self.inner.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Called frequently by stages (at minimum once per `work()` call, and
    /// again after every yield) so a kill or deadline takes effect promptly
    /// rather than only between plan executions.
    pub fn check_for_interrupt(&self) -> Result<(), Status> {
        if self.inner.shutting_down.load(Ordering::SeqCst) {
            return Err(Status::new(ErrorCode::InterruptedAtShutdown, "server is shutting down"));
        }
        if self.inner.killed.load(Ordering::SeqCst) {
            return Err(Status::new(ErrorCode::Interrupted, "operation was killed"));
        }
        if let Some(deadline) = *self.inner.deadline.lock() {
            if Instant::now() >= deadline {
                return Err(Status::new(ErrorCode::ExceededTimeLimit, "operation exceeded its maxTimeMS"));
            }
        }
        Ok(())
    }
}
