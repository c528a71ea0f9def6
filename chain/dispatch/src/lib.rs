//! The command dispatcher: operation classification, the lock
//! hierarchy, write-unit-of-work, authorization, current-op tracking, and
//! slow-query profiling.

pub mod authorization;
pub mod classify;
pub mod current_op;
pub mod dispatcher;
pub mod lock_manager;
pub mod profiler;
pub mod write_unit_of_work;

pub use authorization::{Action, Privileges};
pub use classify::OperationKind;
pub use current_op::{CurrentOp, OpFrame};
pub use dispatcher::Dispatcher;
pub use lock_manager::{lock_namespace, LockGuard, LockLevel, LockManager, LockMode, NamespaceLock};
pub use profiler::{ProfileLevel, Profiler};
pub use write_unit_of_work::WriteUnitOfWork;
