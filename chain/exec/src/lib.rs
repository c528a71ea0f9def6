//! The execution engine: a tree of plan stages sharing one working set,
//! driven by a yielding executor, with client-visible cursors and a
//! cooperative interrupt model layered on top.

pub mod cursor_registry;
pub mod interrupt;
pub mod read_concern;
pub mod stage;
pub mod stages;
pub mod working_set;
pub mod yield_policy;

pub use cursor_registry::{CursorId, CursorRegistry, OpenCursor};
pub use interrupt::OperationContext;
pub use read_concern::{bound_snapshot, snapshot_satisfies, ReadConcernLevel};
pub use stage::{InvalidationKind, Stage, StageState};
pub use working_set::{Member, SlotId, SlotTag, WorkingSet};
pub use yield_policy::{PlanExecutor, YieldPolicy};
