use db_common::Status;

use crate::working_set::{SlotId, WorkingSet};

/// Result of a single `work()` call. A plan tree makes progress strictly by
/// repeated `work()` calls from the root down to its children; a stage never
/// blocks on I/O inside `work()` — `NeedFetch` and `NeedTime` hand control
/// back to the driver instead.
#[derive(Debug, Clone)]
pub enum StageState {
    /// Produced a result, held in the given working-set slot.
    Advanced(SlotId),
    /// Made no result this call but isn't done; call again.
    NeedTime,
    /// Exhausted its input; will only ever return `IsEof` from here on.
    IsEof,
    /// Needs the given record fetched into the working set before it can
    /// proceed (e.g. a covered index scan handing off to a fetch stage).
    NeedFetch(SlotId),
    /// Its underlying storage handle was invalidated and cannot recover
    /// (e.g. the collection was dropped mid-scan).
    Dead,
    Failure(Status),
}

/// One node in a plan tree. Stages form a tree, not a pipeline: a stage
/// calls `work()` on its children itself and decides what to do with their
/// output, rather than receiving pushed input.
pub trait Stage: Send {
    fn work(&mut self, ws: &mut WorkingSet) -> StageState;

    /// Snapshots any locator-identifying state before yielding, since the
    /// storage engine's snapshot will be released and concurrent writes may
    /// execute before `restore_state`.
    fn save_state(&mut self);

    /// Re-establishes a snapshot and revalidates any locators this stage
    /// remembered; returns `Dead` if the collection was dropped or renamed
    /// out from under it while yielded.
    fn restore_state(&mut self, ws: &mut WorkingSet) -> Result<(), Status>;

    /// Notifies the stage that a locator (e.g. of a document about to be
    /// updated or deleted) is about to become invalid, so it can drop or
    /// adjust any position it holds that refers to it. `kind` distinguishes
    /// a delete (drop it) from an update (the key it was found under may no
    /// longer match, but the document itself is still live).
    fn invalidate(&mut self, loc: db_store::RecordLocator, kind: InvalidationKind);

    /// Children, innermost-first, for recursive save/restore/invalidate
    /// propagation by the plan executor.
    fn children(&mut self) -> Vec<&mut dyn Stage> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationKind {
    Deletion,
    Mutation,
}

/// Recursively saves state across the whole subtree rooted at `stage`.
pub fn save_tree(stage: &mut dyn Stage) {
    stage.save_state();
    for child in stage.children() {
        save_tree(child);
    }
}

/// Recursively restores state across the whole subtree rooted at `stage`,
/// short-circuiting to the first `Dead` signal encountered.
pub fn restore_tree(stage: &mut dyn Stage, ws: &mut WorkingSet) -> Result<(), Status> {
    stage.restore_state(ws)?;
    for child in stage.children() {
        restore_tree(child, ws)?;
    }
    Ok(())
}

/// Recursively notifies the whole subtree rooted at `stage` of a pending
/// invalidation.
pub fn invalidate_tree(stage: &mut dyn Stage, loc: db_store::RecordLocator, kind: InvalidationKind) {
    stage.invalidate(loc, kind);
    for child in stage.children() {
        invalidate_tree(child, loc, kind);
    }
}
