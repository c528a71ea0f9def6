//! Divergence detection and rollback. A
//! secondary enters rollback when the fetched entry at its sync source has
//! the same `ts` as its own last-applied entry but a different `h`, or a
//! lower `ts` than its own last-applied entry: its tail diverges from the
//! source's and must be undone back to the last point the two logs agree
//! on.

use db_document::{Document, Timestamp, Value};
use db_oplog::{OpKind, OplogEntry};

/// Walks both logs backward (newest first) looking for the first `(ts, h)`
/// pair present in both, returning its index into `local` (the number of
/// trailing local entries that must be undone) or `None` if the logs share
/// no common point at all — an unrecoverable divergence requiring a full
/// resync.
pub fn find_common_point(local: &[OplogEntry], local_hashes: &[i64], source: &[OplogEntry], source_hashes: &[i64]) -> Option<usize> {
    for (i, entry) in local.iter().enumerate().rev() {
        let key = (entry.ts, local_hashes[i]);
        if source.iter().enumerate().any(|(j, s)| (s.ts, source_hashes[j]) == key) {
            return Some(i + 1);
        }
    }
    None
}

/// An undo action for one rolled-back local entry, per the per-op-kind
/// policy documented below, which resolves how a command-entry rollback
/// is undone rather than leaving it ambiguous:
///
/// - insert → delete the document by `_id` (it was never on the source).
/// - delete → refetch the document by `_id` from the source (it may still
///   exist there).
/// - update → refetch the document by `_id` from the source (cheaper and
///   always correct versus trying to invert an arbitrary update modifier).
/// - command → a namespace-level refetch: re-clone the entire collection
///   named in the command document. A deliberately conservative choice for
///   DDL rollback, documented here rather than left as an implementation
///   detail.
/// - no-op → nothing to undo.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoOp {
    DeleteById { ns: String, id: Value },
    RefetchById { ns: String, id: Value },
    RefetchCollection { ns: String },
    None,
}

fn id_of(doc: &Document) -> Option<Value> {
    doc.get("_id").cloned()
}

/// Builds the undo op for one rolled-back entry. For `Update`/`Delete`,
/// `_id` is taken from `o2` (the query predicate), matching the oplog
/// entry construction rules for update/delete oplog entries.
pub fn undo_op_for(entry: &OplogEntry) -> UndoOp {
    match entry.op {
        OpKind::Insert => match id_of(&entry.o) {
            Some(id) => UndoOp::DeleteById { ns: entry.ns.clone(), id },
            None => UndoOp::None,
        },
        OpKind::Update | OpKind::Delete => match entry.o2.as_ref().and_then(id_of).or_else(|| id_of(&entry.o)) {
            Some(id) => UndoOp::RefetchById { ns: entry.ns.clone(), id },
            None => UndoOp::None,
        },
        OpKind::Command => UndoOp::RefetchCollection { ns: entry.ns.clone() },
        OpKind::Noop => UndoOp::None,
    }
}

/// Builds the full ordered undo plan for every local entry after the common
/// point (oldest-undo-first is not required: each undo is independently
/// idempotent, so any order that completes before resuming tailing is
/// correct).
pub fn build_undo_plan(entries_after_common_point: &[OplogEntry]) -> Vec<UndoOp> {
    entries_after_common_point.iter().map(undo_op_for).filter(|op| *op != UndoOp::None).collect()
}

pub fn last_applied_before_rollback(entries: &[OplogEntry], common_point: usize) -> Timestamp {
    entries.get(common_point.saturating_sub(1)).map(|e| e.ts).unwrap_or(Timestamp::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use db_document::ObjectId;

    fn insert_entry(ts: u32, id: i32, h: i64) -> OplogEntry {
        OplogEntry::insert(Timestamp::new(ts, 0), "db.coll", Document::builder().field("_id", Value::Int32(id)).build(), h)
    }

    #[test]
    fn common_point_is_found_at_the_last_agreeing_entry() {
        let local = vec![insert_entry(10, 1, 100), insert_entry(11, 2, 200)];
        let local_hashes: Vec<i64> = local.iter().map(|e| e.h).collect();
        let source = vec![insert_entry(10, 1, 100), insert_entry(11, 3, 999), insert_entry(12, 4, 1)];
        let source_hashes: Vec<i64> = source.iter().map(|e| e.h).collect();
        let point = find_common_point(&local, &local_hashes, &source, &source_hashes).unwrap();
        assert_eq!(point, 1);
    }

    #[test]
    fn no_shared_entry_at_all_reports_no_common_point() {
        let local = vec![insert_entry(10, 1, 100)];
        let local_hashes: Vec<i64> = local.iter().map(|e| e.h).collect();
        let source = vec![insert_entry(10, 1, 999)];
        let source_hashes: Vec<i64> = source.iter().map(|e| e.h).collect();
        assert_eq!(find_common_point(&local, &local_hashes, &source, &source_hashes), None);
    }

    #[test]
    fn rollback_undoes_only_the_entries_after_the_common_point() {
        let local = vec![insert_entry(10, 1, 100), insert_entry(11, 2, 200)];
        let local_hashes: Vec<i64> = local.iter().map(|e| e.h).collect();
        let source = vec![insert_entry(10, 1, 100), insert_entry(11, 3, 999), insert_entry(12, 4, 1)];
        let source_hashes: Vec<i64> = source.iter().map(|e| e.h).collect();
        let point = find_common_point(&local, &local_hashes, &source, &source_hashes).unwrap();
        assert_eq!(last_applied_before_rollback(&local, point), Timestamp::new(10, 0));
        let undo = build_undo_plan(&local[point..]);
        assert_eq!(undo, vec![UndoOp::DeleteById { ns: "db.coll".into(), id: Value::Int32(2) }]);
    }

    #[test]
    fn insert_without_an_id_has_nothing_safe_to_undo() {
        let entry = OplogEntry::insert(Timestamp::new(1, 0), "db.coll", Document::new(), 1);
        assert_eq!(undo_op_for(&entry), UndoOp::None);
    }

    #[test]
    fn delete_rolls_back_to_a_refetch_by_id() {
        let entry = OplogEntry::delete(
            Timestamp::new(1, 0),
            "db.coll",
            Document::builder().field("_id", Value::ObjectId(ObjectId([1; 12]))).build(),
            1,
        );
        assert_eq!(undo_op_for(&entry), UndoOp::RefetchById { ns: "db.coll".into(), id: Value::ObjectId(ObjectId([1; 12])) });
    }

    #[test]
    fn command_entries_roll_back_to_a_whole_collection_refetch() {
        let entry = OplogEntry::command(Timestamp::new(1, 0), "db.coll", Document::new(), 1);
        assert_eq!(undo_op_for(&entry), UndoOp::RefetchCollection { ns: "db.coll".into() });
    }
}
