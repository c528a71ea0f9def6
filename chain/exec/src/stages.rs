use std::collections::VecDeque;

use db_common::Status;
use db_document::Document;
use db_store::{IndexCursor, RecordCursor, RecordLocator, RecordStore, ScanDirection};

use crate::stage::{InvalidationKind, Stage, StageState};
use crate::working_set::{Member, WorkingSet};

/// Scans a record store directly, producing `{loc, doc}` members in
/// storage order. The simplest possible access path and the fallback when
/// no index covers a query.
pub struct CollectionScanStage {
    store: std::sync::Arc<dyn RecordStore>,
    direction: ScanDirection,
    cursor: Option<Box<dyn RecordCursor>>,
    resume_after: Option<RecordLocator>,
}

impl CollectionScanStage {
    pub fn new(store: std::sync::Arc<dyn RecordStore>, direction: ScanDirection) -> Self {
        CollectionScanStage { store, direction, cursor: None, resume_after: None }
    }

    fn ensure_cursor(&mut self) {
        if self.cursor.is_none() {
            self.cursor = Some(self.store.scan(self.direction, self.resume_after));
        }
    }
}

impl Stage for CollectionScanStage {
    fn work(&mut self, ws: &mut WorkingSet) -> StageState {
        self.ensure_cursor();
        let cursor = self.cursor.as_mut().expect("ensure_cursor always populates it");
        match cursor.next() {
            Some((loc, bytes)) => match serde_json::from_slice::<Document>(&bytes) {
                Ok(doc) => {
                    self.resume_after = Some(loc);
                    let slot = ws.alloc();
                    ws.set(slot, Member::LocAndDoc(loc, doc));
                    StageState::Advanced(slot)
                }
                Err(e) => StageState::Failure(Status::new(db_common::ErrorCode::BadValue, e.to_string())),
            },
            None => StageState::IsEof,
        }
    }

    fn save_state(&mut self) {
        self.cursor = None;
    }

    fn restore_state(&mut self, _ws: &mut WorkingSet) -> Result<(), Status> {
        Ok(())
    }

    fn invalidate(&mut self, loc: RecordLocator, kind: InvalidationKind) {
        if kind == InvalidationKind::Deletion && self.resume_after == Some(loc) {
            // The record we were about to resume after is gone; the cursor
            // will be rebuilt from the storage engine's own position tracking
            // on the next `restore_state`, so nothing further to do here.
        }
    }
}

/// Scans an index cursor, handing off `{loc}`-only members for a child
/// (typically a `FetchStage`) to hydrate — the covered/uncovered split.
pub struct IndexScanStage {
    cursor: Box<dyn IndexCursor>,
}

impl IndexScanStage {
    pub fn new(cursor: Box<dyn IndexCursor>) -> Self {
        IndexScanStage { cursor }
    }
}

impl Stage for IndexScanStage {
    fn work(&mut self, ws: &mut WorkingSet) -> StageState {
        match self.cursor.next() {
            Some((_key, loc)) => {
                let slot = ws.alloc();
                ws.set(slot, Member::Loc(loc));
                StageState::Advanced(slot)
            }
            None => StageState::IsEof,
        }
    }

    fn save_state(&mut self) {}

    fn restore_state(&mut self, _ws: &mut WorkingSet) -> Result<(), Status> {
        Ok(())
    }

    fn invalidate(&mut self, _loc: RecordLocator, _kind: InvalidationKind) {}
}

/// Hydrates a `{loc}`-only member into `{loc, doc}` by reading the record
/// store. Returns `NeedFetch` upward when the fetch itself can't complete
/// without the driver yielding first (e.g. the page isn't resident) — the
/// in-memory and RocksDB engines used here always complete synchronously, so
/// this stage never actually emits `NeedFetch`, but the state exists for
/// storage engines where fetch can block.
pub struct FetchStage {
    child: Box<dyn Stage>,
    store: std::sync::Arc<dyn RecordStore>,
}

impl FetchStage {
    pub fn new(child: Box<dyn Stage>, store: std::sync::Arc<dyn RecordStore>) -> Self {
        FetchStage { child, store }
    }
}

impl Stage for FetchStage {
    fn work(&mut self, ws: &mut WorkingSet) -> StageState {
        match self.child.work(ws) {
            StageState::Advanced(slot) => {
                let loc = match ws.get(slot) {
                    Some(Member::Loc(loc)) => *loc,
                    Some(Member::LocAndDoc(..)) => return StageState::Advanced(slot),
                    _ => return StageState::Failure(Status::new(db_common::ErrorCode::BadValue, "fetch stage received an owned doc with no locator")),
                };
                match self.store.find_by_loc(loc) {
                    Ok(Some(bytes)) => match serde_json::from_slice::<Document>(&bytes) {
                        Ok(doc) => {
                            ws.set(slot, Member::LocAndDoc(loc, doc));
                            StageState::Advanced(slot)
                        }
                        Err(e) => StageState::Failure(Status::new(db_common::ErrorCode::BadValue, e.to_string())),
                    },
                    Ok(None) => StageState::NeedTime,
                    Err(e) => StageState::Failure(e),
                }
            }
            other => other,
        }
    }

    fn save_state(&mut self) {
        self.child.save_state();
    }

    fn restore_state(&mut self, ws: &mut WorkingSet) -> Result<(), Status> {
        self.child.restore_state(ws)
    }

    fn invalidate(&mut self, loc: RecordLocator, kind: InvalidationKind) {
        self.child.invalidate(loc, kind);
    }

    fn children(&mut self) -> Vec<&mut dyn Stage> {
        vec![self.child.as_mut()]
    }
}

/// Drops members whose document fails `predicate`. The predicate is applied
/// against `Member::doc`; a `{loc}`-only member reaching a `FilterStage`
/// indicates a planning error, surfaced as `Failure` rather than silently
/// passing it through unfiltered.
pub struct FilterStage {
    child: Box<dyn Stage>,
    predicate: Box<dyn Fn(&Document) -> bool + Send>,
}

impl FilterStage {
    pub fn new(child: Box<dyn Stage>, predicate: Box<dyn Fn(&Document) -> bool + Send>) -> Self {
        FilterStage { child, predicate }
    }
}

impl Stage for FilterStage {
    fn work(&mut self, ws: &mut WorkingSet) -> StageState {
        loop {
            match self.child.work(ws) {
                StageState::Advanced(slot) => {
                    let doc = match ws.get(slot).and_then(Member::doc) {
                        Some(doc) => doc,
                        None => {
                            return StageState::Failure(Status::new(
                                db_common::ErrorCode::BadValue,
                                "filter stage requires a hydrated document",
                            ))
                        }
                    };
                    if (self.predicate)(doc) {
                        return StageState::Advanced(slot);
                    }
                    ws.free(slot);
                    continue;
                }
                other => return other,
            }
        }
    }

    fn save_state(&mut self) {
        self.child.save_state();
    }

    fn restore_state(&mut self, ws: &mut WorkingSet) -> Result<(), Status> {
        self.child.restore_state(ws)
    }

    fn invalidate(&mut self, loc: RecordLocator, kind: InvalidationKind) {
        self.child.invalidate(loc, kind);
    }

    fn children(&mut self) -> Vec<&mut dyn Stage> {
        vec![self.child.as_mut()]
    }
}

/// Projects each document down to the fields named in `include` (`_id`
/// always retained unless explicitly excluded by its absence being
/// irrelevant — exclusion projections are out of scope, matching the
/// shard-key-only projection use the router needs).
pub struct ProjectionStage {
    child: Box<dyn Stage>,
    include: Vec<String>,
}

impl ProjectionStage {
    pub fn new(child: Box<dyn Stage>, include: Vec<String>) -> Self {
        ProjectionStage { child, include }
    }
}

impl Stage for ProjectionStage {
    fn work(&mut self, ws: &mut WorkingSet) -> StageState {
        match self.child.work(ws) {
            StageState::Advanced(slot) => {
                let projected = match ws.get(slot).and_then(Member::doc) {
                    Some(doc) => {
                        let mut out = Document::new();
                        for name in &self.include {
                            if let Some(v) = doc.get_path(name) {
                                out.push(name.clone(), v.clone());
                            }
                        }
                        out
                    }
                    None => {
                        return StageState::Failure(Status::new(
                            db_common::ErrorCode::BadValue,
                            "projection stage requires a hydrated document",
                        ))
                    }
                };
                let out_slot = ws.alloc();
                ws.set(out_slot, Member::OwnedDoc(projected));
                StageState::Advanced(out_slot)
            }
            other => other,
        }
    }

    fn save_state(&mut self) {
        self.child.save_state();
    }

    fn restore_state(&mut self, ws: &mut WorkingSet) -> Result<(), Status> {
        self.child.restore_state(ws)
    }

    fn invalidate(&mut self, loc: RecordLocator, kind: InvalidationKind) {
        self.child.invalidate(loc, kind);
    }

    fn children(&mut self) -> Vec<&mut dyn Stage> {
        vec![self.child.as_mut()]
    }
}

/// Buffers its entire child output, sorts it, and replays it. Blocking: the
/// working-set slots it buffers are `OwnedDoc` copies so this stage is
/// immune to the underlying collection mutating during the drain. No
/// external (disk-spilling) sort — past the in-memory limit this returns
/// `Failure`, matching the executor's `sort stage buffered data usage
/// exceeds limit` behavior rather than silently degrading.
pub struct SortStage {
    child: Box<dyn Stage>,
    key: String,
    descending: bool,
    limit_bytes: usize,
    buffer: Option<VecDeque<Document>>,
}

impl SortStage {
    pub fn new(child: Box<dyn Stage>, key: impl Into<String>, descending: bool, limit_bytes: usize) -> Self {
        SortStage { child, key: key.into(), descending, limit_bytes, buffer: None }
    }

    fn drain_and_sort(&mut self, ws: &mut WorkingSet) -> Result<(), Status> {
        let mut docs = Vec::new();
        let mut used_bytes = 0usize;
        loop {
            match self.child.work(ws) {
                StageState::Advanced(slot) => {
                    let doc = ws.get(slot).and_then(Member::doc).cloned().ok_or_else(|| {
                        Status::new(db_common::ErrorCode::BadValue, "sort stage requires hydrated documents")
                    })?;
                    used_bytes += serde_json::to_vec(&doc).map(|b| b.len()).unwrap_or(0);
                    if used_bytes > self.limit_bytes {
                        return Err(Status::new(
                            db_common::ErrorCode::BadValue,
                            "sort stage buffered data usage exceeds internal limit",
                        ));
                    }
                    docs.push(doc);
                    ws.free(slot);
                }
                StageState::IsEof => break,
                StageState::NeedTime => continue,
                StageState::Dead => return Err(Status::new(db_common::ErrorCode::Interrupted, "sort input died")),
                StageState::Failure(s) => return Err(s),
                StageState::NeedFetch(_) => continue,
            }
        }
        let key = self.key.clone();
        docs.sort_by(|a, b| {
            let ord = match (a.get_path(&key), b.get_path(&key)) {
                (Some(av), Some(bv)) => db_document::value::compare(av, bv),
                (None, Some(_)) => std::cmp::Ordering::Less,
                (Some(_), None) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            };
            if self.descending {
                ord.reverse()
            } else {
                ord
            }
        });
        self.buffer = Some(docs.into());
        Ok(())
    }
}

impl Stage for SortStage {
    fn work(&mut self, ws: &mut WorkingSet) -> StageState {
        if self.buffer.is_none() {
            if let Err(e) = self.drain_and_sort(ws) {
                return StageState::Failure(e);
            }
        }
        match self.buffer.as_mut().and_then(VecDeque::pop_front) {
            Some(doc) => {
                let slot = ws.alloc();
                ws.set(slot, Member::OwnedDoc(doc));
                StageState::Advanced(slot)
            }
            None => StageState::IsEof,
        }
    }

    fn save_state(&mut self) {
        self.child.save_state();
    }

    fn restore_state(&mut self, ws: &mut WorkingSet) -> Result<(), Status> {
        self.child.restore_state(ws)
    }

    fn invalidate(&mut self, loc: RecordLocator, kind: InvalidationKind) {
        self.child.invalidate(loc, kind);
    }

    fn children(&mut self) -> Vec<&mut dyn Stage> {
        vec![self.child.as_mut()]
    }
}

/// Passes through at most `n` results.
pub struct LimitStage {
    child: Box<dyn Stage>,
    remaining: u64,
}

impl LimitStage {
    pub fn new(child: Box<dyn Stage>, n: u64) -> Self {
        LimitStage { child, remaining: n }
    }
}

impl Stage for LimitStage {
    fn work(&mut self, ws: &mut WorkingSet) -> StageState {
        if self.remaining == 0 {
            return StageState::IsEof;
        }
        match self.child.work(ws) {
            StageState::Advanced(slot) => {
                self.remaining -= 1;
                StageState::Advanced(slot)
            }
            other => other,
        }
    }

    fn save_state(&mut self) {
        self.child.save_state();
    }

    fn restore_state(&mut self, ws: &mut WorkingSet) -> Result<(), Status> {
        self.child.restore_state(ws)
    }

    fn invalidate(&mut self, loc: RecordLocator, kind: InvalidationKind) {
        self.child.invalidate(loc, kind);
    }

    fn children(&mut self) -> Vec<&mut dyn Stage> {
        vec![self.child.as_mut()]
    }
}

/// Drops the first `n` results from its child.
pub struct SkipStage {
    child: Box<dyn Stage>,
    remaining: u64,
}

impl SkipStage {
    pub fn new(child: Box<dyn Stage>, n: u64) -> Self {
        SkipStage { child, remaining: n }
    }
}

impl Stage for SkipStage {
    fn work(&mut self, ws: &mut WorkingSet) -> StageState {
        loop {
            match self.child.work(ws) {
                StageState::Advanced(slot) if self.remaining > 0 => {
                    self.remaining -= 1;
                    ws.free(slot);
                    continue;
                }
                other => return other,
            }
        }
    }

    fn save_state(&mut self) {
        self.child.save_state();
    }

    fn restore_state(&mut self, ws: &mut WorkingSet) -> Result<(), Status> {
        self.child.restore_state(ws)
    }

    fn invalidate(&mut self, loc: RecordLocator, kind: InvalidationKind) {
        self.child.invalidate(loc, kind);
    }

    fn children(&mut self) -> Vec<&mut dyn Stage> {
        vec![self.child.as_mut()]
    }
}

/// k-way merges already-sorted children by `key`, used by the router to
/// interleave per-shard results without buffering the whole result set
///. Each child is assumed individually sorted
/// ascending (or descending, matching `descending`) by `key`.
pub struct MergeSortStage {
    children: Vec<Box<dyn Stage>>,
    key: String,
    descending: bool,
    pending: Vec<Option<(Document, SlotFromChild)>>,
}

/// Tags a buffered child result with which child produced it and the slot it
/// lives in, so the merge can free slots from children it didn't pick.
struct SlotFromChild {
    child_index: usize,
    slot: crate::working_set::SlotId,
}

impl MergeSortStage {
    pub fn new(children: Vec<Box<dyn Stage>>, key: impl Into<String>, descending: bool) -> Self {
        let n = children.len();
        MergeSortStage { children, key: key.into(), descending, pending: (0..n).map(|_| None).collect() }
    }

    fn fill(&mut self, ws: &mut WorkingSet, i: usize) -> Result<bool, Status> {
        if self.pending[i].is_some() {
            return Ok(true);
        }
        loop {
            match self.children[i].work(ws) {
                StageState::Advanced(slot) => {
                    let doc = ws.get(slot).and_then(Member::doc).cloned().ok_or_else(|| {
                        Status::new(db_common::ErrorCode::BadValue, "merge sort requires hydrated documents")
                    })?;
                    self.pending[i] = Some((doc, SlotFromChild { child_index: i, slot }));
                    return Ok(true);
                }
                StageState::NeedTime | StageState::NeedFetch(_) => continue,
                StageState::IsEof => return Ok(false),
                StageState::Dead => return Err(Status::new(db_common::ErrorCode::Interrupted, "merge sort input died")),
                StageState::Failure(s) => return Err(s),
            }
        }
    }
}

impl Stage for MergeSortStage {
    fn work(&mut self, ws: &mut WorkingSet) -> StageState {
        for i in 0..self.children.len() {
            if let Err(e) = self.fill(ws, i) {
                return StageState::Failure(e);
            }
        }
        let key = self.key.clone();
        let best = self
            .pending
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_ref().map(|(doc, _)| (i, doc)))
            .min_by(|(_, a), (_, b)| {
                let ord = match (a.get_path(&key), b.get_path(&key)) {
                    (Some(av), Some(bv)) => db_document::value::compare(av, bv),
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, None) => std::cmp::Ordering::Equal,
                };
                if self.descending {
                    ord.reverse()
                } else {
                    ord
                }
            })
            .map(|(i, _)| i);
        match best {
            Some(i) => {
                let (_, from) = self.pending[i].take().expect("selected index was checked present above");
                StageState::Advanced(from.slot)
            }
            None => StageState::IsEof,
        }
    }

    fn save_state(&mut self) {
        for c in &mut self.children {
            c.save_state();
        }
    }

    fn restore_state(&mut self, ws: &mut WorkingSet) -> Result<(), Status> {
        for c in &mut self.children {
            c.restore_state(ws)?;
        }
        Ok(())
    }

    fn invalidate(&mut self, loc: RecordLocator, kind: InvalidationKind) {
        for c in &mut self.children {
            c.invalidate(loc, kind);
        }
    }

    fn children(&mut self) -> Vec<&mut dyn Stage> {
        self.children.iter_mut().map(|c| c.as_mut()).collect()
    }
}

/// Deletes each matched record from its store as the plan advances past it
/// (the write-half of a `delete` command built on a filtered collection
/// scan).
pub struct DeleteStage {
    child: Box<dyn Stage>,
    store: std::sync::Arc<dyn RecordStore>,
    deleted: u64,
}

impl DeleteStage {
    pub fn new(child: Box<dyn Stage>, store: std::sync::Arc<dyn RecordStore>) -> Self {
        DeleteStage { child, store, deleted: 0 }
    }

    pub fn deleted_count(&self) -> u64 {
        self.deleted
    }
}

impl Stage for DeleteStage {
    fn work(&mut self, ws: &mut WorkingSet) -> StageState {
        match self.child.work(ws) {
            StageState::Advanced(slot) => {
                let loc = match ws.get(slot).and_then(Member::loc) {
                    Some(loc) => loc,
                    None => {
                        return StageState::Failure(Status::new(
                            db_common::ErrorCode::BadValue,
                            "delete stage requires a locator-bearing member",
                        ))
                    }
                };
                if let Err(e) = self.store.delete(loc) {
                    return StageState::Failure(e);
                }
                self.deleted += 1;
                StageState::Advanced(slot)
            }
            other => other,
        }
    }

    fn save_state(&mut self) {
        self.child.save_state();
    }

    fn restore_state(&mut self, ws: &mut WorkingSet) -> Result<(), Status> {
        self.child.restore_state(ws)
    }

    fn invalidate(&mut self, loc: RecordLocator, kind: InvalidationKind) {
        self.child.invalidate(loc, kind);
    }

    fn children(&mut self) -> Vec<&mut dyn Stage> {
        vec![self.child.as_mut()]
    }
}

/// Applies `mutator` to each matched document and writes the result back.
/// `mutator` returning `Err` aborts the whole plan at that document.
pub struct UpdateStage {
    child: Box<dyn Stage>,
    store: std::sync::Arc<dyn RecordStore>,
    mutator: Box<dyn Fn(&Document) -> Result<Document, Status> + Send>,
    modified: u64,
}

impl UpdateStage {
    pub fn new(
        child: Box<dyn Stage>,
        store: std::sync::Arc<dyn RecordStore>,
        mutator: Box<dyn Fn(&Document) -> Result<Document, Status> + Send>,
    ) -> Self {
        UpdateStage { child, store, mutator, modified: 0 }
    }

    pub fn modified_count(&self) -> u64 {
        self.modified
    }
}

impl Stage for UpdateStage {
    fn work(&mut self, ws: &mut WorkingSet) -> StageState {
        match self.child.work(ws) {
            StageState::Advanced(slot) => {
                let (loc, doc) = match ws.get(slot) {
                    Some(Member::LocAndDoc(loc, doc)) => (*loc, doc.clone()),
                    _ => {
                        return StageState::Failure(Status::new(
                            db_common::ErrorCode::BadValue,
                            "update stage requires a hydrated {loc, doc} member",
                        ))
                    }
                };
                let updated = match (self.mutator)(&doc) {
                    Ok(d) => d,
                    Err(e) => return StageState::Failure(e),
                };
                let bytes = match serde_json::to_vec(&updated) {
                    Ok(b) => b,
                    Err(e) => return StageState::Failure(Status::new(db_common::ErrorCode::BadValue, e.to_string())),
                };
                if let Err(e) = self.store.update(loc, &bytes) {
                    return StageState::Failure(e);
                }
                self.modified += 1;
                ws.set(slot, Member::LocAndDoc(loc, updated));
                StageState::Advanced(slot)
            }
            other => other,
        }
    }

    fn save_state(&mut self) {
        self.child.save_state();
    }

    fn restore_state(&mut self, ws: &mut WorkingSet) -> Result<(), Status> {
        self.child.restore_state(ws)
    }

    fn invalidate(&mut self, loc: RecordLocator, kind: InvalidationKind) {
        self.child.invalidate(loc, kind);
    }

    fn children(&mut self) -> Vec<&mut dyn Stage> {
        vec![self.child.as_mut()]
    }
}

/// Concatenates several child stages in order, used by the migration
/// engine's recipient side to present a single scan over locators cloned in
/// more than one batch.
pub struct MultiIteratorStage {
    children: VecDeque<Box<dyn Stage>>,
}

impl MultiIteratorStage {
    pub fn new(children: Vec<Box<dyn Stage>>) -> Self {
        MultiIteratorStage { children: children.into() }
    }
}

impl Stage for MultiIteratorStage {
    fn work(&mut self, ws: &mut WorkingSet) -> StageState {
        loop {
            let Some(front) = self.children.front_mut() else {
                return StageState::IsEof;
            };
            match front.work(ws) {
                StageState::IsEof => {
                    self.children.pop_front();
                    continue;
                }
                other => return other,
            }
        }
    }

    fn save_state(&mut self) {
        for c in &mut self.children {
            c.save_state();
        }
    }

    fn restore_state(&mut self, ws: &mut WorkingSet) -> Result<(), Status> {
        for c in &mut self.children {
            c.restore_state(ws)?;
        }
        Ok(())
    }

    fn invalidate(&mut self, loc: RecordLocator, kind: InvalidationKind) {
        for c in &mut self.children {
            c.invalidate(loc, kind);
        }
    }

    fn children(&mut self) -> Vec<&mut dyn Stage> {
        self.children.iter_mut().map(|c| c.as_mut()).collect()
    }
}

/// A stage with no children that exists purely so a background index build
/// can be notified (via `invalidate_tree`) of concurrent deletes without
/// needing a real data-producing child in the tree yet.
pub struct NotificationStage {
    pending_invalidations: Vec<(RecordLocator, InvalidationKind)>,
}

impl NotificationStage {
    pub fn new() -> Self {
        NotificationStage { pending_invalidations: Vec::new() }
    }

    pub fn drain_invalidations(&mut self) -> Vec<(RecordLocator, InvalidationKind)> {
        std::mem::take(&mut self.pending_invalidations)
    }
}

impl Default for NotificationStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for NotificationStage {
    fn work(&mut self, _ws: &mut WorkingSet) -> StageState {
        StageState::IsEof
    }

    fn save_state(&mut self) {}

    fn restore_state(&mut self, _ws: &mut WorkingSet) -> Result<(), Status> {
        Ok(())
    }

    fn invalidate(&mut self, loc: RecordLocator, kind: InvalidationKind) {
        self.pending_invalidations.push((loc, kind));
    }
}
