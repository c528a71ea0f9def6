//! Drives one chunk migration end to end from the donor's perspective,
//! composing the donor state machine, locator set, and mod log, and
//! performing cut-over against the chunk catalog. Talking
//! to the actual recipient over the wire is `server/dbnode`'s concern;
//! this takes recipient state as reported by the caller, the same
//! abstraction `db-replset`'s apply loop uses for its sync source.

use db_catalog::Catalog;
use db_common::{ErrorCode, Status};
use db_document::Value;

use crate::donor::{DonorMachine, DonorState};
use crate::locator_set::LocatorSet;
use crate::mod_log::{ModLog, TransferModsBatch};
use crate::recipient::RecipientState;

pub struct MigrationSession {
    pub ns: String,
    pub chunk_id: String,
    pub to_shard: String,
    machine: DonorMachine,
    locator_set: LocatorSet,
    mod_log: ModLog,
}

impl MigrationSession {
    pub fn prepare(ns: impl Into<String>, chunk_id: impl Into<String>, to_shard: impl Into<String>, locators: LocatorSet) -> Self {
        MigrationSession {
            ns: ns.into(),
            chunk_id: chunk_id.into(),
            to_shard: to_shard.into(),
            machine: DonorMachine::new(),
            locator_set: locators,
            mod_log: ModLog::new(),
        }
    }

    pub fn state(&self) -> DonorState {
        self.machine.state()
    }

    pub fn begin_cloning(&mut self) -> Result<(), Status> {
        self.machine.transition(DonorState::Cloning)
    }

    /// Commit-time hook: called by the recovery unit's change-callback for
    /// every insert/update/delete that touched the chunk's key range while
    /// a migration is in flight.
    pub fn record_write(&mut self, id: Value, was_delete: bool) {
        if was_delete {
            self.mod_log.record_deleted(id);
        } else {
            self.mod_log.record_reload(id);
        }
    }

    pub fn notify_deleted(&mut self, loc: db_store::locator::RecordLocator) {
        self.locator_set.notify_deleted(loc);
    }

    pub fn next_clone_batch(&mut self, max_count: usize) -> Vec<db_store::locator::RecordLocator> {
        self.locator_set.take_batch(max_count)
    }

    /// `_transferMods`: the recipient's periodic poll for newly queued
    /// mods. Also checks the memory-pressure abort threshold, since this
    /// is the one point the transfer loop always revisits.
    pub fn transfer_mods(&mut self) -> Result<TransferModsBatch, Status> {
        if self.mod_log.over_memory_pressure_threshold() {
            self.abort();
            return Err(Status::new(ErrorCode::ExceededTimeLimit, "donor mod log exceeded memory pressure threshold"));
        }
        Ok(self.mod_log.drain())
    }

    pub fn locator_set_len(&self) -> usize {
        self.locator_set.len()
    }

    /// Whether the donor may enter the critical section: the recipient
    /// reports steady and the locator set scan has nothing left to drain.
    pub fn ready_for_critical_section(&self, recipient_state: RecipientState) -> bool {
        recipient_state == RecipientState::Steady && self.locator_set.is_empty()
    }

    pub fn enter_critical_section(&mut self) -> Result<(), Status> {
        self.machine.transition(DonorState::Critical)
    }

    /// Cut-over: writes the ownership change to the chunk
    /// catalog, then marks the donor's machine `Done`. This is the single
    /// linearization point — everything before it is retryable without
    /// risking data loss on either side; nothing after it is.
    pub fn cut_over(&mut self, catalog: &Catalog) -> Result<db_catalog::ChunkVersion, Status> {
        if self.machine.state() != DonorState::Critical {
            return Err(Status::new(ErrorCode::AssertionFailure, "cut-over attempted outside the critical section"));
        }
        let new_version = catalog.move_chunk(&self.ns, &self.chunk_id, &self.to_shard)?;
        self.machine.transition(DonorState::Done)?;
        Ok(new_version)
    }

    /// `_recvChunkAbort` path: legal at any point before cut-over. No
    /// catalog write has happened, so ownership is untouched and nothing
    /// needs to be undone beyond discarding this session's state.
    pub fn abort(&mut self) {
        if self.machine.state().can_abort() {
            let _ = self.machine.transition(DonorState::Aborted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db_catalog::chunk::Chunk;
    use db_catalog::CollectionMetadata;
    use db_document::shard_key::{KeyDirection, ShardKeyPattern, ShardKeyTuple};
    use db_document::ObjectId;
    use db_store::locator::RecordLocator;

    fn seeded_catalog() -> Catalog {
        let catalog = Catalog::new();
        let epoch = ObjectId([3; 12]);
        let mut meta = CollectionMetadata::new("db.coll", ShardKeyPattern::new(vec![("x".into(), KeyDirection::Ascending)]), false);
        meta.insert_chunk(Chunk {
            id: "chunk-0".into(),
            ns: "db.coll".into(),
            min: ShardKeyTuple(vec![Value::MinKey]),
            max: ShardKeyTuple(vec![Value::MaxKey]),
            shard: "shard0".into(),
            lastmod_version: (1, 0),
            lastmod_epoch: epoch,
            jumbo: false,
        });
        catalog.create_collection(meta).unwrap();
        catalog
    }

    #[test]
    fn the_full_happy_path_reassigns_the_chunk_and_leaves_the_donor_done() {
        let catalog = seeded_catalog();
        let locators = LocatorSet::from_scan((0..3).map(RecordLocator::new));
        let mut session = MigrationSession::prepare("db.coll", "chunk-0", "shard1", locators);
        session.begin_cloning().unwrap();
        let batch = session.next_clone_batch(10);
        assert_eq!(batch.len(), 3);
        assert!(session.ready_for_critical_section(RecipientState::Steady));
        session.enter_critical_section().unwrap();
        let new_version = session.cut_over(&catalog).unwrap();
        assert_eq!(new_version.major, 2);
        assert_eq!(session.state(), DonorState::Done);
        let meta = catalog.get("db.coll").unwrap();
        assert_eq!(meta.chunks()[0].shard, "shard1");
    }

    #[test]
    fn cut_over_before_the_critical_section_is_rejected() {
        let catalog = seeded_catalog();
        let locators = LocatorSet::from_scan(std::iter::empty());
        let mut session = MigrationSession::prepare("db.coll", "chunk-0", "shard1", locators);
        let err = session.cut_over(&catalog).unwrap_err();
        assert_eq!(err.code, ErrorCode::AssertionFailure);
    }

    #[test]
    fn memory_pressure_aborts_and_transfer_mods_surfaces_the_error() {
        let locators = LocatorSet::from_scan(std::iter::empty());
        let mut session = MigrationSession::prepare("db.coll", "chunk-0", "shard1", locators);
        session.begin_cloning().unwrap();
        for i in 0..(crate::mod_log::MEMORY_PRESSURE_ABORT_BYTES / 64 + 1) {
            session.record_write(Value::Int32(i as i32), false);
        }
        let err = session.transfer_mods().unwrap_err();
        assert_eq!(err.code, ErrorCode::ExceededTimeLimit);
        assert_eq!(session.state(), DonorState::Aborted);
    }

    #[test]
    fn not_ready_for_critical_section_while_locator_set_still_has_items() {
        let locators = LocatorSet::from_scan((0..1).map(RecordLocator::new));
        let session = MigrationSession::prepare("db.coll", "chunk-0", "shard1", locators);
        assert!(!session.ready_for_critical_section(RecipientState::Steady));
    }
}
