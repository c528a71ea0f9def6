//! The donor's captured set of record locators within the chunk range
//!: populated by a full index scan at prepare time, then
//! drained in batches during the transfer loop. A concurrent delete of a
//! locator still in the set removes it via the deletion-notification
//! stage, so a drained batch never references a record that no longer
//! exists.

use std::collections::BTreeSet;

use db_store::locator::RecordLocator;

#[derive(Debug, Default)]
pub struct LocatorSet {
    remaining: BTreeSet<RecordLocator>,
}

impl LocatorSet {
    pub fn from_scan(locators: impl IntoIterator<Item = RecordLocator>) -> Self {
        LocatorSet { remaining: locators.into_iter().collect() }
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Deletion-notification callback: invoked by the record store's
    /// invalidation hook when `loc` is deleted anywhere in the collection,
    /// not just within the chunk range — a no-op if `loc` was never in the
    /// set.
    pub fn notify_deleted(&mut self, loc: RecordLocator) {
        self.remaining.remove(&loc);
    }

    /// Removes and returns up to `max_count` locators in ascending order,
    /// for the caller to fetch and ship as one transfer batch.
    pub fn take_batch(&mut self, max_count: usize) -> Vec<RecordLocator> {
        let batch: Vec<RecordLocator> = self.remaining.iter().take(max_count).copied().collect();
        for loc in &batch {
            self.remaining.remove(loc);
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_batch_drains_up_to_the_requested_count() {
        let mut set = LocatorSet::from_scan((0..5).map(RecordLocator::new));
        let batch = set.take_batch(3);
        assert_eq!(batch.len(), 3);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn notify_deleted_removes_a_locator_before_it_is_batched() {
        let mut set = LocatorSet::from_scan((0..3).map(RecordLocator::new));
        set.notify_deleted(RecordLocator::new(1));
        let batch = set.take_batch(10);
        assert_eq!(batch.len(), 2);
        assert!(!batch.contains(&RecordLocator::new(1)));
    }

    #[test]
    fn notify_deleted_outside_the_set_is_a_no_op() {
        let mut set = LocatorSet::from_scan((0..2).map(RecordLocator::new));
        set.notify_deleted(RecordLocator::new(99));
        assert_eq!(set.len(), 2);
    }
}
