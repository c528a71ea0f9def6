//! Ghost sync: a chained secondary (one syncing from another
//! secondary rather than directly from the primary) forwards its sync
//! source's progress for every other member, so the primary's write-concern
//! tally still sees timely updates from members it isn't directly talking
//! to. Progress is gossiped at heartbeat cadence, not on every apply.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use db_document::Timestamp;

/// Per-member cursor a chained secondary keeps against its sync source's
/// gossiped progress table, so it can forward only what actually advanced
/// since the last gossip round.
#[derive(Default)]
pub struct GhostSyncForwarder {
    last_forwarded: HashMap<u32, Timestamp>,
    last_gossip_at: Option<Instant>,
    gossip_interval: Duration,
}

impl GhostSyncForwarder {
    pub fn new(gossip_interval: Duration) -> Self {
        GhostSyncForwarder { last_forwarded: HashMap::new(), last_gossip_at: None, gossip_interval }
    }

    /// Ingests the sync source's reported progress table (member id ->
    /// applied ts) at heartbeat time.
    pub fn ingest(&mut self, source_progress: &HashMap<u32, Timestamp>, now: Instant) -> Vec<(u32, Timestamp)> {
        if let Some(at) = self.last_gossip_at {
            if now.duration_since(at) < self.gossip_interval {
                return Vec::new();
            }
        }
        let mut advanced = Vec::new();
        for (&member, &ts) in source_progress {
            let should_forward = match self.last_forwarded.get(&member) {
                Some(&prev) => ts > prev,
                None => true,
            };
            if should_forward {
                self.last_forwarded.insert(member, ts);
                advanced.push((member, ts));
            }
        }
        self.last_gossip_at = Some(now);
        advanced
    }
}
