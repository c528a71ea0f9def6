use db_document::shard_key::ShardKeyTuple;
use db_document::ObjectId;

/// `(epoch, major, minor)`. `epoch` changes only when a collection is
/// dropped and recreated (or resharded) — a mismatched epoch means the
/// caller's whole view of the collection is stale, not just one chunk, and
/// forces a full metadata reload rather than an incremental one. `major`
/// bumps on a chunk move, `minor` on a split, giving a router exactly enough
/// granularity for deciding whether a version bump requires invalidating
/// cached routing state versus just refreshing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChunkVersion {
    pub epoch: ObjectId,
    pub major: u64,
    pub minor: u64,
}

impl ChunkVersion {
    pub fn new(epoch: ObjectId) -> Self {
        ChunkVersion { epoch, major: 1, minor: 0 }
    }

    pub fn bump_major(self) -> Self {
        ChunkVersion { epoch: self.epoch, major: self.major + 1, minor: 0 }
    }

    pub fn bump_minor(self) -> Self {
        ChunkVersion { epoch: self.epoch, major: self.major, minor: self.minor + 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionCompare {
    /// Epochs differ: the caller's entire cached view is void, not just
    /// this one comparison.
    EpochMismatch,
    /// Same epoch, caller's version is strictly behind — refresh and
    /// retry.
    CallerStale,
    /// Same epoch, caller's version is strictly ahead of what the shard
    /// believes — a bug, or the shard itself hasn't caught up to a
    /// metadata write it should already know about.
    CallerAhead,
    Equal,
}

pub fn compare_versions(caller: ChunkVersion, authoritative: ChunkVersion) -> VersionCompare {
    if caller.epoch != authoritative.epoch {
        return VersionCompare::EpochMismatch;
    }
    match (caller.major, caller.minor).cmp(&(authoritative.major, authoritative.minor)) {
        std::cmp::Ordering::Less => VersionCompare::CallerStale,
        std::cmp::Ordering::Greater => VersionCompare::CallerAhead,
        std::cmp::Ordering::Equal => VersionCompare::Equal,
    }
}

/// A contiguous, half-open range `[min, max)` of shard-key space owned by
/// one shard. Field names (`_id`, `lastmod`, `lastmodEpoch`, `ns`, `min`,
/// `max`, `shard`, `jumbo`) match the persisted catalog document shape so
/// an operator inspecting `config.chunks` sees the same names this struct
/// uses.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Chunk {
    #[serde(rename = "_id")]
    pub id: String,
    pub ns: String,
    pub min: ShardKeyTuple,
    pub max: ShardKeyTuple,
    pub shard: String,
    #[serde(rename = "lastmod")]
    pub lastmod_version: (u64, u64),
    #[serde(rename = "lastmodEpoch")]
    pub lastmod_epoch: ObjectId,
    #[serde(default)]
    pub jumbo: bool,
}

impl Chunk {
    pub fn version(&self) -> ChunkVersion {
        ChunkVersion { epoch: self.lastmod_epoch, major: self.lastmod_version.0, minor: self.lastmod_version.1 }
    }

    pub fn set_version(&mut self, v: ChunkVersion) {
        self.lastmod_epoch = v.epoch;
        self.lastmod_version = (v.major, v.minor);
    }

    pub fn contains(&self, key: &ShardKeyTuple) -> bool {
        self.min.compare(key) != std::cmp::Ordering::Greater && self.max.compare(key) == std::cmp::Ordering::Greater
    }
}
