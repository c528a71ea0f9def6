//! Inter-node administrative command document shapes: the subset of
//! traffic nodes exchange among themselves rather than with clients.
//! Modeled as typed builders/readers over [`Document`] rather than opaque
//! JSON so field names and types match the wire contract exactly.

use db_common::{ErrorCode, Status};
use db_document::{Document, ObjectId, Value};

/// `setShardVersion`: the command a router or shard primary sends to
/// establish or refresh a connection's view of a collection's version.
/// Field list matches the wire protocol exactly, including the packed `major<<32|minor`
/// encoding of `version`.
#[derive(Debug, Clone, PartialEq)]
pub struct SetShardVersion {
    pub ns: String,
    pub init: bool,
    pub force_refresh: bool,
    pub authoritative: bool,
    pub configdb: String,
    pub shard: String,
    pub shard_host: String,
    pub version_packed: i64,
    pub epoch: ObjectId,
    pub no_connection_versioning: bool,
}

impl SetShardVersion {
    pub fn pack_version(major: u32, minor: u32) -> i64 {
        ((major as i64) << 32) | minor as i64
    }

    pub fn unpack_version(packed: i64) -> (u32, u32) {
        ((packed >> 32) as u32, packed as u32)
    }

    pub fn into_document(self) -> Document {
        Document::builder()
            .field("setShardVersion", Value::String(self.ns))
            .field("init", Value::Bool(self.init))
            .field("forceRefresh", Value::Bool(self.force_refresh))
            .field("authoritative", Value::Bool(self.authoritative))
            .field("configdb", Value::String(self.configdb))
            .field("shard", Value::String(self.shard))
            .field("shardHost", Value::String(self.shard_host))
            .field("version", Value::Int64(self.version_packed))
            .field("versionEpoch", Value::ObjectId(self.epoch))
            .field("noConnectionVersioning", Value::Bool(self.no_connection_versioning))
            .build()
    }

    pub fn from_document(doc: &Document) -> Result<Self, Status> {
        let field_string = |name: &str| -> Result<String, Status> {
            match doc.get(name) {
                Some(Value::String(s)) => Ok(s.clone()),
                _ => Err(Status::new(ErrorCode::BadValue, format!("setShardVersion missing string field {name}"))),
            }
        };
        let field_bool = |name: &str| -> Result<bool, Status> {
            match doc.get(name) {
                Some(Value::Bool(b)) => Ok(*b),
                _ => Err(Status::new(ErrorCode::BadValue, format!("setShardVersion missing bool field {name}"))),
            }
        };
        let version_packed = match doc.get("version") {
            Some(Value::Int64(v)) => *v,
            _ => return Err(Status::new(ErrorCode::BadValue, "setShardVersion missing version")),
        };
        let epoch = match doc.get("versionEpoch") {
            Some(Value::ObjectId(id)) => *id,
            _ => return Err(Status::new(ErrorCode::BadValue, "setShardVersion missing versionEpoch")),
        };
        Ok(SetShardVersion {
            ns: field_string("setShardVersion")?,
            init: field_bool("init")?,
            force_refresh: field_bool("forceRefresh")?,
            authoritative: field_bool("authoritative")?,
            configdb: field_string("configdb")?,
            shard: field_string("shard")?,
            shard_host: field_string("shardHost")?,
            version_packed,
            epoch,
            no_connection_versioning: doc.get("noConnectionVersioning").map(|v| matches!(v, Value::Bool(true))).unwrap_or(false),
        })
    }
}

/// `isMaster` / heartbeat response: the subset of fields the replica-set
/// coordinator and router connection pool actually consume.
#[derive(Debug, Clone, PartialEq)]
pub struct IsMasterResponse {
    pub is_master: bool,
    pub secondary: bool,
    pub set_name: String,
    pub primary: Option<String>,
}

impl IsMasterResponse {
    pub fn into_document(self) -> Document {
        let mut builder = Document::builder()
            .field("ismaster", Value::Bool(self.is_master))
            .field("secondary", Value::Bool(self.secondary))
            .field("setName", Value::String(self.set_name));
        if let Some(primary) = self.primary {
            builder = builder.field("primary", Value::String(primary));
        }
        builder.build()
    }
}

/// `_recvChunkStart`: the donor's request to begin a chunk migration on a
/// recipient shard.
#[derive(Debug, Clone, PartialEq)]
pub struct RecvChunkStart {
    pub session_id: String,
    pub ns: String,
    pub from_shard: String,
    pub min: Document,
    pub max: Document,
}

impl RecvChunkStart {
    pub fn into_document(self) -> Document {
        Document::builder()
            .field("_recvChunkStart", Value::String(self.ns))
            .field("sessionId", Value::String(self.session_id))
            .field("from", Value::String(self.from_shard))
            .field("min", Value::Document(self.min))
            .field("max", Value::Document(self.max))
            .build()
    }
}

/// `replSetHeartbeat`: one member polling another for its current term,
/// progress, and member state.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplSetHeartbeatRequest {
    pub set_name: String,
    pub from_id: u32,
    pub config_version: u64,
}

impl ReplSetHeartbeatRequest {
    pub fn into_document(self) -> Document {
        Document::builder()
            .field("replSetHeartbeat", Value::String(self.set_name))
            .field("fromId", Value::Int32(self.from_id as i32))
            .field("configVersion", Value::Int64(self.config_version as i64))
            .build()
    }

    pub fn from_document(doc: &Document) -> Result<Self, Status> {
        let set_name = match doc.get("replSetHeartbeat") {
            Some(Value::String(s)) => s.clone(),
            _ => return Err(Status::new(ErrorCode::BadValue, "replSetHeartbeat missing set name")),
        };
        let from_id = match doc.get("fromId") {
            Some(Value::Int32(v)) => *v as u32,
            _ => return Err(Status::new(ErrorCode::BadValue, "replSetHeartbeat missing fromId")),
        };
        let config_version = match doc.get("configVersion") {
            Some(Value::Int64(v)) => *v as u64,
            _ => return Err(Status::new(ErrorCode::BadValue, "replSetHeartbeat missing configVersion")),
        };
        Ok(ReplSetHeartbeatRequest { set_name, from_id, config_version })
    }
}

/// The responding member's term/progress/state, matching the fields
/// `db-replset`'s `HeartbeatResponse` tracks per peer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplSetHeartbeatResponse {
    pub term: u64,
    pub last_applied: db_document::Timestamp,
    /// `MemberState` encoded as its discriminant so this crate doesn't
    /// need a dependency on `db-replset` for one enum.
    pub state_tag: i32,
    pub config_version: u64,
}

impl ReplSetHeartbeatResponse {
    pub fn into_document(self) -> Document {
        Document::builder()
            .field("ok", Value::Int32(1))
            .field("term", Value::Int64(self.term as i64))
            .field("lastApplied", Value::Timestamp(self.last_applied))
            .field("state", Value::Int32(self.state_tag))
            .field("configVersion", Value::Int64(self.config_version as i64))
            .build()
    }

    pub fn from_document(doc: &Document) -> Result<Self, Status> {
        let term = match doc.get("term") {
            Some(Value::Int64(v)) => *v as u64,
            _ => return Err(Status::new(ErrorCode::BadValue, "heartbeat reply missing term")),
        };
        let last_applied = match doc.get("lastApplied") {
            Some(Value::Timestamp(ts)) => *ts,
            _ => return Err(Status::new(ErrorCode::BadValue, "heartbeat reply missing lastApplied")),
        };
        let state_tag = match doc.get("state") {
            Some(Value::Int32(v)) => *v,
            _ => return Err(Status::new(ErrorCode::BadValue, "heartbeat reply missing state")),
        };
        let config_version = match doc.get("configVersion") {
            Some(Value::Int64(v)) => *v as u64,
            _ => return Err(Status::new(ErrorCode::BadValue, "heartbeat reply missing configVersion")),
        };
        Ok(ReplSetHeartbeatResponse { term, last_applied, state_tag, config_version })
    }
}

/// `replSetGetOplog`: a secondary's tailable-fetch request against its
/// chosen sync source, answered with every entry strictly after `after`,
/// capped at `max_batch`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplSetGetOplogRequest {
    pub after: db_document::Timestamp,
    pub max_batch: u32,
}

impl ReplSetGetOplogRequest {
    pub fn into_document(self) -> Document {
        Document::builder()
            .field("replSetGetOplog", Value::Int32(1))
            .field("after", Value::Timestamp(self.after))
            .field("maxBatch", Value::Int32(self.max_batch as i32))
            .build()
    }

    pub fn from_document(doc: &Document) -> Result<Self, Status> {
        let after = match doc.get("after") {
            Some(Value::Timestamp(ts)) => *ts,
            _ => return Err(Status::new(ErrorCode::BadValue, "replSetGetOplog missing after")),
        };
        let max_batch = match doc.get("maxBatch") {
            Some(Value::Int32(v)) => *v as u32,
            _ => return Err(Status::new(ErrorCode::BadValue, "replSetGetOplog missing maxBatch")),
        };
        Ok(ReplSetGetOplogRequest { after, max_batch })
    }
}

/// Carries the fetched batch as a serialized blob rather than a nested
/// `Value::Array` of per-entry documents, since `OplogEntry` already has a
/// stable `serde` encoding shared with the oplog's own on-disk format.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplSetGetOplogResponse {
    pub entries_json: Vec<u8>,
}

impl ReplSetGetOplogResponse {
    pub fn into_document(self) -> Document {
        Document::builder().field("ok", Value::Int32(1)).field("entries", Value::Binary(self.entries_json)).build()
    }

    pub fn from_document(doc: &Document) -> Result<Self, Status> {
        match doc.get("entries") {
            Some(Value::Binary(bytes)) => Ok(ReplSetGetOplogResponse { entries_json: bytes.clone() }),
            _ => Err(Status::new(ErrorCode::BadValue, "replSetGetOplog reply missing entries")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_shard_version_round_trips_through_a_document() {
        let epoch = ObjectId([4; 12]);
        let cmd = SetShardVersion {
            ns: "db.coll".into(),
            init: false,
            force_refresh: false,
            authoritative: true,
            configdb: "cfg/c1:1,c2:1".into(),
            shard: "shard0".into(),
            shard_host: "shard0/h1:1".into(),
            version_packed: SetShardVersion::pack_version(3, 1),
            epoch,
            no_connection_versioning: false,
        };
        let doc = cmd.clone().into_document();
        let parsed = SetShardVersion::from_document(&doc).unwrap();
        assert_eq!(parsed, cmd);
    }

    #[test]
    fn pack_and_unpack_version_are_inverses() {
        let packed = SetShardVersion::pack_version(5, 9);
        assert_eq!(SetShardVersion::unpack_version(packed), (5, 9));
    }

    #[test]
    fn ismaster_response_omits_primary_when_absent() {
        let response = IsMasterResponse { is_master: false, secondary: true, set_name: "rs0".into(), primary: None };
        let doc = response.into_document();
        assert!(doc.get("primary").is_none());
    }
}
