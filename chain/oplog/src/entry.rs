use db_document::{Document, Timestamp};

/// Tags what an oplog entry records, matching the five kinds a node ever
/// appends: insert, update, delete, command (DDL, e.g. `create`/
/// `drop`/`createIndexes`), and no-op (used for keepalive and the
/// "I am primary" marker written on election).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OpKind {
    #[serde(rename = "i")]
    Insert,
    #[serde(rename = "u")]
    Update,
    #[serde(rename = "d")]
    Delete,
    #[serde(rename = "c")]
    Command,
    #[serde(rename = "n")]
    Noop,
}

/// One replicated operation. Field names and shapes follow the catalog
/// convention of short, stable keys (`ts`, `op`, `ns`, `o`, `o2`, `h`)
/// rather than verbose ones, since these are written at high volume and
/// read by every secondary.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OplogEntry {
    pub ts: Timestamp,
    pub op: OpKind,
    pub ns: String,
    /// The inserted document, the update's replacement/modifier document,
    /// or the command document, depending on `op`.
    pub o: Document,
    /// For `Update`, the query that identified the target document (so a
    /// secondary or a rollback-undo pass can locate it without replaying
    /// the original query planner decision). Unused for other op kinds.
    pub o2: Option<Document>,
    /// Hash of the entry, chained from the previous entry's hash, used to
    /// detect a divergent history during rollback's common-point walk.
    pub h: i64,
    /// `true` when this entry was produced by applying a chunk-migration
    /// clone rather than a client write — gates duplicate-key tolerance on
    /// the migration recipient.
    #[serde(default)]
    pub from_migrate: bool,
}

impl OplogEntry {
    pub fn insert(ts: Timestamp, ns: impl Into<String>, doc: Document, h: i64) -> Self {
        OplogEntry { ts, op: OpKind::Insert, ns: ns.into(), o: doc, o2: None, h, from_migrate: false }
    }

    pub fn update(ts: Timestamp, ns: impl Into<String>, query: Document, modifier: Document, h: i64) -> Self {
        OplogEntry { ts, op: OpKind::Update, ns: ns.into(), o: modifier, o2: Some(query), h, from_migrate: false }
    }

    pub fn delete(ts: Timestamp, ns: impl Into<String>, query: Document, h: i64) -> Self {
        OplogEntry { ts, op: OpKind::Delete, ns: ns.into(), o: query, o2: None, h, from_migrate: false }
    }

    pub fn command(ts: Timestamp, ns: impl Into<String>, cmd: Document, h: i64) -> Self {
        OplogEntry { ts, op: OpKind::Command, ns: ns.into(), o: cmd, o2: None, h, from_migrate: false }
    }

    pub fn noop(ts: Timestamp, msg: impl Into<String>, h: i64) -> Self {
        let doc = Document::builder().field("msg", db_document::Value::String(msg.into())).build();
        OplogEntry { ts, op: OpKind::Noop, ns: String::new(), o: doc, o2: None, h, from_migrate: false }
    }

    pub fn marked_from_migrate(mut self) -> Self {
        self.from_migrate = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_entries_carry_no_namespace() {
        let entry = OplogEntry::noop(Timestamp::new(1, 0), "initiating set", 0);
        assert_eq!(entry.op, OpKind::Noop);
        assert!(entry.ns.is_empty());
    }

    #[test]
    fn marked_from_migrate_flips_the_flag() {
        let entry = OplogEntry::insert(Timestamp::new(1, 0), "db.coll", Document::new(), 0).marked_from_migrate();
        assert!(entry.from_migrate);
    }
}
