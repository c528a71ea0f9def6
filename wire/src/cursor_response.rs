//! Cursor response shape: `{cursor: {id, ns, firstBatch|nextBatch}}`,
//! the reply body for `find`/`getMore`.

use db_document::{Document, Value};

pub struct CursorResponse {
    pub cursor_id: i64,
    pub ns: String,
    pub batch: Vec<Document>,
    pub is_first_batch: bool,
}

impl CursorResponse {
    pub fn into_document(self) -> Document {
        let batch_field = if self.is_first_batch { "firstBatch" } else { "nextBatch" };
        let cursor = Document::builder()
            .field("id", Value::Int64(self.cursor_id))
            .field("ns", Value::String(self.ns))
            .field(batch_field, Value::Array(self.batch.into_iter().map(Value::Document).collect()))
            .build();
        Document::builder().field("cursor", Value::Document(cursor)).build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_batch_uses_the_firstbatch_field_name() {
        let response = CursorResponse { cursor_id: 0, ns: "db.coll".into(), batch: vec![], is_first_batch: true };
        let doc = response.into_document();
        let cursor = doc.get("cursor").unwrap().as_document().unwrap();
        assert!(cursor.get("firstBatch").is_some());
        assert!(cursor.get("nextBatch").is_none());
    }

    #[test]
    fn subsequent_batches_use_the_nextbatch_field_name() {
        let response = CursorResponse { cursor_id: 7, ns: "db.coll".into(), batch: vec![], is_first_batch: false };
        let doc = response.into_document();
        let cursor = doc.get("cursor").unwrap().as_document().unwrap();
        assert!(cursor.get("nextBatch").is_some());
    }
}
