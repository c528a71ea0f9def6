use borsh::{BorshDeserialize, BorshSerialize};

use crate::value::{Value, compare};
use db_common::{ErrorCode, Status};

/// A document: a finite ordered sequence of named fields. Field order is
/// preserved and significant for bytewise equality but not for logical
/// equality — two documents with the same fields in a different order are
/// `logical_eq` but not `==`.
#[derive(Debug, Clone, Default, BorshSerialize, BorshDeserialize, serde::Serialize, serde::Deserialize)]
pub struct Document {
    fields: Vec<(String, Value)>,
}

impl Document {
    pub fn new() -> Self {
        Document { fields: Vec::new() }
    }

    pub fn builder() -> DocumentBuilder {
        DocumentBuilder(Document::new())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter().map(|(k, v)| (k, v))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Extracts a value by dotted path, e.g. `"a.b.c"`, descending through
    /// nested documents (and, for a numeric path segment, into arrays).
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut current = self.get(path.split('.').next()?)?;
        let mut rest = path.splitn(2, '.').nth(1);
        while let Some(segment_path) = rest {
            let (segment, tail) = match segment_path.split_once('.') {
                Some((s, t)) => (s, Some(t)),
                None => (segment_path, None),
            };
            current = match current {
                Value::Document(d) => d.get(segment)?,
                Value::Array(items) => {
                    let idx: usize = segment.parse().ok()?;
                    items.get(idx)?
                }
                _ => return None,
            };
            rest = tail;
        }
        Some(current)
    }

    /// `_id` is required on every stored document; callers that need the
    /// identifying field reach for this rather than `get("_id")` to make the
    /// invariant explicit at call sites.
    pub fn id(&self) -> Result<&Value, Status> {
        self.get("_id").ok_or_else(|| {
            Status::new(ErrorCode::BadValue, "document is missing required field _id")
        })
    }

    /// Order-insensitive equality: same field names and values, any order.
    pub fn logical_eq(&self, other: &Document) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.fields.iter().all(|(k, v)| other.get(k).is_some_and(|ov| compare(v, ov).is_eq()))
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.fields.push((name.into(), value));
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va == vb)
    }
}

/// Builds a [`Document`] field by field in insertion order.
pub struct DocumentBuilder(Document);

impl DocumentBuilder {
    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.0.push(name, value);
        self
    }

    pub fn build(self) -> Document {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_id::ObjectId;

    fn sample() -> Document {
        Document::builder()
            .field("_id", Value::ObjectId(ObjectId([1; 12])))
            .field("a", Value::String("b".into()))
            .field("nested", Value::Document(Document::builder().field("x", Value::Int32(3)).build()))
            .build()
    }

    #[test]
    fn field_order_is_preserved() {
        let doc = sample();
        let names: Vec<&str> = doc.fields().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["_id", "a", "nested"]);
    }

    #[test]
    fn dotted_path_descends_into_nested_documents() {
        let doc = sample();
        assert_eq!(doc.get_path("nested.x"), Some(&Value::Int32(3)));
        assert_eq!(doc.get_path("nested.missing"), None);
    }

    #[test]
    fn logical_eq_ignores_field_order() {
        let a = Document::builder().field("x", Value::Int32(1)).field("y", Value::Int32(2)).build();
        let b = Document::builder().field("y", Value::Int32(2)).field("x", Value::Int32(1)).build();
        assert!(a.logical_eq(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn missing_id_is_bad_value() {
        let doc = Document::builder().field("a", Value::Int32(1)).build();
        let err = doc.id().unwrap_err();
        assert_eq!(err.code, db_common::ErrorCode::BadValue);
    }
}
