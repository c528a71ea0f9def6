use db_common::{ErrorCode, Status};

use crate::document::Document;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum KeyDirection {
    Ascending,
    Descending,
    Hashed,
}

/// An ordered shard key pattern, e.g. `{region: 1, _id: "hashed"}`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ShardKeyPattern {
    pub fields: Vec<(String, KeyDirection)>,
}

impl ShardKeyPattern {
    pub fn new(fields: Vec<(String, KeyDirection)>) -> Self {
        ShardKeyPattern { fields }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }
}

/// A document's shard-key tuple, one value per pattern field in pattern
/// order — the canonical form compared against chunk range bounds.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ShardKeyTuple(pub Vec<Value>);

/// Extracts the canonical shard-key tuple from `doc` given `pattern`.
///
/// `Hashed` fields are not hashed here — key derivation for the hashed index
/// type is out of scope; the router and catalog operate on the raw
/// field value plus the pattern's declared direction.
pub fn shard_key_tuple(doc: &Document, pattern: &ShardKeyPattern) -> Result<ShardKeyTuple, Status> {
    let mut values = Vec::with_capacity(pattern.fields.len());
    for (name, _dir) in &pattern.fields {
        let value = doc.get_path(name).ok_or_else(|| {
            Status::new(ErrorCode::ShardKeyNotFound, format!("shard key field '{name}' not found"))
        })?;
        values.push(value.clone());
    }
    Ok(ShardKeyTuple(values))
}

impl ShardKeyTuple {
    pub fn compare(&self, other: &ShardKeyTuple) -> std::cmp::Ordering {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            let ord = crate::value::compare(a, b);
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    #[test]
    fn missing_shard_key_field_is_rejected() {
        let doc = Document::builder().field("a", Value::Int32(1)).build();
        let pattern = ShardKeyPattern::new(vec![("x".into(), KeyDirection::Ascending)]);
        let err = shard_key_tuple(&doc, &pattern).unwrap_err();
        assert_eq!(err.code, ErrorCode::ShardKeyNotFound);
    }

    #[test]
    fn extracts_values_in_pattern_order() {
        let doc = Document::builder()
            .field("b", Value::Int32(2))
            .field("a", Value::Int32(1))
            .build();
        let pattern = ShardKeyPattern::new(vec![
            ("a".into(), KeyDirection::Ascending),
            ("b".into(), KeyDirection::Ascending),
        ]);
        let tuple = shard_key_tuple(&doc, &pattern).unwrap();
        assert_eq!(tuple.0, vec![Value::Int32(1), Value::Int32(2)]);
    }
}
