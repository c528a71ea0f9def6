use std::cmp::Ordering;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::decimal128::Decimal128;
use crate::document::Document;
use crate::object_id::ObjectId;

/// Replication timestamp: seconds + an in-second increment, ordered
/// lexicographically on `(t, i)`. Distinct from `DateTime`, which is a
/// client-visible wall-clock value.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshSerialize,
    BorshDeserialize,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Timestamp {
    pub t: u32,
    pub i: u32,
}

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp { t: 0, i: 0 };

    pub fn new(t: u32, i: u32) -> Self {
        Timestamp { t, i }
    }
}

/// A field's value, tagged with one of the closed set of BSON-like types
/// from the data model. `PartialEq` is bytewise (field order in nested
/// documents matters); use [`Value::logical_eq`] for order-insensitive
/// comparison.
#[derive(Debug, Clone, BorshSerialize, BorshDeserialize, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    /// Stored as bits so that `Value` can derive `PartialEq`/`Hash`-free
    /// comparisons explicitly through [`compare`] rather than relying on
    /// `f64`'s own `PartialEq`, which does not total-order NaN.
    Double(f64),
    Decimal128(Decimal128),
    String(String),
    Binary(Vec<u8>),
    ObjectId(ObjectId),
    /// Milliseconds since the Unix epoch.
    DateTime(i64),
    Timestamp(Timestamp),
    Regex { pattern: String, options: String },
    Array(Vec<Value>),
    Document(Document),
    MinKey,
    MaxKey,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        compare(self, other) == Ordering::Equal
    }
}

/// BSON-style canonical type ranks used to order values of different types.
/// Numeric types (`Int32`/`Int64`/`Double`/`Decimal128`) share a rank and
/// compare by numeric value, per the data model's "canonical type-rank then
/// value" comparison rule.
fn type_rank(v: &Value) -> u8 {
    match v {
        Value::MinKey => 0,
        Value::Null => 1,
        Value::Int32(_) | Value::Int64(_) | Value::Double(_) | Value::Decimal128(_) => 2,
        Value::String(_) | Value::Regex { .. } => 3,
        Value::Document(_) => 4,
        Value::Array(_) => 5,
        Value::Binary(_) => 6,
        Value::ObjectId(_) => 7,
        Value::Bool(_) => 8,
        Value::DateTime(_) => 9,
        Value::Timestamp(_) => 10,
        Value::MaxKey => 11,
    }
}

fn as_decimal(v: &Value) -> Decimal128 {
    match v {
        Value::Int32(i) => Decimal128::from_i64(*i as i64),
        Value::Int64(i) => Decimal128::from_i64(*i),
        Value::Double(d) => Decimal128::from_f64(*d, crate::decimal128::Precision::Full34),
        Value::Decimal128(d) => *d,
        _ => unreachable!("as_decimal called on a non-numeric value"),
    }
}

/// Canonical comparison: rank first, then value within a rank. Numeric
/// cross-type comparison (`Int32` vs `Double` vs `Decimal128`) goes through
/// `Decimal128` so that e.g. `2` and `2.0` and `Decimal128("2")` compare
/// equal.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Value::MinKey, Value::MinKey) | (Value::MaxKey, Value::MaxKey) | (Value::Null, Value::Null) => {
            Ordering::Equal
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int32(_) | Value::Int64(_) | Value::Double(_) | Value::Decimal128(_), _) => {
            as_decimal(a).compare(&as_decimal(b))
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Regex { pattern: pa, options: oa }, Value::Regex { pattern: pb, options: ob }) => {
            pa.cmp(pb).then_with(|| oa.cmp(ob))
        }
        (Value::Document(x), Value::Document(y)) => compare_documents_as_bytes(x, y),
        (Value::Array(x), Value::Array(y)) => {
            for (xi, yi) in x.iter().zip(y.iter()) {
                let ord = compare(xi, yi);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Binary(x), Value::Binary(y)) => x.cmp(y),
        (Value::ObjectId(x), Value::ObjectId(y)) => x.cmp(y),
        (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        _ => unreachable!("same type rank implies same variant pairing above"),
    }
}

fn compare_documents_as_bytes(a: &Document, b: &Document) -> Ordering {
    for (fa, fb) in a.fields().zip(b.fields()) {
        let ord = fa.0.cmp(fb.0).then_with(|| compare(fa.1, fb.1));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Double(_) => "double",
            Value::Decimal128(_) => "decimal128",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::ObjectId(_) => "objectId",
            Value::DateTime(_) => "datetime",
            Value::Timestamp(_) => "timestamp",
            Value::Regex { .. } => "regex",
            Value::Array(_) => "array",
            Value::Document(_) => "document",
            Value::MinKey => "minKey",
            Value::MaxKey => "maxKey",
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(d) => Some(d),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_rank_orders_null_before_numbers_before_strings() {
        assert_eq!(compare(&Value::Null, &Value::Int32(1)), Ordering::Less);
        assert_eq!(compare(&Value::Int32(1), &Value::String("a".into())), Ordering::Less);
        assert_eq!(compare(&Value::MinKey, &Value::Null), Ordering::Less);
        assert_eq!(compare(&Value::String("a".into()), &Value::MaxKey), Ordering::Less);
    }

    #[test]
    fn cross_numeric_types_compare_by_value() {
        assert_eq!(compare(&Value::Int32(2), &Value::Double(2.0)), Ordering::Equal);
        assert_eq!(compare(&Value::Int64(1), &Value::Double(2.0)), Ordering::Less);
    }

    #[test]
    fn timestamps_order_lexicographically() {
        assert!(Timestamp::new(1, 5) < Timestamp::new(1, 6));
        assert!(Timestamp::new(1, 9) < Timestamp::new(2, 0));
    }
}
