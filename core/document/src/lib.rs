//! The document model: typed, ordered, self-describing record values,
//! canonical comparison, and 128-bit decimal arithmetic.

pub mod decimal128;
pub mod document;
pub mod object_id;
pub mod shard_key;
pub mod value;

pub use decimal128::{Decimal128, DecimalFlags, Precision, RoundingMode};
pub use document::Document;
pub use object_id::ObjectId;
pub use shard_key::{KeyDirection, ShardKeyPattern, shard_key_tuple};
pub use value::{Timestamp, Value};
