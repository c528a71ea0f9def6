//! Command-style traffic: a single document body sent against `db.$cmd`,
//! body bytes encoded with `borsh` — the same encoding the document
//! model's derive already produces, rather than introducing a second
//! serialization format for one case.

use db_common::{ErrorCode, Status};
use db_document::Document;

#[derive(Debug, Clone, PartialEq)]
pub struct CommandMessage {
    /// Full namespace the command runs against, e.g. `db.$cmd`.
    pub ns: String,
    pub body: Document,
}

impl CommandMessage {
    pub fn encode(&self) -> Result<Vec<u8>, Status> {
        let mut buf = Vec::new();
        let ns_bytes = self.ns.as_bytes();
        buf.extend_from_slice(&(ns_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(ns_bytes);
        let body = borsh::to_vec(&self.body).map_err(|e| Status::new(ErrorCode::BadValue, format!("encoding command body: {e}")))?;
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Status> {
        if bytes.len() < 4 {
            return Err(Status::new(ErrorCode::BadValue, "command message shorter than its own ns length prefix"));
        }
        let ns_len = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
        if bytes.len() < 4 + ns_len {
            return Err(Status::new(ErrorCode::BadValue, "command message truncated mid-namespace"));
        }
        let ns = String::from_utf8(bytes[4..4 + ns_len].to_vec())
            .map_err(|_| Status::new(ErrorCode::BadValue, "command namespace is not valid utf-8"))?;
        let body: Document = borsh::from_slice(&bytes[4 + ns_len..])
            .map_err(|e| Status::new(ErrorCode::BadValue, format!("decoding command body: {e}")))?;
        Ok(CommandMessage { ns, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db_document::Value;

    #[test]
    fn encode_then_decode_round_trips_ns_and_body() {
        let body = Document::builder().field("insert", Value::String("coll".into())).build();
        let msg = CommandMessage { ns: "db.$cmd".into(), body };
        let encoded = msg.encode().unwrap();
        let decoded = CommandMessage::decode(&encoded).unwrap();
        assert_eq!(decoded.ns, "db.$cmd");
        assert_eq!(decoded.body.get("insert"), Some(&Value::String("coll".into())));
    }

    #[test]
    fn decode_rejects_a_truncated_namespace() {
        let err = CommandMessage::decode(&[5, 0, 0, 0, b'a']).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadValue);
    }
}
