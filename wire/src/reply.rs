//! The reply shape every command response carries: `ok ∈ {0,1}` plus,
//! on failure, `code` and `errmsg`.

use db_common::Status;
use db_document::{Document, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct CommandReply {
    pub ok: bool,
    pub status: Option<Status>,
}

impl CommandReply {
    pub fn ok() -> Self {
        CommandReply { ok: true, status: None }
    }

    pub fn from_result<T>(result: &Result<T, Status>) -> Self {
        match result {
            Ok(_) => CommandReply::ok(),
            Err(status) => CommandReply { ok: false, status: Some(status.clone()) },
        }
    }

    pub fn into_document(self) -> Document {
        let mut builder = Document::builder().field("ok", Value::Int32(if self.ok { 1 } else { 0 }));
        if let Some(status) = self.status {
            builder = builder
                .field("code", Value::Int32(status.code as i32))
                .field("errmsg", Value::String(status.message));
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use db_common::ErrorCode;

    #[test]
    fn a_successful_result_encodes_ok_one_with_no_error_fields() {
        let reply = CommandReply::from_result::<()>(&Ok(()));
        let doc = reply.into_document();
        assert_eq!(doc.get("ok"), Some(&Value::Int32(1)));
        assert_eq!(doc.get("code"), None);
    }

    #[test]
    fn a_failed_result_encodes_ok_zero_with_code_and_errmsg() {
        let reply = CommandReply::from_result::<()>(&Err(Status::new(ErrorCode::StaleConfig, "stale")));
        let doc = reply.into_document();
        assert_eq!(doc.get("ok"), Some(&Value::Int32(0)));
        assert_eq!(doc.get("code"), Some(&Value::Int32(ErrorCode::StaleConfig as i32)));
        assert_eq!(doc.get("errmsg"), Some(&Value::String("stale".to_string())));
    }
}
