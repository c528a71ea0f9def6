//! Wire opcodes: the legacy op-per-operation set plus the modern
//! single command-message opcode traffic has mostly moved to. Numeric
//! values match the documented wire protocol exactly — they're read by
//! clients this crate doesn't control, so they are never renumbered.

use db_common::{ErrorCode, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum OpCode {
    Reply = 1,
    Query = 2004,
    GetMore = 2005,
    Insert = 2002,
    Update = 2001,
    Delete = 2006,
    KillCursors = 2007,
    Command = 2010,
    CommandReply = 2011,
    Msg = 2013,
}

impl OpCode {
    pub fn from_i32(raw: i32) -> Result<Self, Status> {
        match raw {
            1 => Ok(OpCode::Reply),
            2004 => Ok(OpCode::Query),
            2005 => Ok(OpCode::GetMore),
            2002 => Ok(OpCode::Insert),
            2001 => Ok(OpCode::Update),
            2006 => Ok(OpCode::Delete),
            2007 => Ok(OpCode::KillCursors),
            2010 => Ok(OpCode::Command),
            2011 => Ok(OpCode::CommandReply),
            2013 => Ok(OpCode::Msg),
            other => Err(Status::new(ErrorCode::BadValue, format!("unrecognized opcode {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_known_opcode() {
        for op in [
            OpCode::Reply,
            OpCode::Query,
            OpCode::GetMore,
            OpCode::Insert,
            OpCode::Update,
            OpCode::Delete,
            OpCode::KillCursors,
            OpCode::Command,
            OpCode::CommandReply,
            OpCode::Msg,
        ] {
            assert_eq!(OpCode::from_i32(op as i32).unwrap(), op);
        }
    }

    #[test]
    fn an_unknown_opcode_is_bad_value() {
        let err = OpCode::from_i32(9999).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadValue);
    }
}
