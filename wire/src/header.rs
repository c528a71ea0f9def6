//! The message header every wire message carries: `{len, requestId,
//! responseTo, opcode}`, little-endian `int32` fields, 16 bytes total.

use bytes::{Buf, BufMut, BytesMut};

use db_common::{ErrorCode, Status};

use crate::opcode::OpCode;

pub const HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub message_length: i32,
    pub request_id: i32,
    pub response_to: i32,
    pub opcode: OpCode,
}

impl MessageHeader {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32_le(self.message_length);
        buf.put_i32_le(self.request_id);
        buf.put_i32_le(self.response_to);
        buf.put_i32_le(self.opcode as i32);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, Status> {
        if buf.remaining() < HEADER_LEN {
            return Err(Status::new(ErrorCode::BadValue, "buffer shorter than a message header"));
        }
        let message_length = buf.get_i32_le();
        let request_id = buf.get_i32_le();
        let response_to = buf.get_i32_le();
        let opcode = OpCode::from_i32(buf.get_i32_le())?;
        Ok(MessageHeader { message_length, request_id, response_to, opcode })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_round_trips() {
        let header = MessageHeader { message_length: 42, request_id: 7, response_to: 0, opcode: OpCode::Command };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_LEN);
        let decoded = MessageHeader::decode(&mut buf).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn decode_rejects_a_short_buffer() {
        let mut buf = BytesMut::from(&b"short"[..]);
        let err = MessageHeader::decode(&mut buf).unwrap_err();
        assert_eq!(err.code, ErrorCode::BadValue);
    }
}
