//! A blocking client for the config-catalog node's command framing, used
//! by [`TcpMetadataSource`] at cache-miss time. Blocking is deliberate:
//! metadata fetches are rare (one per `StaleConfig`, not per request), so a
//! synchronous round trip to the config server is simpler than threading
//! async through the whole routing hot path.

use std::io::{Read, Write};
use std::net::TcpStream;

use db_common::{ErrorCode, Status};
use db_document::Document;
use db_wire::{CommandMessage, MessageHeader, OpCode, HEADER_LEN};

pub fn send_command(configdb: &str, body: Document) -> Result<Document, Status> {
    let mut stream = TcpStream::connect(configdb)
        .map_err(|e| Status::new(ErrorCode::BadValue, format!("connecting to config server {configdb}: {e}")))?;

    let msg = CommandMessage { ns: "config.$cmd".to_string(), body };
    let body_bytes = msg.encode()?;
    let header = MessageHeader {
        message_length: (HEADER_LEN + body_bytes.len()) as i32,
        request_id: 1,
        response_to: 0,
        opcode: OpCode::Command,
    };
    let mut out = bytes::BytesMut::with_capacity(HEADER_LEN + body_bytes.len());
    header.encode(&mut out);
    out.extend_from_slice(&body_bytes);
    stream
        .write_all(&out)
        .map_err(|e| Status::new(ErrorCode::BadValue, format!("writing to config server: {e}")))?;

    let mut header_buf = [0u8; HEADER_LEN];
    stream
        .read_exact(&mut header_buf)
        .map_err(|e| Status::new(ErrorCode::BadValue, format!("reading config server reply header: {e}")))?;
    let mut cursor = bytes::Bytes::copy_from_slice(&header_buf);
    let reply_header = MessageHeader::decode(&mut cursor)?;
    let reply_len = (reply_header.message_length as usize).saturating_sub(HEADER_LEN);
    let mut reply_body = vec![0u8; reply_len];
    stream
        .read_exact(&mut reply_body)
        .map_err(|e| Status::new(ErrorCode::BadValue, format!("reading config server reply body: {e}")))?;
    borsh::from_slice(&reply_body).map_err(|e| Status::new(ErrorCode::BadValue, format!("decoding config server reply: {e}")))
}
