//! The wire protocol: opcodes, the message
//! header, command framing, reply and cursor-response shapes, and the
//! inter-node administrative command documents.

pub mod admin;
pub mod cursor_response;
pub mod header;
pub mod message;
pub mod opcode;
pub mod reply;

pub use admin::{IsMasterResponse, RecvChunkStart, SetShardVersion};
pub use cursor_response::CursorResponse;
pub use header::{MessageHeader, HEADER_LEN};
pub use message::CommandMessage;
pub use opcode::OpCode;
pub use reply::CommandReply;
