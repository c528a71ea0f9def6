//! The config-catalog node: holds the
//! authoritative `Catalog` and answers the catalog-mutation and
//! metadata-fetch commands that `server/routerd` and each shard's refresh
//! path send it. Framing matches `server/dbnode`'s: a `MessageHeader`
//! followed by a borsh-encoded command [`Document`].

mod cli;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use db_catalog::{Catalog, CollectionMetadata};
use db_common::{ErrorCode, Status};
use db_document::shard_key::ShardKeyPattern;
use db_document::{Document, Value};
use db_o11y::LogConfig;
use db_wire::{CommandMessage, CommandReply, IsMasterResponse, MessageHeader, OpCode, HEADER_LEN};

use cli::ConfigSvrArgs;

#[derive(serde::Deserialize)]
struct CreateCollectionArgs {
    ns: String,
    key: ShardKeyPattern,
    unique: bool,
}

#[derive(serde::Deserialize)]
struct SplitChunkArgs {
    ns: String,
    at: Vec<Value>,
}

#[derive(serde::Deserialize)]
struct MoveChunkArgs {
    ns: String,
    chunk_id: String,
    to_shard: String,
}

fn main() {
    let args = ConfigSvrArgs::parse();
    db_o11y::init_logging(&LogConfig::default());

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().expect("failed to start tokio runtime");
    if let Err(e) = runtime.block_on(run(args)) {
        tracing::error!("configsvr exited with error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: ConfigSvrArgs) -> anyhow::Result<()> {
    let bind_addr = format!("{}:{}", args.bind_ip, args.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "configsvr listening");

    let catalog = Arc::new(Catalog::new());

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, peer) = accepted?;
                let catalog = catalog.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(catalog, socket).await {
                        tracing::debug!(%peer, error = %e, "connection closed");
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                return Ok(());
            }
        }
    }
}

async fn serve_connection(catalog: Arc<Catalog>, mut socket: TcpStream) -> anyhow::Result<()> {
    loop {
        let mut header_buf = [0u8; HEADER_LEN];
        match socket.read_exact(&mut header_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        let mut cursor = bytes::Bytes::copy_from_slice(&header_buf);
        let header = MessageHeader::decode(&mut cursor).map_err(|e| anyhow::anyhow!(e))?;

        let body_len = (header.message_length as usize).saturating_sub(HEADER_LEN);
        let mut body = vec![0u8; body_len];
        socket.read_exact(&mut body).await?;

        let reply_doc = handle_command(&catalog, &body);
        let reply_bytes = borsh::to_vec(&reply_doc)?;
        let reply_header = MessageHeader {
            message_length: (HEADER_LEN + reply_bytes.len()) as i32,
            request_id: header.response_to.wrapping_add(1),
            response_to: header.request_id,
            opcode: OpCode::CommandReply,
        };
        let mut out = bytes::BytesMut::with_capacity(HEADER_LEN + reply_bytes.len());
        reply_header.encode(&mut out);
        out.extend_from_slice(&reply_bytes);
        socket.write_all(&out).await?;
    }
}

fn handle_command(catalog: &Catalog, body: &[u8]) -> Document {
    let msg = match CommandMessage::decode(body) {
        Ok(msg) => msg,
        Err(status) => return CommandReply::from_result::<()>(&Err(status)).into_document(),
    };

    let (name, value) = match msg.body.fields().next() {
        Some((name, value)) => (name.clone(), value.clone()),
        None => {
            let status = Status::new(ErrorCode::BadValue, "command document has no command field");
            return CommandReply::from_result::<()>(&Err(status)).into_document();
        }
    };

    let result = dispatch(catalog, &name, &value);
    match result {
        Ok(doc) => doc,
        Err(status) => CommandReply::from_result::<()>(&Err(status)).into_document(),
    }
}

fn dispatch(catalog: &Catalog, name: &str, value: &Value) -> Result<Document, Status> {
    match name {
        "isMaster" | "ismaster" => Ok(IsMasterResponse { is_master: true, secondary: false, set_name: String::new(), primary: None }.into_document()),
        "getCollectionMetadata" => {
            let ns = string_arg(value)?;
            let meta = catalog
                .get(&ns)
                .ok_or_else(|| Status::new(ErrorCode::BadValue, format!("no such sharded collection {ns}")))?;
            let json = serde_json::to_string(&meta).map_err(|e| Status::new(ErrorCode::BadValue, format!("encoding metadata: {e}")))?;
            Ok(Document::builder().field("ok", Value::Int32(1)).field("meta", Value::String(json)).build())
        }
        "createCollection" => {
            let args: CreateCollectionArgs = json_arg(value)?;
            catalog.create_collection(CollectionMetadata::new(args.ns, args.key, args.unique))?;
            Ok(Document::builder().field("ok", Value::Int32(1)).build())
        }
        "splitChunk" => {
            let args: SplitChunkArgs = json_arg(value)?;
            catalog.split_chunk(&args.ns, &db_document::shard_key::ShardKeyTuple(args.at))?;
            Ok(Document::builder().field("ok", Value::Int32(1)).build())
        }
        "moveChunk" => {
            let args: MoveChunkArgs = json_arg(value)?;
            let new_version = catalog.move_chunk(&args.ns, &args.chunk_id, &args.to_shard)?;
            let json = serde_json::to_string(&new_version).map_err(|e| Status::new(ErrorCode::BadValue, format!("encoding version: {e}")))?;
            Ok(Document::builder().field("ok", Value::Int32(1)).field("version", Value::String(json)).build())
        }
        other => Err(Status::new(ErrorCode::BadValue, format!("unrecognized command {other}"))),
    }
}

fn string_arg(value: &Value) -> Result<String, Status> {
    match value {
        Value::String(s) => Ok(s.clone()),
        _ => Err(Status::new(ErrorCode::BadValue, "command argument must be a string")),
    }
}

fn json_arg<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T, Status> {
    let s = string_arg(value)?;
    serde_json::from_str(&s).map_err(|e| Status::new(ErrorCode::BadValue, format!("decoding command arguments: {e}")))
}
