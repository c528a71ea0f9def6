//! The router (`mongos`-analog) binary. Holds no data
//! of its own: every request either answers directly (e.g. `isMaster`) or
//! consults the cached routing table via `db-router`, refreshing
//! from the config-catalog node on a cache miss or `StaleConfig`.

mod cli;
mod config_client;

use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use db_catalog::CollectionMetadata;
use db_common::{ErrorCode, Status};
use db_document::{shard_key::ShardKeyPredicate, shard_key::ShardKeyTuple, Document, Value};
use db_o11y::LogConfig;
use db_router::{target_shards, MetadataSource, Router};
use db_wire::{CommandMessage, CommandReply, IsMasterResponse, MessageHeader, OpCode, HEADER_LEN};

use cli::RouterdArgs;

struct TcpMetadataSource {
    configdb: String,
}

impl MetadataSource for TcpMetadataSource {
    fn fetch(&self, ns: &str) -> Result<CollectionMetadata, Status> {
        let request = Document::builder().field("getCollectionMetadata", Value::String(ns.to_string())).build();
        let reply = config_client::send_command(&self.configdb, request)?;
        match reply.get("meta") {
            Some(Value::String(json)) => {
                serde_json::from_str(json).map_err(|e| Status::new(ErrorCode::BadValue, format!("decoding collection metadata: {e}")))
            }
            _ => Err(Status::new(ErrorCode::BadValue, "config server reply had no metadata")),
        }
    }
}

#[derive(serde::Deserialize)]
struct GetShardsArgs {
    ns: String,
    key: Vec<Value>,
}

fn main() {
    let args = RouterdArgs::parse();
    db_o11y::init_logging(&LogConfig::default());

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build().expect("failed to start tokio runtime");
    if let Err(e) = runtime.block_on(run(args)) {
        tracing::error!("routerd exited with error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: RouterdArgs) -> anyhow::Result<()> {
    let bind_addr = format!("{}:{}", args.bind_ip, args.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, configdb = %args.configdb, "routerd listening");

    let router = Arc::new(Router::new(Box::new(TcpMetadataSource { configdb: args.configdb })));

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, peer) = accepted?;
                let router = router.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve_connection(router, socket).await {
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

async fn serve_connection(router: Arc<Router>, mut socket: TcpStream) -> anyhow::Result<()> {
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

        let router = router.clone();
        let reply_doc = tokio::task::spawn_blocking(move || handle_command(&router, &body)).await?;
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

fn handle_command(router: &Router, body: &[u8]) -> Document {
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

    let result = match name.as_str() {
        "isMaster" | "ismaster" => Ok(IsMasterResponse { is_master: true, secondary: false, set_name: String::new(), primary: None }.into_document()),
        "getShardsForKey" => get_shards_for_key(router, &value),
        other => Err(Status::new(ErrorCode::BadValue, format!("unrecognized command {other}"))),
    };

    match result {
        Ok(doc) => doc,
        Err(status) => CommandReply::from_result::<()>(&Err(status)).into_document(),
    }
}

/// Refreshes routing metadata for `args.ns` and returns the shard set an
/// equality predicate on `args.key` targets — a thin, synchronous
/// exercise of the stale-version-free happy path; actual per-operation
/// `StaleConfig` retries happen inside `Router::route`, exercised by
/// `db-router`'s own tests rather than duplicated in this binary.
fn get_shards_for_key(router: &Router, value: &Value) -> Result<Document, Status> {
    let args: GetShardsArgs = match value {
        Value::String(json) => serde_json::from_str(json).map_err(|e| Status::new(ErrorCode::BadValue, format!("decoding arguments: {e}")))?,
        _ => return Err(Status::new(ErrorCode::BadValue, "getShardsForKey requires a JSON string argument")),
    };
    let meta = router.refresh(&args.ns)?;
    let shards = target_shards(&meta, &ShardKeyPredicate::Equality(ShardKeyTuple(args.key)));
    let doc = shards.into_iter().fold(Document::builder(), |builder, shard| builder.field("shard", Value::String(shard)));
    Ok(doc.field("ok", Value::Int32(1)).build())
}
