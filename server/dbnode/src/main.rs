//! The data-node binary: parses the CLI surface, bootstraps the
//! `ServiceContext`, and serves connections over the wire protocol's
//! command framing. Connection handling itself stays deliberately thin —
//! per-command execution against storage/catalog lives in the component
//! crates this binary wires together, not duplicated here.

mod cli;
mod config;
mod exit_code;
mod service_context;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use db_dispatch::{Action, OperationKind, Privileges};
use db_document::{Document, Value};
use db_o11y::LogConfig;
use db_wire::{CommandMessage, CommandReply, IsMasterResponse, MessageHeader, OpCode, HEADER_LEN};

use cli::DbNodeArgs;
use config::Config;
use exit_code::ExitCode;
use service_context::ServiceContext;

fn main() {
    let args = DbNodeArgs::parse();
    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("bad options: {e:#}");
            std::process::exit(ExitCode::BadOptions.code());
        }
    };

    db_o11y::init_logging(&LogConfig::default());

    let ctx = match ServiceContext::bootstrap(&config) {
        Ok(ctx) => Arc::new(ctx),
        Err(e) => {
            tracing::error!("failed to bootstrap service context: {e:#}");
            std::process::exit(ExitCode::Abrupt.code());
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start tokio runtime: {e:#}");
            std::process::exit(ExitCode::Uncaught.code());
        }
    };

    let code = runtime.block_on(run(ctx, config));
    std::process::exit(code.code());
}

async fn run(ctx: Arc<ServiceContext>, config: Config) -> ExitCode {
    let listener = match TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("failed to bind {}: {e:#}", config.bind_addr);
            return ExitCode::Abrupt;
        }
    };
    tracing::info!(addr = %config.bind_addr, dbpath = %config.dbpath.display(), "dbnode listening");

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let sweeper_ctx = ctx.clone();
    let sweeper_interval = config.syncdelay;
    let mut sweeper_shutdown = shutdown_rx.clone();
    let sweeper = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(sweeper_interval) => {
                    let reaped = sweeper_ctx.reap_idle_cursors();
                    if reaped > 0 {
                        tracing::debug!(reaped, "cursor sweeper reaped idle cursors");
                    }
                }
                _ = sweeper_shutdown.changed() => break,
            }
        }
    });

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, peer)) => {
                        let conn_ctx = ctx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(conn_ctx, socket).await {
                                tracing::debug!(%peer, error = %e, "connection closed");
                            }
                        });
                    }
                    Err(e) => tracing::warn!("accept failed: {e:#}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = sweeper.await;
    shutdown_rx.borrow_and_update();

    match Arc::try_unwrap(ctx) {
        Ok(ctx) => match ctx.shutdown() {
            Ok(()) => ExitCode::Clean,
            Err(e) => {
                tracing::error!("error during shutdown: {e:#}");
                ExitCode::Abrupt
            }
        },
        Err(_) => {
            tracing::warn!("service context still has outstanding references at shutdown");
            ExitCode::Clean
        }
    }
}

/// Reads one framed command message, dispatches it, and writes back a
/// framed reply, looping until the peer disconnects.
async fn serve_connection(ctx: Arc<ServiceContext>, mut socket: TcpStream) -> Result<()> {
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

        let reply_doc = handle_message(&ctx, header.opcode, &body);
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

fn handle_message(ctx: &ServiceContext, opcode: OpCode, body: &[u8]) -> Document {
    match opcode {
        OpCode::Command | OpCode::Msg => handle_command(ctx, body),
        other => {
            let status = db_common::Status::new(db_common::ErrorCode::BadValue, format!("opcode {other:?} not handled on this connection type"));
            CommandReply::from_result::<()>(&Err(status)).into_document()
        }
    }
}

fn handle_command(ctx: &ServiceContext, body: &[u8]) -> Document {
    let msg = match CommandMessage::decode(body) {
        Ok(msg) => msg,
        Err(status) => return CommandReply::from_result::<()>(&Err(status)).into_document(),
    };

    let command_name = msg.body.fields().next().map(|(name, _)| name.to_string());
    let result: Result<Document, db_common::Status> = match command_name.as_deref() {
        Some("isMaster") | Some("ismaster") => Ok(IsMasterResponse {
            is_master: true,
            secondary: false,
            set_name: String::new(),
            primary: None,
        }
        .into_document()),
        Some(other) => {
            let mut privileges = Privileges::default();
            privileges.grant(Action::RunCommand);
            ctx.dispatcher
                .dispatch(OperationKind::Command, "admin", other, &privileges, || Ok(()))
                .map(|_| Document::builder().field("ok", Value::Int32(1)).build())
        }
        None => Err(db_common::Status::new(db_common::ErrorCode::BadValue, "command document has no command field")),
    };

    match result {
        Ok(doc) => doc,
        Err(status) => CommandReply::from_result::<()>(&Err(status)).into_document(),
    }
}
