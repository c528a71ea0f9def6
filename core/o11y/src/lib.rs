//! Process-wide logging and metrics bring-up, shared by all three node
//! roles. Kept deliberately thin: a `tracing-subscriber` registry driven by
//! `RUST_LOG`/an explicit filter string, and a `prometheus` registry that
//! `db-common`'s counters register into lazily on first use.

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` syntax, e.g. `"info,db_replset=debug"`.
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig { filter: "info".to_string(), json: false }
    }
}

/// Installs the global `tracing` subscriber. Idempotent: a second call is a
/// no-op rather than a panic, so tests that spin up multiple in-process
/// "nodes" can each call it safely.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.filter.clone()));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.json { subscriber.json().try_init() } else { subscriber.try_init() };
    if let Err(e) = result {
        tracing::trace!("tracing subscriber already installed: {e}");
    }
}

/// Renders the process-wide `prometheus` registry as the text exposition
/// format, for a node's `/metrics` endpoint.
pub fn gather_metrics_text() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).expect("encoding the default registry cannot fail");
    String::from_utf8(buffer).expect("prometheus text encoding is always valid utf-8")
}
