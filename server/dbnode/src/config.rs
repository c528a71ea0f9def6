//! Typed config assembled from CLI flags. A real deployment would layer a
//! config file under the CLI the same way; this data node only takes
//! flags for now, since there's no config file format defined yet.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use db_dispatch::ProfileLevel;

use crate::cli::DbNodeArgs;

#[derive(Debug, Clone)]
pub struct Config {
    pub dbpath: PathBuf,
    pub bind_addr: SocketAddr,
    pub repl_set: Option<String>,
    pub shardsvr: bool,
    pub configsvr: bool,
    pub journal_enabled: bool,
    pub repair: bool,
    pub upgrade: bool,
    pub max_conns: u32,
    pub slowms: Duration,
    pub profile: ProfileLevel,
    pub oplog_size_mb: u64,
    pub syncdelay: Duration,
}

impl Config {
    pub fn from_args(args: &DbNodeArgs) -> Result<Self> {
        let bind_addr: SocketAddr = format!("{}:{}", args.bind_ip, args.port)
            .parse()
            .with_context(|| format!("invalid --bind_ip/--port combination: {}:{}", args.bind_ip, args.port))?;
        let profile = match args.profile {
            0 => ProfileLevel::Off,
            1 => ProfileLevel::SlowOnly,
            2 => ProfileLevel::All,
            other => anyhow::bail!("--profile must be 0, 1, or 2 (got {other})"),
        };
        Ok(Config {
            dbpath: args.dbpath.clone(),
            bind_addr,
            repl_set: args.repl_set.clone(),
            shardsvr: args.shardsvr,
            configsvr: args.configsvr,
            journal_enabled: args.journal_enabled(),
            repair: args.repair,
            upgrade: args.upgrade,
            max_conns: args.max_conns,
            slowms: Duration::from_millis(args.slowms),
            profile,
            oplog_size_mb: args.oplog_size,
            syncdelay: Duration::from_secs(args.syncdelay),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn an_invalid_profile_level_is_rejected() {
        let args = DbNodeArgs::parse_from(["dbnode", "--profile", "9"]);
        assert!(Config::from_args(&args).is_err());
    }

    #[test]
    fn bind_ip_and_port_combine_into_one_socket_address() {
        let args = DbNodeArgs::parse_from(["dbnode", "--bind_ip", "0.0.0.0", "--port", "27018"]);
        let config = Config::from_args(&args).unwrap();
        assert_eq!(config.bind_addr.port(), 27018);
    }
}
