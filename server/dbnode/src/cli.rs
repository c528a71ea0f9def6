//! Data-node CLI surface, matching the documented flag set exactly —
//! operators' init scripts and existing deployment tooling depend on these
//! exact names.

use std::path::PathBuf;

#[derive(clap::Parser, Debug)]
#[command(name = "dbnode", about = "Sharded document store data node")]
pub struct DbNodeArgs {
    #[arg(long, default_value = "/data/db")]
    pub dbpath: PathBuf,

    #[arg(long, default_value_t = 27017)]
    pub port: u16,

    #[arg(long, default_value = "127.0.0.1")]
    pub bind_ip: String,

    #[arg(long)]
    pub repl_set: Option<String>,

    #[arg(long)]
    pub shardsvr: bool,

    #[arg(long)]
    pub configsvr: bool,

    #[arg(long, overrides_with = "nojournal")]
    pub journal: bool,

    #[arg(long, overrides_with = "journal")]
    pub nojournal: bool,

    #[arg(long)]
    pub repair: bool,

    #[arg(long)]
    pub upgrade: bool,

    #[arg(long, default_value_t = 1_000_000)]
    pub max_conns: u32,

    #[arg(long, default_value_t = 100)]
    pub slowms: u64,

    #[arg(long, default_value_t = 0)]
    pub profile: u8,

    #[arg(long, default_value_t = 1024)]
    pub oplog_size: u64,

    #[arg(long, default_value_t = 60)]
    pub syncdelay: u64,
}

impl DbNodeArgs {
    /// `--journal` is the default; `--nojournal` is the only way to turn
    /// it off — durability is opt-out, not opt-in.
    pub fn journal_enabled(&self) -> bool {
        !self.nojournal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn journal_defaults_to_enabled() {
        let args = DbNodeArgs::parse_from(["dbnode"]);
        assert!(args.journal_enabled());
    }

    #[test]
    fn nojournal_flag_disables_journaling() {
        let args = DbNodeArgs::parse_from(["dbnode", "--nojournal"]);
        assert!(!args.journal_enabled());
    }
}
