//! Config-catalog node CLI surface. A thinner variant of the data node's
//!: the config server has no oplog or replica set of its own in this
//! core (it is itself typically replicated by being a `dbnode` in its own
//! right upstream; here it is modeled as the authoritative catalog holder
//! routers and shards refresh against).

#[derive(clap::Parser, Debug)]
#[command(name = "configsvr", about = "Chunk catalog / config-metadata node")]
pub struct ConfigSvrArgs {
    #[arg(long, default_value_t = 27019)]
    pub port: u16,

    #[arg(long, default_value = "127.0.0.1")]
    pub bind_ip: String,
}
