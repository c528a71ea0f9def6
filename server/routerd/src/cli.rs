//! Router (`mongos`-analog) CLI surface.

#[derive(clap::Parser, Debug)]
#[command(name = "routerd", about = "Stateless query router over the chunk catalog")]
pub struct RouterdArgs {
    #[arg(long, default_value_t = 27017)]
    pub port: u16,

    #[arg(long, default_value = "127.0.0.1")]
    pub bind_ip: String,

    /// Address of the config-catalog node this router refreshes metadata from.
    #[arg(long)]
    pub configdb: String,
}
