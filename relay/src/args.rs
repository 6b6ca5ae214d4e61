use std::path::PathBuf;

use clap::Parser;

/// Relay LLM provider gateway
#[derive(Debug, Parser)]
#[command(name = "relay", about = "Routing gateway over multiple LLM providers")]
pub struct Args {
    /// Path to configuration file; defaults apply when omitted
    #[arg(short, long, env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long, env = "RELAY_LISTEN")]
    pub listen: Option<std::net::SocketAddr>,
}
