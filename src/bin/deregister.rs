use anyhow::Result;
use clap::Parser;

use signal_consensus::api::{Link, Request, Response};
use signal_consensus::core::config::DEFAULT_AGGREGATOR_PORT;
use signal_consensus::core::{logging, Config};

/// Removes an agent's registration from the aggregator.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Identifier to deregister
    #[arg(short, long)]
    name: String,

    /// Aggregator port
    #[arg(long, env = "AGGREGATOR_PORT", default_value_t = DEFAULT_AGGREGATOR_PORT)]
    aggregator_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_env()?;
    logging::init_logging(&config.monitoring.log_level);

    let mut link = Link::new(config.peer_addr(args.aggregator_port), config.call_timeout());
    let request = Request::Deregister {
        id: args.name.clone(),
    };

    match link.call_or_reconnect(&request).await {
        Ok(Response::Ack) => tracing::info!("👋 Deregistered {}", args.name),
        Ok(other) => tracing::error!("❌ Unexpected response: {:?}", other),
        Err(e) => tracing::error!("❌ Deregistration of {} failed: {}", args.name, e),
    }
    Ok(())
}
