use anyhow::Result;
use clap::Parser;

use signal_consensus::agent::{self, StrategyAgent};
use signal_consensus::core::config::DEFAULT_AGGREGATOR_PORT;
use signal_consensus::core::{logging, Config, Ticker};

/// Strategy agent: combines fresh signals into a decision every tick.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Aggregator port
    #[arg(short = 't', long, env = "AGGREGATOR_PORT", default_value_t = DEFAULT_AGGREGATOR_PORT)]
    aggregator_port: u16,

    /// Signal source ports, in collection order (comma-separated)
    #[arg(short = 's', long, env = "SOURCE_PORTS", value_delimiter = ',', required = true)]
    source_ports: Vec<u16>,

    /// Identifier to register under; a random one is generated when omitted
    #[arg(short, long, env = "AGENT_NAME")]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_env()?;
    logging::init_logging(&config.monitoring.log_level);

    let name = args
        .name
        .unwrap_or_else(|| format!("agent-{}", uuid::Uuid::new_v4()));
    tracing::info!("🚀 Strategy agent {} v{} starting", name, env!("CARGO_PKG_VERSION"));

    let mut strategy = StrategyAgent::new(
        name,
        args.source_ports.iter().map(|&port| config.peer_addr(port)).collect(),
        config.peer_addr(args.aggregator_port),
        config.call_timeout(),
        config.retry_policy(),
        config.freshness(),
    );

    // Registration rejection is not retried.
    if let Err(e) = strategy.start().await {
        tracing::error!("🛑 Startup failed: {}", e);
        std::process::exit(1);
    }

    let ticker = Ticker::new("strategy", config.schedule());
    agent::run_until(&mut strategy, ticker, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;

    std::process::exit(0);
}
