use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use signal_consensus::aggregator::{AggregatorService, ConsensusAggregator, RegistrationTable};
use signal_consensus::api::server;
use signal_consensus::core::config::DEFAULT_AGGREGATOR_PORT;
use signal_consensus::core::{health, logging, Config, HealthChecker, Ticker};

/// Consensus aggregator: collects agent decisions and logs their median.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Port to serve agent requests on
    #[arg(short, long, env = "AGGREGATOR_PORT", default_value_t = DEFAULT_AGGREGATOR_PORT)]
    port: u16,

    /// Optional HTTP port for `/health` and `/consensus`
    #[arg(long, env = "STATUS_PORT")]
    status_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_env()?;
    logging::init_logging(&config.monitoring.log_level);

    tracing::info!("🚀 Consensus aggregator v{} starting", env!("CARGO_PKG_VERSION"));

    let table = Arc::new(RegistrationTable::new(config.freshness()));
    // Two missed aggregation periods without a consensus mark the process degraded.
    let health_checker = HealthChecker::new().with_max_age(config.schedule().period() * 2);

    if let Some(status_port) = args.status_port {
        tokio::spawn(health::serve_status(health_checker.clone(), status_port));
    }

    let aggregator = ConsensusAggregator::new(table.clone(), config.retry_policy(), health_checker);
    let mut ticker = Ticker::new("aggregation", config.schedule());
    tokio::spawn(async move {
        loop {
            ticker.tick().await;
            aggregator.aggregation_tick().await;
        }
    });

    let listener = server::bind(&format!("0.0.0.0:{}", args.port))
        .await
        .with_context(|| format!("binding port {}", args.port))?;
    server::serve(listener, Arc::new(AggregatorService::new(table))).await;

    tracing::info!("Shutting down");
    Ok(())
}
