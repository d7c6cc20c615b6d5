use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;

use signal_consensus::api::server;
use signal_consensus::core::{logging, Config, Ticker};
use signal_consensus::source::{SignalCell, SourceService, UniformSampler};

/// Signal source: samples one value per tick and serves the latest one.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Port to serve `pull_signal_v1` on
    #[arg(short, long, env = "SOURCE_PORT")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_env()?;
    logging::init_logging(&config.monitoring.log_level);

    tracing::info!("🚀 Signal source v{} starting", env!("CARGO_PKG_VERSION"));

    let cell = Arc::new(SignalCell::new(Box::new(UniformSampler)));

    let ticking = cell.clone();
    let mut ticker = Ticker::new("signal", config.schedule());
    tokio::spawn(async move {
        loop {
            ticker.tick().await;
            ticking.tick().await;
        }
    });

    let listener = server::bind(&format!("0.0.0.0:{}", args.port))
        .await
        .with_context(|| format!("binding port {}", args.port))?;
    server::serve(listener, Arc::new(SourceService::new(cell))).await;

    tracing::info!("Shutting down");
    Ok(())
}
