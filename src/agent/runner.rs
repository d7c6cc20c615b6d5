use std::future::Future;
use tracing::{info, warn};

use super::strategy::{RoundOutcome, StrategyAgent};
use crate::core::Ticker;

/// Runs rounds on `ticker` until `shutdown` resolves, then deregisters.
///
/// A round in progress when `shutdown` fires is dropped where it stands; the
/// links it was using fall back to `Disconnected`.
pub async fn run_until<F>(agent: &mut StrategyAgent, mut ticker: Ticker, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    info!("🚀 Starting strategy {}", agent.name());

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            outcome = async {
                ticker.tick().await;
                agent.process_round().await
            } => match outcome {
                RoundOutcome::Submitted(_) => {}
                RoundOutcome::Undelivered(value) => {
                    warn!("⚠️  Decision {} dropped this round", value)
                }
                RoundOutcome::Abandoned { source_index } => {
                    warn!("⚠️  Round abandoned: no fresh point from source #{}", source_index)
                }
            },
        }
    }

    info!("🛑 Received shutdown signal");
    if let Err(e) = agent.deregister().await {
        warn!("⚠️  Exiting without deregistration: {}", e);
    }
}
