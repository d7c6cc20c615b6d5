use std::sync::Arc;

use super::registry::RegistrationTable;
use crate::core::{HealthChecker, RetryPolicy};

/// Periodic consensus computation over the registration table.
pub struct ConsensusAggregator {
    table: Arc<RegistrationTable>,
    retry: RetryPolicy,
    health: HealthChecker,
}

impl ConsensusAggregator {
    pub fn new(table: Arc<RegistrationTable>, retry: RetryPolicy, health: HealthChecker) -> Self {
        Self {
            table,
            retry,
            health,
        }
    }

    pub fn table(&self) -> &Arc<RegistrationTable> {
        &self.table
    }

    /// One aggregation tick: compute, and while not ready retry with a fixed
    /// pause, re-reading the table every time. The table lock is never held
    /// while sleeping.
    pub async fn aggregation_tick(&self) -> Option<f64> {
        let mut consensus = self.table.compute_consensus().await;

        for attempt in self.retry.attempts() {
            if consensus.is_some() {
                break;
            }
            self.retry.pause().await;
            tracing::info!(
                "🔁 Median: retrying to compute (attempt {}/{})",
                attempt,
                self.retry.limit()
            );
            consensus = self.table.compute_consensus().await;
        }

        let registered = self.table.len().await;
        match consensus {
            Some(value) => {
                tracing::info!("🎯 Median: {} over {} agents", value, registered);
                self.health.record_consensus(value, registered).await;
            }
            None => {
                tracing::warn!("⏸️  Median: not available this tick ({} agents)", registered);
                self.health.record_registered(registered).await;
            }
        }
        consensus
    }
}
