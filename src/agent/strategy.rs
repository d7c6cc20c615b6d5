use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::api::{Decision, Link};
use crate::core::{Freshness, PipelineError, RetryPolicy};

/// What happened to one round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoundOutcome {
    /// The decision reached the aggregator.
    Submitted(f64),
    /// Every point was collected but the aggregator could not be reached.
    Undelivered(f64),
    /// The source at `source_index` gave no fresh point; nothing was submitted.
    Abandoned { source_index: usize },
}

/// Combines one point per source into a decision.
pub fn combine(points: &[f64]) -> f64 {
    points.iter().sum()
}

/// Strategy agent: pulls points from its sources, combines them and pushes
/// the decision to one aggregator.
pub struct StrategyAgent {
    name: String,
    sources: Vec<Link>,
    aggregator: Link,
    retry: RetryPolicy,
    freshness: Freshness,
}

impl StrategyAgent {
    pub fn new(
        name: impl Into<String>,
        source_addrs: Vec<String>,
        aggregator_addr: String,
        call_timeout: Duration,
        retry: RetryPolicy,
        freshness: Freshness,
    ) -> Self {
        Self {
            name: name.into(),
            sources: source_addrs
                .into_iter()
                .map(|addr| Link::new(addr, call_timeout))
                .collect(),
            aggregator: Link::new(aggregator_addr, call_timeout),
            retry,
            freshness,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_aggregator_connected(&self) -> bool {
        self.aggregator.is_connected()
    }

    /// Startup sequence: connect to every source (failures are left for
    /// `collect_point` to retry), connect to the aggregator and register.
    /// Aggregator connection failure and registration rejection are fatal.
    pub async fn start(&mut self) -> Result<(), PipelineError> {
        info!("🔗 Connecting to {} signal source(s)", self.sources.len());
        for link in &mut self.sources {
            match link.connect().await {
                Ok(()) => info!("✅ Connected to source {}", link.addr()),
                Err(e) => warn!("⚠️  Source {} unavailable at startup: {}", link.addr(), e),
            }
        }

        info!("🔗 Connecting to aggregator {}", self.aggregator.addr());
        self.aggregator.connect().await?;
        self.register().await
    }

    pub async fn register(&mut self) -> Result<(), PipelineError> {
        if self.aggregator.register(&self.name).await? {
            info!("✅ Registered as {}", self.name);
            Ok(())
        } else {
            error!("🛑 Registration rejected by aggregator for {}", self.name);
            Err(PipelineError::RegistrationRejected(self.name.clone()))
        }
    }

    /// Best-effort deregistration on shutdown: one attempt, reconnecting
    /// first if the link is down.
    pub async fn deregister(&mut self) -> Result<(), PipelineError> {
        if !self.aggregator.is_connected() {
            self.aggregator.connect().await?;
        }

        match self.aggregator.deregister(&self.name).await {
            Ok(()) => {
                info!("👋 Deregistered {}", self.name);
                Ok(())
            }
            Err(e) => {
                error!("❌ Deregistration of {} failed: {}", self.name, e);
                Err(e)
            }
        }
    }

    /// Fetches a point from source `source_index` whose timestamp lies within
    /// the staleness window of `round_ts`. `None` once the retry budget is
    /// spent without one.
    pub async fn collect_point(&mut self, source_index: usize, round_ts: DateTime<Utc>) -> Option<f64> {
        let freshness = self.freshness;
        let retry = self.retry;
        let link = self.sources.get_mut(source_index)?;

        for attempt in retry.attempts() {
            if !link.is_connected() {
                match link.connect().await {
                    Ok(()) => info!("🔗 Reconnected to source {}", link.addr()),
                    Err(e) => error!("❌ Reconnecting to source {}: {}", link.addr(), e),
                }
            }

            if link.is_connected() {
                match link.pull_signal().await {
                    Ok(Some(signal)) if freshness.is_fresh(round_ts, signal.generated_at) => {
                        return Some(signal.value);
                    }
                    Ok(Some(signal)) => debug!(
                        "Point from {} generated at {} is not fresh for round {}",
                        link.addr(),
                        signal.generated_at,
                        round_ts
                    ),
                    Ok(None) => debug!("Source {} has no signal yet", link.addr()),
                    Err(e) if e.is_transport() => {
                        error!("❌ Lost connection to source {}: {}", link.addr(), e)
                    }
                    Err(e) => error!("❌ Source {} failed: {}", link.addr(), e),
                }
            }

            if attempt < retry.limit() {
                retry.pause().await;
            }
        }

        None
    }

    /// Pushes `decision` to the aggregator with bounded retries. Returns
    /// whether it was delivered; failure is never fatal.
    pub async fn submit_decision(&mut self, decision: Decision) -> bool {
        let retry = self.retry;

        for attempt in retry.attempts() {
            if !self.aggregator.is_connected() {
                info!("🔗 Attempting reconnection to aggregator");
                match self.aggregator.connect().await {
                    Ok(()) => info!("✅ Reconnected to aggregator"),
                    Err(e) => error!("❌ Reconnecting to aggregator: {}", e),
                }
            }

            if self.aggregator.is_connected() {
                match self.aggregator.submit_decision(decision, &self.name).await {
                    Ok(()) => {
                        info!("📤 Decision {} submitted", decision.value);
                        return true;
                    }
                    Err(e) => error!("❌ Submitting decision failed: {}", e),
                }
            }

            if attempt < retry.limit() {
                retry.pause().await;
            }
        }

        error!("🛑 Giving up on decision {} after {} attempts", decision.value, retry.limit());
        false
    }

    /// One round: a fresh point from every source in index order, then one
    /// submission. Any missing point abandons the whole round.
    pub async fn process_round(&mut self) -> RoundOutcome {
        let round_ts = Utc::now();
        let mut points = Vec::with_capacity(self.sources.len());

        for source_index in 0..self.sources.len() {
            match self.collect_point(source_index, round_ts).await {
                Some(point) => points.push(point),
                None => {
                    error!("❌ Failed to collect signal from source #{}", source_index);
                    return RoundOutcome::Abandoned { source_index };
                }
            }
        }
        info!("📊 Collected signals: {:?}", points);

        let value = combine(&points);
        info!("🧮 Decision: {}", value);

        if self.submit_decision(Decision::new(value, round_ts)).await {
            RoundOutcome::Submitted(value)
        } else {
            RoundOutcome::Undelivered(value)
        }
    }
}
