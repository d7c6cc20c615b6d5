use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time;

/// Bounded retry budget with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    limit: u32,
    interval: Duration,
}

impl RetryPolicy {
    pub fn new(limit: u32, interval: Duration) -> Self {
        Self { limit, interval }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Attempt numbers `1..=limit`.
    pub fn attempts(&self) -> impl Iterator<Item = u32> {
        1..=self.limit
    }

    pub async fn pause(&self) {
        time::sleep(self.interval).await;
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1))
    }
}

/// Staleness window check shared by the agent (points) and the aggregator (decisions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    window: Duration,
}

impl Freshness {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// `|reference - timestamp| <= window`. Timestamps from the future count
    /// against the window just like old ones.
    pub fn is_fresh(&self, reference: DateTime<Utc>, timestamp: DateTime<Utc>) -> bool {
        let skew = (reference - timestamp).abs();
        match skew.to_std() {
            Ok(skew) => skew <= self.window,
            Err(_) => false,
        }
    }

    pub fn is_fresh_now(&self, timestamp: DateTime<Utc>) -> bool {
        self.is_fresh(Utc::now(), timestamp)
    }
}
