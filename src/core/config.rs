use anyhow::Result;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use super::retry::{Freshness, RetryPolicy};

/// Well-known port the aggregator listens on unless told otherwise.
pub const DEFAULT_AGGREGATOR_PORT: u16 = 1010;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub schedule: ScheduleConfig,
    pub monitoring: MonitoringConfig,
}

/// Constants shared by every role. All processes of one deployment must agree on them.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub host: String,
    pub staleness_window_secs: f64,
    pub retry_limit: u32,
    pub retry_interval_ms: u64,
    pub call_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    pub test_mode: bool,
    pub test_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Fire every `Duration`, measured from the end of the previous tick.
    EveryInterval(Duration),
    /// Fire on second `:00` of every wall-clock minute.
    MinuteAligned,
}

impl Schedule {
    /// Nominal time between two ticks.
    pub fn period(&self) -> Duration {
        match self {
            Schedule::EveryInterval(interval) => *interval,
            Schedule::MinuteAligned => Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            pipeline: PipelineConfig {
                host: env::var("PIPELINE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                staleness_window_secs: env_or("STALENESS_WINDOW_SECS", 10.0),
                retry_limit: env_or("RETRY_LIMIT", 5),
                retry_interval_ms: env_or("RETRY_INTERVAL_MS", 1000),
                call_timeout_secs: env_or("CALL_TIMEOUT_SECS", 10),
            },
            schedule: ScheduleConfig {
                test_mode: env_or("TEST_MODE", false),
                test_interval_secs: env_or("TEST_INTERVAL_SECS", 15),
            },
            monitoring: MonitoringConfig {
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
        })
    }

    pub fn schedule(&self) -> Schedule {
        if self.schedule.test_mode {
            Schedule::EveryInterval(Duration::from_secs(self.schedule.test_interval_secs.max(1)))
        } else {
            Schedule::MinuteAligned
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.pipeline.retry_limit,
            Duration::from_millis(self.pipeline.retry_interval_ms),
        )
    }

    pub fn freshness(&self) -> Freshness {
        Freshness::new(Duration::from_secs_f64(
            self.pipeline.staleness_window_secs.max(0.0),
        ))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.call_timeout_secs)
    }

    pub fn peer_addr(&self, port: u16) -> String {
        format!("{}:{}", self.pipeline.host, port)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
