pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod retry;
pub mod scheduler;

pub use config::{Config, Schedule};
pub use error::PipelineError;
pub use health::HealthChecker;
pub use retry::{Freshness, RetryPolicy};
pub use scheduler::Ticker;
