pub mod runner;
pub mod strategy;

pub use runner::run_until;
pub use strategy::{combine, RoundOutcome, StrategyAgent};
