//! Fault-tolerant signal -> strategy -> consensus pipeline.
//!
//! Sources publish one timestamped value per tick, strategy agents combine
//! fresh points into decisions, and the aggregator publishes the median of
//! all registered agents' decisions once every one of them is fresh.

pub mod agent;
pub mod aggregator;
pub mod api;
pub mod core;
pub mod source;
