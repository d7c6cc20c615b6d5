pub mod service;
pub mod signal;

pub use service::SourceService;
pub use signal::{SignalCell, SignalSampler, UniformSampler};
