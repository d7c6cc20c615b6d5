pub mod consensus;
pub mod engine;
pub mod registry;
pub mod service;

pub use consensus::median;
pub use engine::ConsensusAggregator;
pub use registry::{NotReady, RegistrationStatus, RegistrationTable};
pub use service::AggregatorService;
