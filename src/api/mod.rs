pub mod client;
pub mod codec;
pub mod server;
pub mod types;

pub use client::{Link, LinkStatus};
pub use server::RpcService;
pub use types::{Decision, Request, Response, Signal};
