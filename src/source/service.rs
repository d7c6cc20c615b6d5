use async_trait::async_trait;
use std::sync::Arc;

use super::signal::SignalCell;
use crate::api::{Request, Response, RpcService};

/// Exposes `pull_signal_v1`. No caller identity is checked.
pub struct SourceService {
    cell: Arc<SignalCell>,
}

impl SourceService {
    pub fn new(cell: Arc<SignalCell>) -> Self {
        Self { cell }
    }
}

#[async_trait]
impl RpcService for SourceService {
    fn name(&self) -> &'static str {
        "signal-source"
    }

    async fn handle(&self, request: Request) -> Response {
        match request {
            Request::PullSignal => Response::Signal {
                signal: self.cell.pull().await,
            },
            other => Response::unsupported(&other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::signal::UniformSampler;

    #[tokio::test]
    async fn test_pull_and_unsupported() {
        let cell = Arc::new(SignalCell::new(Box::new(UniformSampler)));
        let service = SourceService::new(cell.clone());

        assert_eq!(
            service.handle(Request::PullSignal).await,
            Response::Signal { signal: None }
        );

        let generated = cell.tick().await;
        assert_eq!(
            service.handle(Request::PullSignal).await,
            Response::Signal {
                signal: Some(generated)
            }
        );

        let response = service
            .handle(Request::Register { id: "alpha".into() })
            .await;
        assert!(matches!(response, Response::Error { .. }));
    }
}
