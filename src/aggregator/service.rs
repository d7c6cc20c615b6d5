use async_trait::async_trait;
use std::sync::Arc;

use super::registry::RegistrationTable;
use crate::api::{Request, Response, RpcService};

/// Exposes `register_v1`, `submit_decision_v1` and `deregister_v1`.
pub struct AggregatorService {
    table: Arc<RegistrationTable>,
}

impl AggregatorService {
    pub fn new(table: Arc<RegistrationTable>) -> Self {
        Self { table }
    }
}

#[async_trait]
impl RpcService for AggregatorService {
    fn name(&self) -> &'static str {
        "consensus-aggregator"
    }

    async fn handle(&self, request: Request) -> Response {
        match request {
            Request::Register { id } => Response::Registered {
                accepted: self.table.register(&id).await,
            },
            Request::SubmitDecision { decision, id } => {
                self.table.submit_decision(&id, decision).await;
                Response::Ack
            }
            Request::Deregister { id } => {
                self.table.deregister(&id).await;
                Response::Ack
            }
            other => Response::unsupported(&other),
        }
    }
}
