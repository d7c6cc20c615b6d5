use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub registered_agents: usize,
}

/// Last consensus value published by the aggregation tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ConsensusSnapshot {
    pub value: f64,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Board {
    registered_agents: usize,
    last_consensus: Option<ConsensusSnapshot>,
}

const DEFAULT_MAX_CONSENSUS_AGE: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct HealthChecker {
    start_time: std::time::Instant,
    max_age: Duration,
    board: Arc<RwLock<Board>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self {
            start_time: std::time::Instant::now(),
            max_age: DEFAULT_MAX_CONSENSUS_AGE,
            board: Arc::new(RwLock::new(Board::default())),
        }
    }

    /// How old the last consensus may get before the status turns degraded.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub async fn get_status(&self) -> HealthStatus {
        let board = self.board.read().await;
        let recent = board.last_consensus.map_or(false, |snapshot| {
            (Utc::now() - snapshot.computed_at)
                .to_std()
                .map_or(true, |age| age <= self.max_age)
        });

        HealthStatus {
            status: if recent {
                "healthy".to_string()
            } else {
                "degraded".to_string()
            },
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            registered_agents: board.registered_agents,
        }
    }

    pub async fn last_consensus(&self) -> Option<ConsensusSnapshot> {
        self.board.read().await.last_consensus
    }

    pub async fn record_consensus(&self, value: f64, registered_agents: usize) {
        let mut board = self.board.write().await;
        board.registered_agents = registered_agents;
        board.last_consensus = Some(ConsensusSnapshot {
            value,
            computed_at: Utc::now(),
        });
    }

    pub async fn record_registered(&self, registered_agents: usize) {
        self.board.write().await.registered_agents = registered_agents;
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Serves `GET /health` and `GET /consensus` until the future is dropped.
pub async fn serve_status(health_checker: HealthChecker, port: u16) {
    use warp::Filter;

    let health_state = health_checker.clone();
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::any().map(move || health_state.clone()))
        .and_then(|checker: HealthChecker| async move {
            let status = checker.get_status().await;
            Ok::<_, warp::Rejection>(warp::reply::json(&status))
        });

    let consensus = warp::path("consensus")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::any().map(move || health_checker.clone()))
        .and_then(|checker: HealthChecker| async move {
            let last = checker.last_consensus().await;
            Ok::<_, warp::Rejection>(warp::reply::json(&last))
        });

    tracing::info!("✅ Status endpoint running on port {}", port);
    warp::serve(health.or(consensus)).run(([0, 0, 0, 0], port)).await;
}
