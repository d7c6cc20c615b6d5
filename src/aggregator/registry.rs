use chrono::Utc;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;

use super::consensus::median;
use crate::api::Decision;
use crate::core::Freshness;

/// How an identifier came to be (or not be) in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStatus {
    Unregistered,
    /// Explicit `register_v1`.
    Registered,
    /// Created by a decision from an unknown identifier. A later explicit
    /// registration for the same identifier is rejected like any duplicate.
    ImplicitlyRegistered,
}

/// Why no consensus value can be produced right now.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotReady {
    #[error("no agents registered")]
    Empty,
    #[error("no decision submitted by {0}")]
    Missing(String),
    #[error("stale decision from {0}")]
    Stale(String),
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    status: RegistrationStatus,
    decision: Option<Decision>,
}

/// Registered agents and their latest decisions.
///
/// Every operation takes the single table lock for the duration of one read
/// or write; nothing holds it across an await point outside this type.
pub struct RegistrationTable {
    entries: Mutex<HashMap<String, Entry>>,
    freshness: Freshness,
}

impl RegistrationTable {
    pub fn new(freshness: Freshness) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            freshness,
        }
    }

    /// `false` when `id` is already present, explicitly or implicitly.
    pub async fn register(&self, id: &str) -> bool {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(id) {
            tracing::error!("🚫 Double registration of {}: rejecting", id);
            return false;
        }

        entries.insert(
            id.to_string(),
            Entry {
                status: RegistrationStatus::Registered,
                decision: None,
            },
        );
        tracing::info!("✅ Registered {} ({} agents)", id, entries.len());
        true
    }

    /// Removes `id` if present. Returns whether anything was removed.
    pub async fn deregister(&self, id: &str) -> bool {
        let removed = self.entries.lock().await.remove(id).is_some();
        if removed {
            tracing::info!("👋 Deregistered {}", id);
        } else {
            tracing::debug!("Deregistration of unknown agent {} ignored", id);
        }
        removed
    }

    /// Stores `decision` as the latest for `id`, creating the entry if needed.
    /// Returns the status `id` had before the call.
    pub async fn submit_decision(&self, id: &str, decision: Decision) -> RegistrationStatus {
        let mut entries = self.entries.lock().await;
        let previous = match entries.get_mut(id) {
            Some(entry) => {
                entry.decision = Some(decision);
                entry.status
            }
            None => {
                tracing::info!("🆕 Implicit registration: {}", id);
                entries.insert(
                    id.to_string(),
                    Entry {
                        status: RegistrationStatus::ImplicitlyRegistered,
                        decision: Some(decision),
                    },
                );
                RegistrationStatus::Unregistered
            }
        };

        tracing::info!("📥 {} submitted {}", id, decision.value);
        previous
    }

    pub async fn status(&self, id: &str) -> RegistrationStatus {
        self.entries
            .lock()
            .await
            .get(id)
            .map(|entry| entry.status)
            .unwrap_or(RegistrationStatus::Unregistered)
    }

    pub async fn decision(&self, id: &str) -> Option<Decision> {
        self.entries.lock().await.get(id).and_then(|entry| entry.decision)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Median over every registered agent's decision, provided all of them
    /// are present and within the staleness window of the current time.
    pub async fn try_consensus(&self) -> Result<f64, NotReady> {
        let snapshot: Vec<(String, Option<Decision>)> = {
            let entries = self.entries.lock().await;
            entries
                .iter()
                .map(|(id, entry)| (id.clone(), entry.decision))
                .collect()
        };

        if snapshot.is_empty() {
            return Err(NotReady::Empty);
        }

        let now = Utc::now();
        let mut values = Vec::with_capacity(snapshot.len());
        for (id, decision) in snapshot {
            let decision = decision.ok_or_else(|| NotReady::Missing(id.clone()))?;
            if !self.freshness.is_fresh(now, decision.decided_at) {
                return Err(NotReady::Stale(id));
            }
            values.push(decision.value);
        }

        median(&values).ok_or(NotReady::Empty)
    }

    pub async fn compute_consensus(&self) -> Option<f64> {
        match self.try_consensus().await {
            Ok(value) => Some(value),
            Err(reason) => {
                tracing::debug!("Median: cannot compute, {}", reason);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    fn table() -> RegistrationTable {
        RegistrationTable::new(Freshness::new(Duration::from_secs(10)))
    }

    fn fresh(value: f64) -> Decision {
        Decision::new(value, Utc::now())
    }

    #[tokio::test]
    async fn test_register_is_exclusive() {
        let table = table();

        assert!(table.register("alpha").await);
        assert!(!table.register("alpha").await);
        assert_eq!(table.len().await, 1);
        assert_eq!(table.status("alpha").await, RegistrationStatus::Registered);
    }

    #[tokio::test]
    async fn test_register_deregister_sequences_keep_one_entry() {
        let table = table();

        let mut present = false;
        for round in 0..20 {
            let accepted = table.register("alpha").await;
            assert_eq!(accepted, !present);
            present = true;
            assert_eq!(table.len().await, 1);

            if round % 3 == 0 {
                table.deregister("alpha").await;
                present = false;
            }
        }
    }

    #[tokio::test]
    async fn test_deregister_unknown_is_noop() {
        let table = table();
        assert!(!table.deregister("ghost").await);
        assert!(table.register("ghost").await);
        assert!(table.deregister("ghost").await);
        assert_eq!(table.status("ghost").await, RegistrationStatus::Unregistered);
    }

    #[tokio::test]
    async fn test_implicit_registration_blocks_explicit_register() {
        let table = table();

        let previous = table.submit_decision("late", fresh(1.0)).await;
        assert_eq!(previous, RegistrationStatus::Unregistered);
        assert_eq!(
            table.status("late").await,
            RegistrationStatus::ImplicitlyRegistered
        );
        assert!(!table.register("late").await);

        // Submitting again keeps the implicit origin.
        let previous = table.submit_decision("late", fresh(2.0)).await;
        assert_eq!(previous, RegistrationStatus::ImplicitlyRegistered);
        assert_eq!(table.decision("late").await.map(|d| d.value), Some(2.0));
    }

    #[tokio::test]
    async fn test_consensus_not_ready_cases() {
        let table = table();
        assert_eq!(table.try_consensus().await, Err(NotReady::Empty));

        table.register("alpha").await;
        assert_eq!(
            table.try_consensus().await,
            Err(NotReady::Missing("alpha".into()))
        );

        let old = Decision::new(1.0, Utc::now() - ChronoDuration::seconds(30));
        table.submit_decision("alpha", old).await;
        assert_eq!(
            table.try_consensus().await,
            Err(NotReady::Stale("alpha".into()))
        );
        assert_eq!(table.compute_consensus().await, None);
    }

    #[tokio::test]
    async fn test_one_missing_agent_blocks_everyone() {
        let table = table();
        table.submit_decision("alpha", fresh(1.0)).await;
        table.submit_decision("beta", fresh(2.0)).await;
        assert_eq!(table.compute_consensus().await, Some(1.5));

        table.register("gamma").await;
        assert_eq!(table.compute_consensus().await, None);

        table.deregister("gamma").await;
        assert_eq!(table.compute_consensus().await, Some(1.5));
    }

    #[tokio::test]
    async fn test_consensus_is_exact_median() {
        let table = table();
        for (id, value) in [("a", 5.0), ("b", -1.0), ("c", 3.0)] {
            table.submit_decision(id, fresh(value)).await;
        }
        assert_eq!(table.compute_consensus().await, Some(3.0));

        table.submit_decision("d", fresh(4.0)).await;
        assert_eq!(table.compute_consensus().await, Some(3.5));
    }

    #[tokio::test]
    async fn test_future_decision_outside_window_is_stale() {
        let table = table();
        let ahead = Decision::new(1.0, Utc::now() + ChronoDuration::seconds(60));
        table.submit_decision("alpha", ahead).await;
        assert_eq!(
            table.try_consensus().await,
            Err(NotReady::Stale("alpha".into()))
        );
    }
}
