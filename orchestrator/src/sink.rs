// Decision Sink
// Optional publication hook for the consuming layer; the engine itself
// never persists anything

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::decision::SystemDecision;

/// Receives every terminal decision. Implementations belong to the
/// consuming layer (database writers, dashboards, notifiers).
#[async_trait]
pub trait DecisionSink: Send + Sync {
    async fn publish(&self, decision: &SystemDecision) -> Result<()>;
}

/// In-memory sink for tests and development
pub struct InMemorySink {
    decisions: RwLock<Vec<SystemDecision>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self {
            decisions: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.decisions.read().await.len()
    }

    pub async fn get(&self, decision_id: Uuid) -> Option<SystemDecision> {
        self.decisions
            .read()
            .await
            .iter()
            .find(|d| d.id == decision_id)
            .cloned()
    }

    pub async fn latest(&self) -> Option<SystemDecision> {
        self.decisions.read().await.last().cloned()
    }
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionSink for InMemorySink {
    async fn publish(&self, decision: &SystemDecision) -> Result<()> {
        self.decisions.write().await.push(decision.clone());
        Ok(())
    }
}

/// Lets callers keep a handle to the sink they hand the orchestrator.
#[async_trait]
impl<T: DecisionSink + ?Sized> DecisionSink for std::sync::Arc<T> {
    async fn publish(&self, decision: &SystemDecision) -> Result<()> {
        (**self).publish(decision).await
    }
}
