use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceResult;

/// Queue carrying `RunSimulation` work units.
pub const SIMULATION_QUEUE: &str = "simulations";
/// Queue carrying `GenerateReport` work units.
pub const REPORT_QUEUE: &str = "reports";

/// The two asynchronous units of work. Payloads are just entity IDs; the
/// runner re-reads everything else from the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum WorkItem {
    RunSimulation { job_id: Uuid },
    GenerateReport { report_id: Uuid },
}

impl WorkItem {
    pub fn queue(&self) -> &'static str {
        match self {
            WorkItem::RunSimulation { .. } => SIMULATION_QUEUE,
            WorkItem::GenerateReport { .. } => REPORT_QUEUE,
        }
    }
}

/// Envelope published to the queue. `retry_count` counts delivery attempts
/// already made; the runner republishes with an incremented count until the
/// retry budget is exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkMessage {
    pub id: String,
    pub item: WorkItem,
    pub retry_count: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl WorkMessage {
    pub fn new(item: WorkItem) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            item,
            retry_count: 0,
            enqueued_at: Utc::now(),
        }
    }

    pub fn next_attempt(&self) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            item: self.item.clone(),
            retry_count: self.retry_count + 1,
            enqueued_at: Utc::now(),
        }
    }

    pub fn is_retry_exhausted(&self, max_attempts: u32) -> bool {
        // retry_count is attempts already made beyond the first
        self.retry_count + 1 >= max_attempts
    }

    pub fn serialize_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn deserialize_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Fire-and-forget, at-least-once message transport. Producers never block
/// waiting on consumers.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn publish_message(&self, queue: &str, message: &WorkMessage) -> ServiceResult<()>;
    /// Drains currently available messages; returns an empty vec when the
    /// queue is idle.
    async fn consume_messages(&self, queue: &str) -> ServiceResult<Vec<WorkMessage>>;
    async fn ack_message(&self, message_id: &str) -> ServiceResult<()>;
    async fn nack_message(&self, message_id: &str, requeue: bool) -> ServiceResult<()>;
    async fn create_queue(&self, queue: &str, durable: bool) -> ServiceResult<()>;
    async fn queue_depth(&self, queue: &str) -> ServiceResult<u32>;
    async fn purge_queue(&self, queue: &str) -> ServiceResult<()>;
}
