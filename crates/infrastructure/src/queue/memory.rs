//! In-memory message queue for embedded deployments and tests.
//!
//! Messages consumed but not yet acked are parked in a pending map; a nack
//! with `requeue` puts them back at the front of their queue so they are
//! redelivered before newer work.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use simsvc_domain::{MessageQueue, ServiceError, ServiceResult, WorkMessage};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct QueueState {
    queues: HashMap<String, VecDeque<WorkMessage>>,
    // message id -> (queue name, message) awaiting ack/nack
    pending: HashMap<String, (String, WorkMessage)>,
}

#[derive(Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn publish_message(&self, queue: &str, message: &WorkMessage) -> ServiceResult<()> {
        let mut state = self.state.lock().await;
        state
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(message.clone());
        debug!(queue, message_id = %message.id, "message published");
        Ok(())
    }

    async fn consume_messages(&self, queue: &str) -> ServiceResult<Vec<WorkMessage>> {
        let mut state = self.state.lock().await;
        let drained: Vec<WorkMessage> = match state.queues.get_mut(queue) {
            Some(q) => q.drain(..).collect(),
            None => Vec::new(),
        };
        for message in &drained {
            state
                .pending
                .insert(message.id.clone(), (queue.to_string(), message.clone()));
        }
        Ok(drained)
    }

    async fn ack_message(&self, message_id: &str) -> ServiceResult<()> {
        let mut state = self.state.lock().await;
        if state.pending.remove(message_id).is_none() {
            return Err(ServiceError::queue(format!(
                "ack for unknown message {message_id}"
            )));
        }
        debug!(message_id, "message acked");
        Ok(())
    }

    async fn nack_message(&self, message_id: &str, requeue: bool) -> ServiceResult<()> {
        let mut state = self.state.lock().await;
        let Some((queue, message)) = state.pending.remove(message_id) else {
            return Err(ServiceError::queue(format!(
                "nack for unknown message {message_id}"
            )));
        };
        if requeue {
            state.queues.entry(queue).or_default().push_front(message);
        }
        debug!(message_id, requeue, "message nacked");
        Ok(())
    }

    async fn create_queue(&self, queue: &str, _durable: bool) -> ServiceResult<()> {
        let mut state = self.state.lock().await;
        state.queues.entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn queue_depth(&self, queue: &str) -> ServiceResult<u32> {
        let state = self.state.lock().await;
        Ok(state.queues.get(queue).map_or(0, |q| q.len() as u32))
    }

    async fn purge_queue(&self, queue: &str) -> ServiceResult<()> {
        let mut state = self.state.lock().await;
        if let Some(q) = state.queues.get_mut(queue) {
            q.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simsvc_domain::{WorkItem, SIMULATION_QUEUE};
    use uuid::Uuid;

    fn message() -> WorkMessage {
        WorkMessage::new(WorkItem::RunSimulation {
            job_id: Uuid::new_v4(),
        })
    }

    #[tokio::test]
    async fn publish_consume_ack() {
        let queue = InMemoryQueue::new();
        let msg = message();
        queue.publish_message(SIMULATION_QUEUE, &msg).await.unwrap();
        assert_eq!(queue.queue_depth(SIMULATION_QUEUE).await.unwrap(), 1);

        let drained = queue.consume_messages(SIMULATION_QUEUE).await.unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].id, msg.id);
        assert_eq!(queue.queue_depth(SIMULATION_QUEUE).await.unwrap(), 0);

        queue.ack_message(&msg.id).await.unwrap();
        assert!(queue
            .consume_messages(SIMULATION_QUEUE)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn consume_on_idle_queue_is_empty() {
        let queue = InMemoryQueue::new();
        assert!(queue.consume_messages("missing").await.unwrap().is_empty());
        assert_eq!(queue.queue_depth("missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn nack_requeues_at_front() {
        let queue = InMemoryQueue::new();
        let first = message();
        let second = message();
        queue
            .publish_message(SIMULATION_QUEUE, &first)
            .await
            .unwrap();

        let drained = queue.consume_messages(SIMULATION_QUEUE).await.unwrap();
        queue.publish_message(SIMULATION_QUEUE, &second).await.unwrap();
        queue.nack_message(&drained[0].id, true).await.unwrap();

        let redelivered = queue.consume_messages(SIMULATION_QUEUE).await.unwrap();
        assert_eq!(
            redelivered.iter().map(|m| m.id.clone()).collect::<Vec<_>>(),
            vec![first.id.clone(), second.id.clone()]
        );
    }

    #[tokio::test]
    async fn nack_without_requeue_drops() {
        let queue = InMemoryQueue::new();
        let msg = message();
        queue.publish_message(SIMULATION_QUEUE, &msg).await.unwrap();
        queue.consume_messages(SIMULATION_QUEUE).await.unwrap();
        queue.nack_message(&msg.id, false).await.unwrap();
        assert_eq!(queue.queue_depth(SIMULATION_QUEUE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn settling_unknown_message_fails() {
        let queue = InMemoryQueue::new();
        assert!(queue.ack_message("missing").await.is_err());
        assert!(queue.nack_message("missing", true).await.is_err());
    }

    #[tokio::test]
    async fn purge_clears_pending_work() {
        let queue = InMemoryQueue::new();
        queue
            .publish_message(SIMULATION_QUEUE, &message())
            .await
            .unwrap();
        queue
            .publish_message(SIMULATION_QUEUE, &message())
            .await
            .unwrap();
        queue.purge_queue(SIMULATION_QUEUE).await.unwrap();
        assert_eq!(queue.queue_depth(SIMULATION_QUEUE).await.unwrap(), 0);
    }
}
