//! RabbitMQ message queue backed by lapin.
//!
//! Deliveries are fetched with `basic_get` and stay unacknowledged until the
//! caller settles them through `ack_message`/`nack_message`; the broker
//! requeues anything still pending when the channel is lost, so a crashed
//! worker never swallows a work unit.

use std::collections::HashMap;

use async_trait::async_trait;
use lapin::{
    options::{
        BasicAckOptions, BasicGetOptions, BasicNackOptions, BasicPublishOptions,
        BasicRejectOptions, QueueDeclareOptions, QueuePurgeOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use simsvc_domain::{MessageQueue, ServiceError, ServiceResult, WorkMessage};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct RabbitMqQueue {
    connection: Connection,
    channel: Mutex<Channel>,
    // message id -> delivery tag of the unsettled delivery
    pending: Mutex<HashMap<String, u64>>,
}

impl RabbitMqQueue {
    pub async fn connect(url: &str) -> ServiceResult<Self> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| ServiceError::queue(format!("failed to connect to RabbitMQ: {e}")))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| ServiceError::queue(format!("failed to open channel: {e}")))?;

        info!(url, "connected to RabbitMQ");
        Ok(Self {
            connection,
            channel: Mutex::new(channel),
            pending: Mutex::new(HashMap::new()),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }

    pub async fn close(&self) -> ServiceResult<()> {
        self.connection
            .close(200, "shutting down")
            .await
            .map_err(|e| ServiceError::queue(format!("failed to close connection: {e}")))?;
        info!("RabbitMQ connection closed");
        Ok(())
    }

    async fn declare_queue(&self, channel: &Channel, queue: &str, durable: bool) -> ServiceResult<()> {
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| ServiceError::queue(format!("failed to declare queue {queue}: {e}")))?;
        debug!(queue, durable, "queue declared");
        Ok(())
    }
}

fn is_not_found(err: &lapin::Error) -> bool {
    let text = err.to_string();
    text.contains("NOT_FOUND") || text.contains("404")
}

#[async_trait]
impl MessageQueue for RabbitMqQueue {
    async fn publish_message(&self, queue: &str, message: &WorkMessage) -> ServiceResult<()> {
        let channel = self.channel.lock().await;
        let payload = message.serialize_bytes()?;

        let confirm = channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &payload,
                // delivery mode 2 = persistent
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|e| ServiceError::queue(format!("failed to publish to {queue}: {e}")))?;
        confirm
            .await
            .map_err(|e| ServiceError::queue(format!("publish confirmation failed: {e}")))?;

        debug!(queue, message_id = %message.id, "message published");
        Ok(())
    }

    async fn consume_messages(&self, queue: &str) -> ServiceResult<Vec<WorkMessage>> {
        let channel = self.channel.lock().await;
        let mut messages = Vec::new();

        loop {
            match channel.basic_get(queue, BasicGetOptions::default()).await {
                Ok(Some(delivery)) => {
                    let message = match WorkMessage::deserialize_bytes(&delivery.data) {
                        Ok(message) => message,
                        Err(e) => {
                            // undecodable payload: drop it rather than poison the queue
                            warn!(queue, error = %e, "rejecting undecodable delivery");
                            delivery
                                .reject(BasicRejectOptions { requeue: false })
                                .await
                                .map_err(|e| {
                                    ServiceError::queue(format!("failed to reject delivery: {e}"))
                                })?;
                            continue;
                        }
                    };
                    self.pending
                        .lock()
                        .await
                        .insert(message.id.clone(), delivery.delivery_tag);
                    messages.push(message);
                }
                Ok(None) => break,
                Err(e) if is_not_found(&e) => {
                    debug!(queue, "queue does not exist, returning no messages");
                    break;
                }
                Err(e) => {
                    return Err(ServiceError::queue(format!(
                        "failed to fetch from {queue}: {e}"
                    )));
                }
            }
        }

        Ok(messages)
    }

    async fn ack_message(&self, message_id: &str) -> ServiceResult<()> {
        let tag = self
            .pending
            .lock()
            .await
            .remove(message_id)
            .ok_or_else(|| ServiceError::queue(format!("unknown message id: {message_id}")))?;

        let channel = self.channel.lock().await;
        channel
            .basic_ack(tag, BasicAckOptions::default())
            .await
            .map_err(|e| ServiceError::queue(format!("failed to ack {message_id}: {e}")))?;
        debug!(message_id, "message acked");
        Ok(())
    }

    async fn nack_message(&self, message_id: &str, requeue: bool) -> ServiceResult<()> {
        let tag = self
            .pending
            .lock()
            .await
            .remove(message_id)
            .ok_or_else(|| ServiceError::queue(format!("unknown message id: {message_id}")))?;

        let channel = self.channel.lock().await;
        channel
            .basic_nack(
                tag,
                BasicNackOptions {
                    requeue,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| ServiceError::queue(format!("failed to nack {message_id}: {e}")))?;
        debug!(message_id, requeue, "message nacked");
        Ok(())
    }

    async fn create_queue(&self, queue: &str, durable: bool) -> ServiceResult<()> {
        let channel = self.channel.lock().await;
        self.declare_queue(&channel, queue, durable).await
    }

    async fn queue_depth(&self, queue: &str) -> ServiceResult<u32> {
        let channel = self.channel.lock().await;
        let declared = channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    passive: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await;

        match declared {
            Ok(info) => Ok(info.message_count()),
            Err(e) if is_not_found(&e) => Ok(0),
            Err(e) => Err(ServiceError::queue(format!(
                "failed to inspect queue {queue}: {e}"
            ))),
        }
    }

    async fn purge_queue(&self, queue: &str) -> ServiceResult<()> {
        let channel = self.channel.lock().await;
        channel
            .queue_purge(queue, QueuePurgeOptions::default())
            .await
            .map_err(|e| ServiceError::queue(format!("failed to purge queue {queue}: {e}")))?;
        debug!(queue, "queue purged");
        Ok(())
    }
}
