use async_nats::HeaderMap;
use async_nats::jetstream::{self, AckKind, consumer, stream};
use async_trait::async_trait;
use futures_util::StreamExt;

use super::{Acknowledger, Delivery, DeliveryStream, MessageBus};
use crate::{PlatformError, Result};

/// Broker backed by NATS JetStream.
///
/// Each queue is a work-queue stream holding a single subject of the same
/// name, so a message is removed once any consumer acknowledges it.
#[derive(Clone)]
pub struct NatsMessageBus {
    context: jetstream::Context,
    consumer_name: String,
}

impl NatsMessageBus {
    /// Connects to the server at `url`. `consumer_name` names the durable
    /// consumer used by [`MessageBus::consume`].
    pub async fn connect(url: &str, consumer_name: impl Into<String>) -> Result<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| PlatformError::Bus(format!("failed to connect to {url}: {e}")))?;
        tracing::info!(%url, "connected to NATS");

        Ok(Self {
            context: jetstream::new(client),
            consumer_name: consumer_name.into(),
        })
    }
}

/// Every payload on the bus is a JSON document.
const PAYLOAD_CONTENT_TYPE: &str = "application/json";

fn publish_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Content-Type", PAYLOAD_CONTENT_TYPE);
    headers
}

/// `order.created` -> `ORDER_CREATED`
fn stream_name(queue: &str) -> String {
    queue
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

#[async_trait]
impl MessageBus for NatsMessageBus {
    async fn declare_queue(&self, queue: &str) -> Result<()> {
        self.context
            .get_or_create_stream(stream::Config {
                name: stream_name(queue),
                subjects: vec![queue.to_string()],
                retention: stream::RetentionPolicy::WorkQueue,
                ..Default::default()
            })
            .await
            .map_err(|e| PlatformError::Bus(format!("failed to declare queue {queue}: {e}")))?;
        tracing::debug!(queue, "declared queue");
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<()> {
        self.context
            .publish_with_headers(queue.to_string(), publish_headers(), payload.into())
            .await
            .map_err(|e| PlatformError::Bus(e.to_string()))?
            .await
            .map_err(|e| PlatformError::Bus(e.to_string()))?;
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream> {
        let stream = self
            .context
            .get_stream(stream_name(queue))
            .await
            .map_err(|e| PlatformError::Bus(e.to_string()))?;

        let consumer = stream
            .get_or_create_consumer(
                &self.consumer_name,
                consumer::pull::Config {
                    durable_name: Some(self.consumer_name.clone()),
                    ack_policy: consumer::AckPolicy::Explicit,
                    filter_subject: queue.to_string(),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| PlatformError::Bus(e.to_string()))?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| PlatformError::Bus(e.to_string()))?;

        let deliveries = messages.map(|item| {
            let message = item.map_err(|e| PlatformError::Bus(e.to_string()))?;
            let redelivered = message.info().map(|i| i.delivered > 1).unwrap_or(false);
            let payload = message.payload.to_vec();
            Ok(Delivery::new(
                payload,
                redelivered,
                Box::new(NatsAcker { message }),
            ))
        });

        Ok(Box::pin(deliveries))
    }
}

struct NatsAcker {
    message: jetstream::Message,
}

#[async_trait]
impl Acknowledger for NatsAcker {
    async fn ack(&self) -> Result<()> {
        self.message
            .ack()
            .await
            .map_err(|e| PlatformError::Bus(e.to_string()))
    }

    async fn nack(&self, requeue: bool) -> Result<()> {
        let kind = if requeue { AckKind::Nak(None) } else { AckKind::Term };
        self.message
            .ack_with(kind)
            .await
            .map_err(|e| PlatformError::Bus(e.to_string()))
    }
}
