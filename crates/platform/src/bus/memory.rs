use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, RwLock};

use super::{Acknowledger, Delivery, DeliveryStream, MessageBus};
use crate::{PlatformError, Result};

struct StoredMessage {
    payload: Vec<u8>,
    redelivered: bool,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<StoredMessage>,
    unacked: usize,
    acked: usize,
    published: usize,
    discarded: Vec<Vec<u8>>,
}

#[derive(Default)]
struct Queue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl Queue {
    async fn next_delivery(self: &Arc<Self>) -> Delivery {
        loop {
            {
                let mut state = self.state.lock().await;
                if let Some(message) = state.ready.pop_front() {
                    state.unacked += 1;
                    let acker = MemoryAcker {
                        queue: self.clone(),
                        payload: message.payload.clone(),
                    };
                    return Delivery::new(message.payload, message.redelivered, Box::new(acker));
                }
            }
            self.notify.notified().await;
        }
    }
}

struct MemoryAcker {
    queue: Arc<Queue>,
    payload: Vec<u8>,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> Result<()> {
        let mut state = self.queue.state.lock().await;
        state.unacked = state.unacked.saturating_sub(1);
        state.acked += 1;
        Ok(())
    }

    async fn nack(&self, requeue: bool) -> Result<()> {
        let mut state = self.queue.state.lock().await;
        state.unacked = state.unacked.saturating_sub(1);
        if requeue {
            state.ready.push_back(StoredMessage {
                payload: self.payload.clone(),
                redelivered: true,
            });
            drop(state);
            self.queue.notify.notify_one();
        } else {
            state.discarded.push(self.payload.clone());
        }
        Ok(())
    }
}

/// In-memory broker for tests.
///
/// Queues are FIFO; a requeued message goes to the tail. Discarded payloads
/// are kept for inspection only, nothing ever redelivers them.
#[derive(Clone, Default)]
pub struct InMemoryMessageBus {
    queues: Arc<RwLock<HashMap<String, Arc<Queue>>>>,
    fail_publish: Arc<AtomicBool>,
}

impl InMemoryMessageBus {
    /// Creates a broker with no queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `publish` fail as if the broker were unreachable.
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Messages waiting to be delivered.
    pub async fn ready_count(&self, queue: &str) -> usize {
        self.read_state(queue, |s| s.ready.len()).await
    }

    /// Messages delivered but not yet settled.
    pub async fn unacked_count(&self, queue: &str) -> usize {
        self.read_state(queue, |s| s.unacked).await
    }

    /// Messages acknowledged.
    pub async fn acked_count(&self, queue: &str) -> usize {
        self.read_state(queue, |s| s.acked).await
    }

    /// Successful publishes.
    pub async fn published_count(&self, queue: &str) -> usize {
        self.read_state(queue, |s| s.published).await
    }

    /// Payloads rejected without requeue.
    pub async fn discarded(&self, queue: &str) -> Vec<Vec<u8>> {
        self.read_state(queue, |s| s.discarded.clone()).await
    }

    async fn read_state<T: Default>(&self, queue: &str, f: impl FnOnce(&QueueState) -> T) -> T {
        let Some(queue) = self.queues.read().await.get(queue).cloned() else {
            return T::default();
        };
        let state = queue.state.lock().await;
        f(&state)
    }

    async fn queue(&self, name: &str) -> Result<Arc<Queue>> {
        self.queues
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| PlatformError::Bus(format!("queue {name} has not been declared")))
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn declare_queue(&self, queue: &str) -> Result<()> {
        self.queues
            .write()
            .await
            .entry(queue.to_string())
            .or_default();
        Ok(())
    }

    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(PlatformError::Bus("broker is unreachable".to_string()));
        }
        let queue = self.queue(queue).await?;
        {
            let mut state = queue.state.lock().await;
            state.ready.push_back(StoredMessage {
                payload,
                redelivered: false,
            });
            state.published += 1;
        }
        queue.notify.notify_one();
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<DeliveryStream> {
        let queue = self.queue(queue).await?;
        let stream = futures_util::stream::unfold(queue, |queue| async move {
            let delivery = queue.next_delivery().await;
            Some((Ok(delivery), queue))
        });
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    const QUEUE: &str = "test.queue";

    async fn bus_with_queue() -> InMemoryMessageBus {
        let bus = InMemoryMessageBus::new();
        bus.declare_queue(QUEUE).await.unwrap();
        bus
    }

    #[tokio::test]
    async fn delivers_in_publish_order() {
        let bus = bus_with_queue().await;
        bus.publish(QUEUE, b"one".to_vec()).await.unwrap();
        bus.publish(QUEUE, b"two".to_vec()).await.unwrap();

        let mut stream = bus.consume(QUEUE).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.payload(), b"one");
        assert!(!first.redelivered());
        first.ack().await.unwrap();

        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.payload(), b"two");
        second.ack().await.unwrap();

        assert_eq!(bus.acked_count(QUEUE).await, 2);
        assert_eq!(bus.ready_count(QUEUE).await, 0);
    }

    #[tokio::test]
    async fn requeue_goes_to_tail_and_is_flagged() {
        let bus = bus_with_queue().await;
        bus.publish(QUEUE, b"a".to_vec()).await.unwrap();
        bus.publish(QUEUE, b"b".to_vec()).await.unwrap();

        let mut stream = bus.consume(QUEUE).await.unwrap();
        let a = stream.next().await.unwrap().unwrap();
        a.nack(true).await.unwrap();

        let b = stream.next().await.unwrap().unwrap();
        assert_eq!(b.payload(), b"b");
        b.ack().await.unwrap();

        let a_again = stream.next().await.unwrap().unwrap();
        assert_eq!(a_again.payload(), b"a");
        assert!(a_again.redelivered());
    }

    #[tokio::test]
    async fn nack_without_requeue_discards() {
        let bus = bus_with_queue().await;
        bus.publish(QUEUE, b"bad".to_vec()).await.unwrap();

        let mut stream = bus.consume(QUEUE).await.unwrap();
        let msg = stream.next().await.unwrap().unwrap();
        msg.nack(false).await.unwrap();

        assert_eq!(bus.discarded(QUEUE).await, vec![b"bad".to_vec()]);
        assert_eq!(bus.ready_count(QUEUE).await, 0);
        assert_eq!(bus.unacked_count(QUEUE).await, 0);
    }

    #[tokio::test]
    async fn consumer_wakes_on_later_publish() {
        let bus = bus_with_queue().await;
        let mut stream = bus.consume(QUEUE).await.unwrap();

        let publisher = bus.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            publisher.publish(QUEUE, b"late".to_vec()).await.unwrap();
        });

        let msg = stream.next().await.unwrap().unwrap();
        assert_eq!(msg.payload(), b"late");
    }

    #[tokio::test]
    async fn publish_failures() {
        let bus = InMemoryMessageBus::new();
        assert!(bus.publish("undeclared", vec![]).await.is_err());

        bus.declare_queue(QUEUE).await.unwrap();
        bus.set_fail_publish(true);
        assert!(matches!(
            bus.publish(QUEUE, vec![]).await,
            Err(PlatformError::Bus(_))
        ));
        assert_eq!(bus.published_count(QUEUE).await, 0);
    }
}
