//! Work queues: at-least-once delivery of typed work items.
//!
//! The Redis implementation keeps two lists per queue:
//!
//! - `queue:<name>`: pending envelopes, consumed from the left
//! - `queue:<name>:processing`: envelopes handed to a consumer but not yet
//!   acknowledged
//!
//! `LMOVE` moves an envelope into the processing list atomically, so an item
//! claimed by a worker that dies is still in Redis and [`WorkQueue::recover`]
//! can hand it out again once the consumer lease (see [`crate::lease`])
//! changes hands.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use dormant_common::error::AppError;
use dormant_common::types::Envelope;

/// Queue of notification work items.
pub const INACTIVE_USERS_QUEUE: &str = "inactive_users_queue";

/// Queue of block work items.
pub const OLD_USERS_QUEUE: &str = "old_users_queue";

/// Anything that can travel through a work queue.
pub trait QueueItem: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> QueueItem for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// An envelope claimed from a queue. Must be acked or requeued.
#[derive(Debug, Clone)]
pub struct Delivery<T> {
    pub envelope: Envelope<T>,
    /// Backend handle used to settle the delivery
    receipt: String,
}

impl<T> Delivery<T> {
    pub fn item(&self) -> &T {
        &self.envelope.item
    }
}

#[async_trait]
pub trait WorkQueue<T: QueueItem>: Send + Sync {
    /// Append a new item to the tail of the queue.
    async fn enqueue(&self, item: T) -> Result<Uuid, AppError>;

    /// Claim the item at the head of the queue, if any.
    async fn dequeue(&self) -> Result<Option<Delivery<T>>, AppError>;

    /// Settle a delivery as done. The item is gone for good.
    async fn ack(&self, delivery: Delivery<T>) -> Result<(), AppError>;

    /// Hand the unchanged item back to the tail of the queue for a later attempt.
    async fn requeue(&self, delivery: Delivery<T>) -> Result<(), AppError>;

    /// Number of pending (unclaimed) items.
    async fn len(&self) -> Result<usize, AppError>;

    /// Move every unacknowledged delivery back to the head of the queue, in
    /// claim order. Returns how many were moved.
    ///
    /// Only safe while no other consumer is draining the queue; the runner
    /// calls it right after taking over the queue's consumer lease.
    async fn recover(&self) -> Result<usize, AppError>;
}

/// Redis list-backed queue.
pub struct RedisQueue<T> {
    redis: ConnectionManager,
    name: String,
    pending_key: String,
    processing_key: String,
    _item: PhantomData<fn() -> T>,
}

impl<T: QueueItem> RedisQueue<T> {
    pub fn new(redis: ConnectionManager, name: &str) -> Self {
        Self {
            redis,
            name: name.to_string(),
            pending_key: format!("queue:{}", name),
            processing_key: format!("queue:{}:processing", name),
            _item: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl<T: QueueItem> WorkQueue<T> for RedisQueue<T> {
    async fn enqueue(&self, item: T) -> Result<Uuid, AppError> {
        let envelope = Envelope::new(item);
        let payload = serde_json::to_string(&envelope)?;

        let mut conn = self.redis.clone();
        conn.rpush::<_, _, ()>(&self.pending_key, payload).await?;

        tracing::debug!(queue = %self.name, item_id = %envelope.id, "Work item enqueued");
        Ok(envelope.id)
    }

    async fn dequeue(&self) -> Result<Option<Delivery<T>>, AppError> {
        let mut conn = self.redis.clone();

        loop {
            let raw: Option<String> = redis::cmd("LMOVE")
                .arg(&self.pending_key)
                .arg(&self.processing_key)
                .arg("LEFT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await?;

            let Some(raw) = raw else {
                return Ok(None);
            };

            match serde_json::from_str::<Envelope<T>>(&raw) {
                Ok(envelope) => {
                    return Ok(Some(Delivery {
                        envelope,
                        receipt: raw,
                    }));
                }
                Err(e) => {
                    // Invalid payloads can never be processed; drop them
                    tracing::error!(
                        queue = %self.name,
                        error = %e,
                        payload = %raw,
                        "Discarding invalid work item"
                    );
                    conn.lrem::<_, _, ()>(&self.processing_key, 1, &raw).await?;
                }
            }
        }
    }

    async fn ack(&self, delivery: Delivery<T>) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        conn.lrem::<_, _, ()>(&self.processing_key, 1, &delivery.receipt)
            .await?;
        Ok(())
    }

    async fn requeue(&self, delivery: Delivery<T>) -> Result<(), AppError> {
        let envelope = delivery.envelope.retried();
        let payload = serde_json::to_string(&envelope)?;

        let mut conn = self.redis.clone();
        let _: () = redis::pipe()
            .atomic()
            .rpush(&self.pending_key, payload)
            .ignore()
            .lrem(&self.processing_key, 1, &delivery.receipt)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(())
    }

    async fn len(&self) -> Result<usize, AppError> {
        let mut conn = self.redis.clone();
        let len: usize = conn.llen(&self.pending_key).await?;
        Ok(len)
    }

    async fn recover(&self) -> Result<usize, AppError> {
        let mut conn = self.redis.clone();
        let mut recovered = 0;

        loop {
            // RIGHT -> LEFT keeps the original order at the head of the queue
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(&self.processing_key)
                .arg(&self.pending_key)
                .arg("RIGHT")
                .arg("LEFT")
                .query_async(&mut conn)
                .await?;

            if moved.is_none() {
                break;
            }
            recovered += 1;
        }

        if recovered > 0 {
            tracing::warn!(
                queue = %self.name,
                recovered,
                "Recovered unacknowledged work items"
            );
        }

        Ok(recovered)
    }
}

#[derive(Debug)]
struct MemoryQueueState<T> {
    pending: VecDeque<Envelope<T>>,
    /// Claimed envelopes, in claim order
    in_flight: Vec<Envelope<T>>,
}

/// In-process queue with the same delivery semantics as [`RedisQueue`].
#[derive(Debug, Clone)]
pub struct MemoryQueue<T> {
    state: Arc<Mutex<MemoryQueueState<T>>>,
}

impl<T: QueueItem> MemoryQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryQueueState {
                pending: VecDeque::new(),
                in_flight: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryQueueState<T>>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("queue lock poisoned".to_string()))
    }

    /// Pending envelopes, head first.
    pub fn pending(&self) -> Result<Vec<Envelope<T>>, AppError> {
        Ok(self.lock()?.pending.iter().cloned().collect())
    }

    /// Number of claimed but unsettled deliveries.
    pub fn in_flight(&self) -> Result<usize, AppError> {
        Ok(self.lock()?.in_flight.len())
    }
}

impl<T: QueueItem> Default for MemoryQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: QueueItem> WorkQueue<T> for MemoryQueue<T> {
    async fn enqueue(&self, item: T) -> Result<Uuid, AppError> {
        let envelope = Envelope::new(item);
        let id = envelope.id;
        self.lock()?.pending.push_back(envelope);
        Ok(id)
    }

    async fn dequeue(&self) -> Result<Option<Delivery<T>>, AppError> {
        let mut state = self.lock()?;
        let Some(envelope) = state.pending.pop_front() else {
            return Ok(None);
        };
        state.in_flight.push(envelope.clone());
        Ok(Some(Delivery {
            receipt: envelope.id.to_string(),
            envelope,
        }))
    }

    async fn ack(&self, delivery: Delivery<T>) -> Result<(), AppError> {
        self.lock()?
            .in_flight
            .retain(|claimed| claimed.id != delivery.envelope.id);
        Ok(())
    }

    async fn requeue(&self, delivery: Delivery<T>) -> Result<(), AppError> {
        let mut state = self.lock()?;
        state
            .in_flight
            .retain(|claimed| claimed.id != delivery.envelope.id);
        state.pending.push_back(delivery.envelope.retried());
        Ok(())
    }

    async fn len(&self) -> Result<usize, AppError> {
        Ok(self.lock()?.pending.len())
    }

    async fn recover(&self) -> Result<usize, AppError> {
        let mut state = self.lock()?;
        let claimed: Vec<Envelope<T>> = state.in_flight.drain(..).collect();
        let recovered = claimed.len();
        for envelope in claimed.into_iter().rev() {
            state.pending.push_front(envelope);
        }
        Ok(recovered)
    }
}
