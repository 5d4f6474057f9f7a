//! Consumer leases: at most one process drains a given queue at a time.
//!
//! The Redis lease is a single key `queue:<name>:consumer` holding the owner's
//! instance id, taken with `SET NX EX` and renewed on every tick. Another
//! instance only gets the lease once the holder stopped renewing it, and only
//! then is it safe to take back the holder's unacknowledged deliveries.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use dormant_common::error::AppError;

/// Result of trying to take or keep a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    /// Newly taken; whatever the previous holder claimed is now ours to recover
    Acquired,
    /// Already ours, kept alive
    Renewed,
    /// Another instance holds it
    HeldElsewhere,
}

#[async_trait]
pub trait QueueLease: Send + Sync {
    /// Take the lease, or renew it if this instance already holds it.
    async fn acquire(&self) -> Result<LeaseState, AppError>;

    /// Give the lease up if this instance holds it.
    async fn release(&self) -> Result<(), AppError>;
}

/// Redis-backed lease with automatic TTL expiry.
pub struct RedisLease {
    redis: ConnectionManager,
    key: String,
    owner: String,
    ttl_secs: u64,
}

impl RedisLease {
    /// `ttl_secs` must outlast the longest gap between two renewals, i.e. the
    /// tick interval plus one drain run.
    pub fn new(redis: ConnectionManager, queue_name: &str, owner: &str, ttl_secs: u64) -> Self {
        Self {
            redis,
            key: format!("queue:{}:consumer", queue_name),
            owner: owner.to_string(),
            ttl_secs,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    async fn holder(&self, conn: &mut ConnectionManager) -> Result<Option<String>, AppError> {
        let holder: Option<String> = conn.get(&self.key).await?;
        Ok(holder)
    }
}

#[async_trait]
impl QueueLease for RedisLease {
    async fn acquire(&self) -> Result<LeaseState, AppError> {
        let mut conn = self.redis.clone();

        // SET key owner NX EX ttl
        // Returns Some("OK") if the lease was free
        let taken: Option<String> = redis::cmd("SET")
            .arg(&self.key)
            .arg(&self.owner)
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async(&mut conn)
            .await?;

        if taken.is_some() {
            return Ok(LeaseState::Acquired);
        }

        if self.holder(&mut conn).await?.as_deref() == Some(self.owner.as_str()) {
            conn.expire::<_, ()>(&self.key, self.ttl_secs as i64).await?;
            return Ok(LeaseState::Renewed);
        }

        Ok(LeaseState::HeldElsewhere)
    }

    async fn release(&self) -> Result<(), AppError> {
        let mut conn = self.redis.clone();
        if self.holder(&mut conn).await?.as_deref() == Some(self.owner.as_str()) {
            conn.del::<_, ()>(&self.key).await?;
        }
        Ok(())
    }
}

/// In-process lease. Clones made with [`MemoryLease::for_owner`] compete for
/// the same slot, like several instances against one Redis.
#[derive(Debug, Clone)]
pub struct MemoryLease {
    holder: Arc<Mutex<Option<String>>>,
    owner: String,
}

impl MemoryLease {
    pub fn new(owner: &str) -> Self {
        Self {
            holder: Arc::new(Mutex::new(None)),
            owner: owner.to_string(),
        }
    }

    /// A lease handle for another owner over the same slot.
    pub fn for_owner(&self, owner: &str) -> Self {
        Self {
            holder: self.holder.clone(),
            owner: owner.to_string(),
        }
    }

    /// Drop the lease whoever holds it, as a TTL running out would.
    pub fn expire(&self) -> Result<(), AppError> {
        *self.lock()? = None;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>, AppError> {
        self.holder
            .lock()
            .map_err(|_| AppError::Internal("lease lock poisoned".to_string()))
    }
}

#[async_trait]
impl QueueLease for MemoryLease {
    async fn acquire(&self) -> Result<LeaseState, AppError> {
        let mut holder = self.lock()?;
        Ok(match holder.as_deref() {
            None => {
                *holder = Some(self.owner.clone());
                LeaseState::Acquired
            }
            Some(current) if current == self.owner => LeaseState::Renewed,
            Some(_) => LeaseState::HeldElsewhere,
        })
    }

    async fn release(&self) -> Result<(), AppError> {
        let mut holder = self.lock()?;
        if holder.as_deref() == Some(self.owner.as_str()) {
            *holder = None;
        }
        Ok(())
    }
}
