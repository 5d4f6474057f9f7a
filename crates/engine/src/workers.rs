//! Queue workers: per-item processing for the two work queues.
//!
//! Workers never touch the queue. They return an [`ItemOutcome`] and the drain
//! loop in [`crate::runner`] settles the delivery accordingly.

use std::sync::Arc;

use async_trait::async_trait;

use dormant_common::error::AppError;
use dormant_common::types::{BlockWorkItem, Envelope, NotificationWorkItem};

use crate::directory::UserDirectory;
use crate::dispatcher::NotificationDispatcher;
use crate::queue::{INACTIVE_USERS_QUEUE, OLD_USERS_QUEUE, QueueItem};
use crate::user_data::NotificationState;

/// What the drain loop should do with a processed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Done; remove the item.
    Completed,
    /// Transient failure; put the unchanged item back at the tail.
    Requeue,
    /// Permanent failure; log and remove the item.
    Fatal(String),
}

#[async_trait]
pub trait QueueWorker: Send + Sync {
    type Item: QueueItem;

    /// Name of the queue this worker drains.
    fn queue_name(&self) -> &'static str;

    async fn process(&self, envelope: &Envelope<Self::Item>) -> ItemOutcome;
}

/// Transient storage failures are retried, everything else is dropped.
fn storage_outcome(error: &AppError) -> ItemOutcome {
    if error.is_transient() {
        ItemOutcome::Requeue
    } else {
        ItemOutcome::Fatal(error.to_string())
    }
}

/// Sends stage notifications and advances the per-user counter.
pub struct InactiveUsersWorker {
    dispatcher: NotificationDispatcher,
    state: NotificationState,
    /// Give up on an item after this many failed deliveries. `None` retries forever.
    max_attempts: Option<u32>,
}

impl InactiveUsersWorker {
    pub fn new(dispatcher: NotificationDispatcher, state: NotificationState) -> Self {
        Self {
            dispatcher,
            state,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

#[async_trait]
impl QueueWorker for InactiveUsersWorker {
    type Item = NotificationWorkItem;

    fn queue_name(&self) -> &'static str {
        INACTIVE_USERS_QUEUE
    }

    #[tracing::instrument(
        name = "worker.inactive_users",
        fields(
            item_id = %envelope.id,
            user_id = envelope.item.user_id(),
            notify_stage = envelope.item.notify_stage(),
            attempts = envelope.attempts,
        ),
        skip_all,
    )]
    async fn process(&self, envelope: &Envelope<NotificationWorkItem>) -> ItemOutcome {
        let item = envelope.item;

        let result = match self
            .dispatcher
            .send_stage_notification(item.user_id(), item.notify_stage())
            .await
        {
            Ok(result) => result,
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "Notification deferred");
                return ItemOutcome::Requeue;
            }
            Err(e) => return ItemOutcome::Fatal(e.to_string()),
        };

        if !result.success {
            let failures = envelope.attempts + 1;
            if let Some(max) = self.max_attempts
                && failures >= max
            {
                return ItemOutcome::Fatal(format!(
                    "mail delivery failed {} times, last error: {}",
                    failures,
                    result.error.unwrap_or_default()
                ));
            }
            return ItemOutcome::Requeue;
        }

        match self
            .state
            .record_sent(item.user_id(), item.notify_stage())
            .await
        {
            Ok(next_stage) => {
                tracing::debug!(next_stage, "Notification counter advanced");
                ItemOutcome::Completed
            }
            // The mail is out; retrying would send it twice.
            Err(e) => ItemOutcome::Fatal(format!("notification sent but not recorded: {}", e)),
        }
    }
}

/// Blocks accounts that exhausted every stage.
pub struct OldUsersWorker {
    users: Arc<dyn UserDirectory>,
    state: NotificationState,
}

impl OldUsersWorker {
    pub fn new(users: Arc<dyn UserDirectory>, state: NotificationState) -> Self {
        Self { users, state }
    }
}

#[async_trait]
impl QueueWorker for OldUsersWorker {
    type Item = BlockWorkItem;

    fn queue_name(&self) -> &'static str {
        OLD_USERS_QUEUE
    }

    #[tracing::instrument(
        name = "worker.old_users",
        fields(item_id = %envelope.id, user_id = envelope.item.user_id()),
        skip_all,
    )]
    async fn process(&self, envelope: &Envelope<BlockWorkItem>) -> ItemOutcome {
        let user_id = envelope.item.user_id();

        let user = match self.users.load_user(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::debug!("User already gone, nothing to block");
                return ItemOutcome::Completed;
            }
            Err(e) => return storage_outcome(&e),
        };

        if !user.blocked {
            if let Err(e) = self.users.block_user(user_id).await {
                return storage_outcome(&e);
            }
        }

        if let Err(e) = self.state.mark_auto_blocked(user_id).await {
            return storage_outcome(&e);
        }

        tracing::info!("Inactive user auto-blocked");
        ItemOutcome::Completed
    }
}
