use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// A user identifier, as stored in the `users` table.
pub type UserId = i64;

/// One tier of the inactivity stage table.
///
/// Bounds are `None` when the line carries something other than an integer.
/// Such a stage can still be notified, it just never matches an age.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDefinition {
    /// 0-based line position in the stage table; this is what lookups use.
    pub index: usize,
    /// The index field as written on the line. Informational only.
    pub declared_index: String,
    /// Inclusive lower bound of inactivity covered by this stage, in days
    pub lower_bound: Option<i64>,
    /// Inclusive upper bound of inactivity covered by this stage, in days
    pub upper_bound: Option<i64>,
    /// Human-readable inactive period (e.g., "1 year and 6 months")
    pub inactive_period_label: String,
    /// Human-readable time left before deactivation (e.g., "6 months")
    pub remaining_period_label: String,
}

impl StageDefinition {
    /// Whether `days` of inactivity fall inside this stage's range.
    pub fn covers(&self, days: i64) -> bool {
        match (self.lower_bound, self.upper_bound) {
            (Some(lower), Some(upper)) => lower <= days && days <= upper,
            _ => false,
        }
    }
}

/// Request to send the notification for `notify_stage` to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawNotificationWorkItem")]
pub struct NotificationWorkItem {
    user_id: UserId,
    notify_stage: usize,
}

#[derive(Deserialize)]
struct RawNotificationWorkItem {
    user_id: UserId,
    notify_stage: usize,
}

impl NotificationWorkItem {
    pub fn new(user_id: UserId, notify_stage: usize) -> Result<Self, AppError> {
        validate_user_id(user_id)?;
        Ok(Self {
            user_id,
            notify_stage,
        })
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn notify_stage(&self) -> usize {
        self.notify_stage
    }
}

impl TryFrom<RawNotificationWorkItem> for NotificationWorkItem {
    type Error = AppError;

    fn try_from(raw: RawNotificationWorkItem) -> Result<Self, Self::Error> {
        Self::new(raw.user_id, raw.notify_stage)
    }
}

/// Request to deactivate a user who has exhausted every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBlockWorkItem")]
pub struct BlockWorkItem {
    user_id: UserId,
}

#[derive(Deserialize)]
struct RawBlockWorkItem {
    user_id: UserId,
}

impl BlockWorkItem {
    pub fn new(user_id: UserId) -> Result<Self, AppError> {
        validate_user_id(user_id)?;
        Ok(Self { user_id })
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl TryFrom<RawBlockWorkItem> for BlockWorkItem {
    type Error = AppError;

    fn try_from(raw: RawBlockWorkItem) -> Result<Self, Self::Error> {
        Self::new(raw.user_id)
    }
}

fn validate_user_id(user_id: UserId) -> Result<(), AppError> {
    if user_id <= 0 {
        return Err(AppError::Validation(format!(
            "user_id must be positive, got {}",
            user_id
        )));
    }
    Ok(())
}

/// Queue wrapper around a work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub id: Uuid,
    pub enqueued_at: DateTime<Utc>,
    /// Number of times this item has been handed back to the queue
    pub attempts: u32,
    pub item: T,
}

impl<T> Envelope<T> {
    pub fn new(item: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            enqueued_at: Utc::now(),
            attempts: 0,
            item,
        }
    }

    /// The same item, marked as retried once more.
    pub fn retried(mut self) -> Self {
        self.attempts += 1;
        self
    }
}

/// A user account as seen by the workers.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserRecord {
    pub id: UserId,
    /// Display name substituted for `@name`
    pub name: String,
    pub email: String,
    /// Language tag used to localize the notification (e.g., "en")
    pub preferred_language: String,
    pub blocked: bool,
}

/// Admin-managed settings for the inactive users process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InactiveUsersSettings {
    /// Raw stage table text, one `index|lower|upper|inactive|remaining` per line
    pub stages: String,
    /// Email body template; `None` renders an empty body
    pub email_template: Option<String>,
    /// Roles excluded from the process. Only the scanner consults this.
    pub exclude_roles: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_item_rejects_non_positive_user() {
        assert!(NotificationWorkItem::new(0, 1).is_err());
        assert!(BlockWorkItem::new(-3).is_err());
        assert!(BlockWorkItem::new(3).is_ok());
    }

    #[test]
    fn test_work_item_validated_on_deserialize() {
        let ok: NotificationWorkItem =
            serde_json::from_str(r#"{"user_id": 42, "notify_stage": 2}"#).unwrap();
        assert_eq!(ok.user_id(), 42);
        assert_eq!(ok.notify_stage(), 2);

        let bad = serde_json::from_str::<NotificationWorkItem>(
            r#"{"user_id": 0, "notify_stage": 2}"#,
        );
        assert!(bad.is_err());

        let missing = serde_json::from_str::<BlockWorkItem>(r#"{"uid": 5}"#);
        assert!(missing.is_err());
    }

    #[test]
    fn test_envelope_retried_keeps_identity() {
        let item = BlockWorkItem::new(9).unwrap();
        let envelope = Envelope::new(item);
        let id = envelope.id;

        let retried = envelope.retried().retried();
        assert_eq!(retried.id, id);
        assert_eq!(retried.attempts, 2);
        assert_eq!(retried.item, item);
    }

    #[test]
    fn test_stage_covers_inclusive_range() {
        let stage = StageDefinition {
            index: 0,
            declared_index: "0".to_string(),
            lower_bound: Some(18),
            upper_bound: Some(21),
            inactive_period_label: "1 year and 6 months".to_string(),
            remaining_period_label: "6 months".to_string(),
        };
        assert!(stage.covers(18));
        assert!(stage.covers(21));
        assert!(!stage.covers(17));
        assert!(!stage.covers(22));

        let unbounded = StageDefinition {
            upper_bound: None,
            ..stage
        };
        assert!(!unbounded.covers(18));
    }
}
