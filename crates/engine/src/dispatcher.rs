//! Notification dispatcher: renders and sends one stage notification.
//!
//! Pipeline for a `(user_id, notify_stage)` pair:
//! 1. Load settings and resolve the stage from the stage table
//! 2. Load the user
//! 3. Render subject and body from the stage labels, user and site
//! 4. Hand the message to the mail transport
//!
//! Nothing is persisted here; the caller records the sent stage once it has
//! seen a successful [`DispatchResult`].

use std::sync::Arc;

use thiserror::Error;

use dormant_common::error::AppError;
use dormant_common::mail::{MailTransport, OutgoingMail};
use dormant_common::types::UserId;

use crate::directory::UserDirectory;
use crate::settings::SettingsProvider;
use crate::stages::{StageError, StageTable};
use crate::template::{self, Placeholders, SUBJECT_TEMPLATE};

/// Site-wide values substituted into every notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteContext {
    /// Scheme and host of the site, substituted for `@site-url`
    pub site_url: String,
    /// Sender address of every notification
    pub mail_from: String,
}

/// Outcome of a delivery attempt that reached the mail transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchResult {
    pub success: bool,
    /// Provider message id on success
    pub message_id: Option<String>,
    /// Transport error on failure
    pub error: Option<String>,
}

/// Reasons a notification could not even be attempted.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("User {0} not found")]
    UserNotFound(UserId),

    #[error(transparent)]
    Storage(#[from] AppError),
}

impl DispatchError {
    /// Whether the same item could succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            DispatchError::Stage(_) | DispatchError::UserNotFound(_) => false,
            DispatchError::Storage(e) => e.is_transient(),
        }
    }
}

pub struct NotificationDispatcher {
    settings: Arc<dyn SettingsProvider>,
    users: Arc<dyn UserDirectory>,
    mailer: Arc<dyn MailTransport>,
    site: SiteContext,
}

impl NotificationDispatcher {
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        users: Arc<dyn UserDirectory>,
        mailer: Arc<dyn MailTransport>,
        site: SiteContext,
    ) -> Self {
        Self {
            settings,
            users,
            mailer,
            site,
        }
    }

    /// Render and send the notification for `notify_stage` to `user_id`.
    ///
    /// A transport failure is reported as `success: false`, not as an error.
    pub async fn send_stage_notification(
        &self,
        user_id: UserId,
        notify_stage: usize,
    ) -> Result<DispatchResult, DispatchError> {
        let settings = self.settings.load().await?;
        let stage = StageTable::parse(&settings.stages).get(notify_stage)?;

        let user = self
            .users
            .load_user(user_id)
            .await?
            .ok_or(DispatchError::UserNotFound(user_id))?;

        let placeholders = Placeholders {
            name: user.name,
            inactive_period: stage.inactive_period_label,
            remaining_period: stage.remaining_period_label,
            site_url: self.site.site_url.clone(),
        };

        let mail = OutgoingMail {
            to: user.email,
            subject: template::render(Some(SUBJECT_TEMPLATE), &placeholders),
            body: template::render(settings.email_template.as_deref(), &placeholders),
            language: user.preferred_language,
            from: self.site.mail_from.clone(),
        };

        if mail.body.is_empty() {
            tracing::warn!(user_id, notify_stage, "Email template is empty, sending blank body");
        }

        match self.mailer.send(&mail).await {
            Ok(receipt) => {
                tracing::info!(
                    user_id,
                    notify_stage,
                    message_id = ?receipt.message_id,
                    "Inactivity notification sent"
                );
                Ok(DispatchResult {
                    success: true,
                    message_id: receipt.message_id,
                    error: None,
                })
            }
            Err(e) => {
                tracing::warn!(
                    user_id,
                    notify_stage,
                    error = %e,
                    "Inactivity notification not delivered"
                );
                Ok(DispatchResult {
                    success: false,
                    message_id: None,
                    error: Some(e.to_string()),
                })
            }
        }
    }
}
