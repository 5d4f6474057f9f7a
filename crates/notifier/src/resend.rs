//! Resend HTTP API transport.
//!
//! `POST {api_url}/emails` with a bearer key. The recipient's language travels
//! as a `Content-Language` header since the API has no dedicated field for it.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use dormant_common::mail::{MailError, MailTransport, OutgoingMail, SendReceipt};

/// Request body of `POST /emails`.
#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
    headers: BTreeMap<&'static str, &'a str>,
}

impl<'a> SendEmailRequest<'a> {
    fn from_mail(mail: &'a OutgoingMail) -> Self {
        let mut headers = BTreeMap::new();
        if !mail.language.is_empty() {
            headers.insert("Content-Language", mail.language.as_str());
        }

        Self {
            from: &mail.from,
            to: [mail.to.as_str()],
            subject: &mail.subject,
            text: &mail.body,
            headers,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    id: Option<String>,
}

pub struct ResendMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl ResendMailer {
    /// `timeout` bounds each delivery request end to end.
    pub fn new(api_url: &str, api_key: &str, timeout: Duration) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/emails", api_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl MailTransport for ResendMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<SendReceipt, MailError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&SendEmailRequest::from_mail(mail))
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        // An unreadable body still means the provider accepted the message
        let message_id = match response.json::<SendEmailResponse>().await {
            Ok(body) => body.id,
            Err(e) => {
                tracing::debug!(error = %e, "Could not read Resend response body");
                None
            }
        };

        Ok(SendReceipt { message_id })
    }
}
