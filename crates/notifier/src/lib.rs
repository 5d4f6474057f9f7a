//! Mail delivery for inactivity notifications.
//!
//! Implements [`dormant_common::mail::MailTransport`] over the Resend HTTP API.

pub mod resend;

pub use resend::ResendMailer;
