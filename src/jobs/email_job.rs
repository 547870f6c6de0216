//! E-mail delivery job.
//!
//! Jobs are queued in apalis' postgres storage by the queued mailer and
//! delivered here. Without an SMTP relay configured the message is logged.

use serde::{Deserialize, Serialize};
use std::env;

use crate::errors::AppError;

/// Email job payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailJob {
    pub to: String,
    pub subject: String,
    /// Plain-text body
    pub body: String,
    #[serde(default)]
    pub from: Option<String>,
}

impl EmailJob {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            from: None,
        }
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }
}

/// Delivers one queued e-mail.
pub async fn email_job_handler(job: EmailJob) -> Result<(), AppError> {
    let relay = env::var("SMTP_HOST").ok();
    let from = job.from.as_deref().unwrap_or(crate::config::DEFAULT_MAIL_FROM);

    tracing::info!(to = %job.to, from = %from, subject = %job.subject, "Processing email job");

    match relay {
        None => {
            tracing::warn!("SMTP_HOST not set - logging email instead of sending");
            tracing::info!(to = %job.to, subject = %job.subject, body = %job.body, "Email (not sent)");
        }
        Some(host) => {
            // TODO: hand the message to an SMTP transport once one is added to the stack
            tracing::warn!(relay = %host, to = %job.to, "No SMTP transport available, email dropped");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_payload_defaults_sender() {
        let job: EmailJob =
            serde_json::from_str(r#"{"to":"a@b.c","subject":"s","body":"b"}"#).unwrap();
        assert_eq!(job, EmailJob::new("a@b.c", "s", "b"));
        assert_eq!(job.with_from("x@y.z").from.as_deref(), Some("x@y.z"));
    }
}
