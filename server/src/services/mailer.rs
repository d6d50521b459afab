//! Outbound e-mail.
//!
//! [`Mailer`] is the seam between password reset and the delivery provider.
//! Production uses [`ResendMailer`]; tests substitute a recording fake.

use async_trait::async_trait;
use resend_rs::Resend;
use resend_rs::types::CreateEmailBaseOptions;

use crate::config::EmailConfig;

#[derive(Debug, thiserror::Error)]
#[error("email delivery failed: {0}")]
pub struct MailError(pub String);

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_html(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError>;
}

pub struct ResendMailer {
    client: Resend,
    from: String,
}

impl ResendMailer {
    #[must_use]
    pub fn new(config: &EmailConfig) -> Self {
        Self { client: Resend::new(&config.api_key), from: config.from.clone() }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send_html(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        let email = CreateEmailBaseOptions::new(&self.from, [to], subject).with_html(html);
        self.client
            .emails
            .send(email)
            .await
            .map_err(|e| MailError(e.to_string()))?;
        Ok(())
    }
}
