//! Outgoing mail seam for password recovery.
//!
//! Delivery itself (SMTP or a provider API) lives outside this crate; the
//! default implementation only logs.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Writes every message to the log instead of sending it
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        info!(to, subject, "Mail not sent (log mailer): {}", body);
        Ok(())
    }
}
