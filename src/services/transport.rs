use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Fixed pause between consecutive sends so a fan-out never trips the
/// provider's rate limits.
const INTER_SEND_DELAY: Duration = Duration::from_millis(100);

/// A successful send: the recipient plus the provider-assigned message id the
/// delivery ledger stores for later status reconciliation.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub telefono: String,
    pub whatsapp_message_id: String,
}

#[derive(Debug, Clone)]
pub struct FailedSend {
    pub telefono: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct BulkOutcome {
    pub succeeded: Vec<SentMessage>,
    pub failed: Vec<FailedSend>,
}

/// Outbound messaging seam. The dispatch engine receives a constructed
/// transport instead of reaching for process-wide state, so tests can swap in
/// a double.
#[async_trait]
pub trait Transport: Send + Sync {
    /// True only when provider credentials are present. Callers must check
    /// this before fanning out and take the "not configured" branch instead
    /// of failing once per recipient.
    fn is_configured(&self) -> bool;

    /// Delivers one text body to one canonical recipient, returning the
    /// provider-assigned message id.
    async fn send_text(&self, to: &str, body: &str) -> Result<String>;

    /// Sends sequentially, never concurrently, with a fixed inter-send delay.
    /// One recipient's failure does not abort the batch: every recipient is
    /// attempted exactly once and lands in exactly one bucket.
    async fn send_bulk(&self, recipients: &[String], body: &str) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();
        for (i, telefono) in recipients.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(INTER_SEND_DELAY).await;
            }
            match self.send_text(telefono, body).await {
                Ok(whatsapp_message_id) => outcome.succeeded.push(SentMessage {
                    telefono: telefono.clone(),
                    whatsapp_message_id,
                }),
                Err(err) => outcome.failed.push(FailedSend {
                    telefono: telefono.clone(),
                    error: err.to_string(),
                }),
            }
        }
        outcome
    }
}
