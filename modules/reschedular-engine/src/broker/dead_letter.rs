use async_trait::async_trait;
use tracing::warn;

use super::backend::PublishError;
use crate::event::OutboundMessage;

/// Receives messages the dispatcher gave up on.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn record(&self, message: &OutboundMessage, error: &PublishError);
}

/// Logs and drops. The default sink.
pub struct LogDeadLetter;

#[async_trait]
impl DeadLetterSink for LogDeadLetter {
    async fn record(&self, message: &OutboundMessage, error: &PublishError) {
        warn!(
            event_type = %message.body,
            attributes = ?message.attributes,
            error = %error,
            "Dropping undeliverable event"
        );
    }
}
