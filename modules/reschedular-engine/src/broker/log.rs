use async_trait::async_trait;
use tracing::info;

use super::backend::{Broker, PublishError};
use crate::event::OutboundMessage;

/// Logs each message instead of sending it. Used when no broker is configured.
pub struct LogBroker;

#[async_trait]
impl Broker for LogBroker {
    async fn publish(&self, message: &OutboundMessage) -> Result<(), PublishError> {
        info!(
            event_type = %message.body,
            attributes = ?message.attributes,
            "Publishing event (log only)"
        );
        Ok(())
    }
}
