use async_trait::async_trait;
use thiserror::Error;

use crate::event::OutboundMessage;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("broker request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("broker returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("{0}")]
    Other(String),
}

/// Pluggable message broker the dispatcher publishes to.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, message: &OutboundMessage) -> Result<(), PublishError>;
}
