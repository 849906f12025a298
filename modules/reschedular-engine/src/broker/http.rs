use async_trait::async_trait;
use tracing::{debug, warn};

use super::backend::{Broker, PublishError};
use crate::event::OutboundMessage;

/// Publishes each message as a JSON POST to a queue ingestion endpoint.
pub struct HttpBroker {
    url: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl HttpBroker {
    pub fn new(url: String, token: Option<String>) -> Self {
        Self {
            url,
            token,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Broker for HttpBroker {
    async fn publish(&self, message: &OutboundMessage) -> Result<(), PublishError> {
        let mut request = self.http.post(&self.url).json(message);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Broker returned non-success");
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(event_type = %message.body, "Published to broker");
        Ok(())
    }
}
