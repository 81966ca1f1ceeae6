//! Dispatcher: delivers rendered messages through a [`MessageSink`].

use std::sync::Arc;

use pipeline::{ChannelId, DeliveryError, MessageSink};
use tracing::{error, info, warn};

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReport {
    pub channel: ChannelId,
    /// 1-based position within the run's messages (match rank for lookups).
    pub position: usize,
    pub result: Result<(), DeliveryError>,
}

impl DeliveryReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    sink: Arc<dyn MessageSink>,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self { sink }
    }

    /// Posts one message, logging the outcome.
    pub async fn deliver(&self, channel: &ChannelId, text: &str) -> Result<(), DeliveryError> {
        match self.sink.post_message(channel, text).await {
            Ok(()) => {
                info!(channel = %channel, chars = text.len(), "Message delivered");
                Ok(())
            }
            Err(e) => {
                error!(channel = %channel, error = %e, "Message delivery failed");
                Err(e)
            }
        }
    }

    /// Posts every message in order, one independent call each. A failure
    /// never stops later messages from being sent.
    pub async fn deliver_all(&self, channel: &ChannelId, messages: &[String]) -> Vec<DeliveryReport> {
        let mut reports = Vec::with_capacity(messages.len());
        for (i, text) in messages.iter().enumerate() {
            let result = self.deliver(channel, text).await;
            reports.push(DeliveryReport {
                channel: channel.clone(),
                position: i + 1,
                result,
            });
        }
        reports
    }

    /// Best-effort notice to a waiting user (acknowledgements, rejections).
    pub async fn notify(&self, channel: &ChannelId, text: &str) {
        if let Err(e) = self.sink.post_message(channel, text).await {
            warn!(channel = %channel, error = %e, "Could not send notice");
        }
    }
}
