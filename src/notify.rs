//! Account Event Notifications
//!
//! Handlers push one human-readable line per account-lifecycle change
//! (`"registered: <email>"`, `"banned: <email>"`, ...) into a channel; a
//! background publisher forwards each line to the broker topic the relay's
//! bridge consumes. Fire-and-forget: a publish failure is logged, never
//! surfaced to the request that caused it.

use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to create producer: {0}")]
    Producer(#[from] rdkafka::error::KafkaError),
}

/// Publisher configuration
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub brokers: String,
    pub topic: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            topic: "default".to_string(),
        }
    }
}

/// Cheap cloneable handle handlers use to emit an event line.
#[derive(Clone)]
pub struct Notifier {
    events: mpsc::UnboundedSender<String>,
}

impl Notifier {
    /// Create the handle and the receiving end for an [`EventPublisher`].
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { events: tx }, rx)
    }

    pub fn send(&self, event: impl Into<String>) {
        if self.events.send(event.into()).is_err() {
            tracing::debug!("event publisher is gone, notification dropped");
        }
    }
}

/// Drains the notifier channel into the broker.
pub struct EventPublisher {
    producer: FutureProducer,
    topic: String,
    events: mpsc::UnboundedReceiver<String>,
}

impl EventPublisher {
    pub fn new(
        config: &NotifyConfig,
        events: mpsc::UnboundedReceiver<String>,
    ) -> Result<Self, NotifyError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("client.id", "cakehub-api")
            .create()?;

        Ok(Self {
            producer,
            topic: config.topic.clone(),
            events,
        })
    }

    /// Publish until every [`Notifier`] handle is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            let record: FutureRecord<'_, (), String> =
                FutureRecord::to(&self.topic).payload(&event);

            match self.producer.send(record, Duration::from_secs(5)).await {
                Ok(_) => tracing::debug!(%event, "notification published"),
                Err((e, _)) => tracing::warn!(%event, error = %e, "failed to publish notification"),
            }
        }
        tracing::info!("event publisher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_the_default_queue() {
        let config = NotifyConfig::default();
        assert_eq!(config.topic, "default");
    }

    #[tokio::test]
    async fn notifier_lines_arrive_in_order() {
        let (notifier, mut rx) = Notifier::channel();

        notifier.send("registered: a@b.com");
        notifier.send("banned: a@b.com");

        assert_eq!(rx.recv().await.unwrap(), "registered: a@b.com");
        assert_eq!(rx.recv().await.unwrap(), "banned: a@b.com");
    }

    #[tokio::test]
    async fn send_after_publisher_death_is_silent() {
        let (notifier, rx) = Notifier::channel();
        drop(rx);

        notifier.send("updated cake: a@b.com");
    }
}
