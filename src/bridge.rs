//! Message-Queue Bridge
//!
//! Long-lived consumer of the broker topic carrying account-event lines.
//! Every payload is forwarded verbatim to the hub as one broadcast. The
//! consumer auto-commits, so delivery is at-most-once from the bridge's
//! point of view.
//!
//! Losing the broker is not fatal: the bridge reconnects with exponential
//! backoff, up to a configured attempt limit. Only exhausting the limit ends
//! the task, with an error the supervising binary can act on.

use bytes::Bytes;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::ClientConfig;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

use crate::hub::HubHandle;
use crate::metrics;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("broker error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("gave up after {attempts} reconnect attempts")]
    RetriesExhausted { attempts: u32 },
}

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub brokers: String,
    /// Topic carrying account-event payloads
    pub topic: String,
    pub group_id: String,
    /// Reconnect attempts before the bridge gives up
    pub max_retries: u32,
    /// First backoff; doubles per consecutive failure, capped at 64x
    pub base_backoff: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            topic: "default".to_string(),
            group_id: "cakehub-relay".to_string(),
            max_retries: 10,
            base_backoff: Duration::from_secs(1),
        }
    }
}

/// Consumes the broker topic and broadcasts each payload through the hub.
pub struct QueueBridge {
    config: BridgeConfig,
    hub: HubHandle,
    shutdown: watch::Receiver<bool>,
}

impl QueueBridge {
    pub fn new(config: BridgeConfig, hub: HubHandle, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            config,
            hub,
            shutdown,
        }
    }

    /// Consume until shutdown, reconnecting on broker loss.
    pub async fn run(mut self) -> Result<(), BridgeError> {
        let mut attempts: u32 = 0;

        loop {
            let error = match self.consume(&mut attempts).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            if attempts >= self.config.max_retries {
                tracing::error!(error = %error, attempts, "bridge giving up on the broker");
                return Err(BridgeError::RetriesExhausted { attempts });
            }

            attempts += 1;
            metrics::BRIDGE_RECONNECTS.inc();
            let backoff = self.config.base_backoff * 2u32.saturating_pow(attempts.min(6));
            tracing::warn!(
                error = %error,
                attempts,
                backoff_ms = backoff.as_millis() as u64,
                "bridge lost the broker, retrying"
            );

            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// One consumer session. Returns `Ok` only on shutdown; any broker
    /// failure propagates so the outer loop can back off.
    async fn consume(&mut self, attempts: &mut u32) -> Result<(), BridgeError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.config.brokers)
            .set("group.id", &self.config.group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "latest")
            .set("session.timeout.ms", "45000")
            .create()?;

        consumer.subscribe(&[self.config.topic.as_str()])?;

        tracing::info!(
            brokers = %self.config.brokers,
            topic = %self.config.topic,
            group_id = %self.config.group_id,
            "bridge consuming"
        );

        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        tracing::info!("bridge stopping");
                        return Ok(());
                    }
                }
                received = consumer.recv() => {
                    let message = received?;
                    // A delivered message proves the connection works again.
                    *attempts = 0;
                    if let Some(payload) = message.payload() {
                        tracing::debug!(bytes = payload.len(), "forwarding broker message");
                        self.hub.broadcast(Bytes::copy_from_slice(payload));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_consumes_the_default_queue() {
        let config = BridgeConfig::default();
        assert_eq!(config.topic, "default");
        assert_eq!(config.group_id, "cakehub-relay");
        assert!(config.max_retries > 0);
    }

    #[test]
    fn backoff_growth_is_capped() {
        let config = BridgeConfig::default();
        let late = config.base_backoff * 2u32.saturating_pow(30u32.min(6));
        assert_eq!(late, Duration::from_secs(64));
    }
}
