//! Periodic Heartbeat Producer
//!
//! Broadcasts an RFC 3339 timestamp on a fixed interval so clients have a
//! liveness signal even when no account events flow.

use chrono::Utc;
use std::time::Duration;
use tokio::sync::watch;

use crate::hub::HubHandle;

pub struct Heartbeat {
    interval: Duration,
    hub: HubHandle,
    shutdown: watch::Receiver<bool>,
}

impl Heartbeat {
    pub fn new(interval: Duration, hub: HubHandle, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            interval,
            hub,
            shutdown,
        }
    }

    /// Tick until shutdown.
    pub async fn run(mut self) {
        let mut ticks = tokio::time::interval(self.interval);
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
                _ = ticks.tick() => {
                    self.hub.broadcast(Utc::now().to_rfc3339());
                }
            }
        }
        tracing::info!("heartbeat stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{ChannelSink, Hub};
    use tokio::time::timeout;

    #[tokio::test]
    async fn emits_parseable_timestamps_until_stopped() {
        let (hub, handle) = Hub::new();
        tokio::spawn(hub.run());

        let (sink, mut out) = ChannelSink::new(8);
        handle.register(sink);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let beat = Heartbeat::new(Duration::from_millis(10), handle.clone(), shutdown_rx);
        let task = tokio::spawn(beat.run());

        let frame = timeout(Duration::from_secs(1), out.next())
            .await
            .expect("no heartbeat arrived")
            .expect("sink closed");
        let text = String::from_utf8(frame.to_vec()).unwrap();
        chrono::DateTime::parse_from_rfc3339(&text).expect("heartbeat is not RFC 3339");

        shutdown_tx.send_replace(true);
        timeout(Duration::from_secs(1), task)
            .await
            .expect("heartbeat did not stop")
            .unwrap();
    }
}
