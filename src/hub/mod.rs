//! Broadcast Hub
//!
//! Fans notification payloads out to every connected client without letting
//! a slow or dead client stall delivery to the rest.
//!
//! ## Architecture
//!
//! - **Hub**: single task that owns the registry of live sinks and serves
//!   register/unregister/broadcast requests from one intake queue
//! - **HubHandle**: cloneable handle producers and connection acceptors use
//!   to submit requests
//! - **ClientSink**: per-connection receive capability with a bounded
//!   outbound queue ([`ChannelSink`] is the channel-backed implementation)
//!
//! The registry is never shared: all mutation and all fan-out happen on the
//! hub task, so request order fully determines which sinks observe which
//! broadcasts. Delivery is a non-blocking enqueue; a sink whose queue is full
//! or already closed is dropped from the registry on the spot.

mod sink;

pub use sink::{ChannelSink, ClientSink, EnqueueError, Outbound, SinkId};

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::metrics;

/// Requests served by the hub task, in strict arrival order
enum HubCommand {
    Register(Arc<dyn ClientSink>),
    Unregister(SinkId),
    Broadcast(Bytes),
    Count(oneshot::Sender<usize>),
}

/// Handle for submitting requests to a running [`Hub`]
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    /// Add a sink to the registry.
    ///
    /// The caller must not register the same sink twice; the hub does not
    /// check, and a duplicate would receive every broadcast twice.
    pub fn register(&self, sink: Arc<dyn ClientSink>) {
        self.send(HubCommand::Register(sink));
    }

    /// Remove a sink from the registry and close it.
    ///
    /// Unregistering a sink that is not (or no longer) registered is a no-op,
    /// so both halves of a connection may call this on failure.
    pub fn unregister(&self, id: SinkId) {
        self.send(HubCommand::Unregister(id));
    }

    /// Broadcast one payload to every sink registered at the moment the hub
    /// processes this request.
    pub fn broadcast(&self, payload: impl Into<Bytes>) {
        self.send(HubCommand::Broadcast(payload.into()));
    }

    /// Number of currently registered sinks.
    ///
    /// Served in arrival order like every other request, so the answer
    /// reflects all requests submitted before it.
    pub async fn client_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        self.send(HubCommand::Count(tx));
        rx.await.unwrap_or(0)
    }

    fn send(&self, command: HubCommand) {
        if self.commands.send(command).is_err() {
            tracing::debug!("hub is gone, request dropped");
        }
    }
}

/// The broadcast router: exclusive owner of the sink registry.
pub struct Hub {
    commands: mpsc::UnboundedReceiver<HubCommand>,
    registry: HashMap<SinkId, Arc<dyn ClientSink>>,
}

impl Hub {
    /// Create a hub and a first handle to it.
    pub fn new() -> (Self, HubHandle) {
        let (tx, rx) = mpsc::unbounded_channel();

        let hub = Self {
            commands: rx,
            registry: HashMap::new(),
        };

        (hub, HubHandle { commands: tx })
    }

    /// Run the request loop until every handle is dropped, then close all
    /// remaining sinks.
    ///
    /// The loop suspends only while waiting for the next request; delivery
    /// itself never blocks.
    pub async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                HubCommand::Register(sink) => {
                    let id = sink.id();
                    self.registry.insert(id, sink);
                    tracing::info!(sink_id = %id, clients = self.registry.len(), "client registered");
                }
                HubCommand::Unregister(id) => {
                    if let Some(sink) = self.registry.remove(&id) {
                        sink.close();
                        tracing::info!(sink_id = %id, clients = self.registry.len(), "client unregistered");
                    }
                }
                HubCommand::Broadcast(payload) => {
                    self.deliver(payload);
                }
                HubCommand::Count(reply) => {
                    let _ = reply.send(self.registry.len());
                }
            }
        }

        // Intake closed: shutdown. No drain guarantee, just release clients.
        for (_, sink) in self.registry.drain() {
            sink.close();
        }
        tracing::info!("hub stopped");
    }

    /// Enqueue one payload to every registered sink; drop the sinks that
    /// cannot take it.
    fn deliver(&mut self, payload: Bytes) {
        let mut dead = Vec::new();

        for (id, sink) in &self.registry {
            match sink.enqueue(payload.clone()) {
                Ok(()) => {}
                Err(reason) => dead.push((*id, reason)),
            }
        }

        for (id, reason) in dead {
            if let Some(sink) = self.registry.remove(&id) {
                sink.close();
                metrics::DROPPED_CLIENTS.inc();
                tracing::warn!(sink_id = %id, %reason, "dropping client");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;
    use uuid::Uuid;

    async fn recv(out: &mut Outbound) -> Bytes {
        timeout(Duration::from_secs(1), out.next())
            .await
            .expect("timed out waiting for frame")
            .expect("sink finished unexpectedly")
    }

    fn start_hub() -> HubHandle {
        let (hub, handle) = Hub::new();
        tokio::spawn(hub.run());
        handle
    }

    #[tokio::test]
    async fn broadcast_reaches_all_registered_sinks() {
        let handle = start_hub();
        let (a, mut a_out) = ChannelSink::new(8);
        let (b, mut b_out) = ChannelSink::new(8);

        handle.register(a);
        handle.register(b);
        handle.broadcast("hello");

        assert_eq!(recv(&mut a_out).await, Bytes::from_static(b"hello"));
        assert_eq!(recv(&mut b_out).await, Bytes::from_static(b"hello"));
        assert_eq!(handle.client_count().await, 2);
    }

    #[tokio::test]
    async fn unregistered_sink_misses_later_broadcasts() {
        let handle = start_hub();
        let (a, mut a_out) = ChannelSink::new(8);
        let id = a.id();

        handle.register(a);
        handle.broadcast("x");
        handle.unregister(id);
        handle.broadcast("y");
        assert_eq!(handle.client_count().await, 0);

        // "x" was buffered before the unregister; "y" never reaches the sink.
        assert_eq!(recv(&mut a_out).await, Bytes::from_static(b"x"));
        assert!(a_out.next().await.is_none());
    }

    #[tokio::test]
    async fn unregistering_unknown_sink_is_noop() {
        let handle = start_hub();
        let (a, _a_out) = ChannelSink::new(8);

        handle.register(a);
        handle.unregister(Uuid::new_v4());
        handle.unregister(Uuid::new_v4());

        assert_eq!(handle.client_count().await, 1);
    }

    #[tokio::test]
    async fn slow_client_is_dropped_not_waited_for() {
        let handle = start_hub();
        let (slow, mut slow_out) = ChannelSink::new(1);
        let (fast, mut fast_out) = ChannelSink::new(8);

        handle.register(slow);
        handle.register(fast);

        // Second broadcast overflows the capacity-1 queue: the slow client is
        // removed within that broadcast and the third is never attempted on it.
        handle.broadcast("x");
        handle.broadcast("y");
        handle.broadcast("z");
        assert_eq!(handle.client_count().await, 1);

        assert_eq!(recv(&mut slow_out).await, Bytes::from_static(b"x"));
        assert!(slow_out.next().await.is_none());

        assert_eq!(recv(&mut fast_out).await, Bytes::from_static(b"x"));
        assert_eq!(recv(&mut fast_out).await, Bytes::from_static(b"y"));
        assert_eq!(recv(&mut fast_out).await, Bytes::from_static(b"z"));
    }

    #[tokio::test]
    async fn already_closed_sink_is_pruned_on_broadcast() {
        let handle = start_hub();
        let (a, _a_out) = ChannelSink::new(8);
        let closer = a.clone();

        handle.register(a);
        assert_eq!(handle.client_count().await, 1);

        closer.close();
        handle.broadcast("x");
        assert_eq!(handle.client_count().await, 0);
    }

    #[tokio::test]
    async fn delivery_preserves_submission_order() {
        let handle = start_hub();
        let (a, mut a_out) = ChannelSink::new(64);

        handle.register(a);
        for i in 0..10 {
            handle.broadcast(format!("event-{i}"));
        }

        for i in 0..10 {
            assert_eq!(recv(&mut a_out).await, Bytes::from(format!("event-{i}")));
        }
    }

    #[tokio::test]
    async fn payloads_are_forwarded_verbatim() {
        let handle = start_hub();
        let (a, mut a_out) = ChannelSink::new(8);
        let (b, mut b_out) = ChannelSink::new(8);

        handle.register(a);
        handle.register(b);
        handle.broadcast("banned: a@b.com");

        assert_eq!(recv(&mut a_out).await, Bytes::from_static(b"banned: a@b.com"));
        assert_eq!(recv(&mut b_out).await, Bytes::from_static(b"banned: a@b.com"));
    }

    #[tokio::test]
    async fn shutdown_closes_remaining_sinks() {
        let (hub, handle) = Hub::new();
        let task = tokio::spawn(hub.run());
        let (a, mut a_out) = ChannelSink::new(8);

        handle.register(a);
        assert_eq!(handle.client_count().await, 1);

        drop(handle);
        timeout(Duration::from_secs(1), task)
            .await
            .expect("hub did not stop")
            .unwrap();

        assert!(a_out.next().await.is_none());
    }
}
