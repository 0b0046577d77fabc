//! Client Sink Abstraction
//!
//! A sink represents one connected client's ability to receive payloads,
//! independent of the wire transport behind it. The hub only ever talks to
//! the [`ClientSink`] trait; the concrete [`ChannelSink`] pairs a bounded
//! frame queue with a close signal so a write task can drain it.

use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// Unique identifier for a live sink
pub type SinkId = Uuid;

/// Why a payload could not be enqueued onto a sink
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    /// The sink's outbound queue is at capacity (consumer too slow)
    #[error("outbound queue is full")]
    Full,

    /// The sink has been closed; no further delivery is possible
    #[error("sink is closed")]
    Closed,
}

/// One connected client's receive capability.
///
/// `enqueue` must never block: the hub's run loop calls it for every
/// registered sink on every broadcast and must not stall on any one client.
pub trait ClientSink: Send + Sync {
    /// Identity of this sink, stable for its whole lifetime
    fn id(&self) -> SinkId;

    /// Attempt a non-blocking enqueue of one payload
    fn enqueue(&self, payload: Bytes) -> Result<(), EnqueueError>;

    /// Close the sink. Idempotent; after this call no payload is delivered
    /// and any pending drain terminates once buffered frames are consumed.
    fn close(&self);
}

/// Channel-backed sink: bounded frame queue plus a close flag.
///
/// The hub holds the sending half; the connection's write task drains the
/// paired [`Outbound`]. Single-producer/single-consumer by construction.
pub struct ChannelSink {
    id: SinkId,
    frames: mpsc::Sender<Bytes>,
    closed: watch::Sender<bool>,
}

impl ChannelSink {
    /// Create a sink with the given outbound queue capacity.
    ///
    /// Returns the sink (for registration with the hub) and the [`Outbound`]
    /// end the connection's write task drains.
    pub fn new(capacity: usize) -> (Arc<Self>, Outbound) {
        let (frames_tx, frames_rx) = mpsc::channel(capacity);
        let (closed_tx, closed_rx) = watch::channel(false);

        let sink = Arc::new(Self {
            id: Uuid::new_v4(),
            frames: frames_tx,
            closed: closed_tx,
        });

        let outbound = Outbound {
            frames: frames_rx,
            closed: closed_rx,
            draining: false,
        };

        (sink, outbound)
    }
}

impl ClientSink for ChannelSink {
    fn id(&self) -> SinkId {
        self.id
    }

    fn enqueue(&self, payload: Bytes) -> Result<(), EnqueueError> {
        if *self.closed.borrow() {
            return Err(EnqueueError::Closed);
        }

        self.frames.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    fn close(&self) {
        self.closed.send_replace(true);
    }
}

/// Consumer end of a [`ChannelSink`].
///
/// Owned by the connection's write task. Yields frames in enqueue order and
/// returns `None` once the sink is closed and all buffered frames are drained.
pub struct Outbound {
    frames: mpsc::Receiver<Bytes>,
    closed: watch::Receiver<bool>,
    draining: bool,
}

impl Outbound {
    /// Wait for the next frame, or `None` once the sink is finished.
    pub async fn next(&mut self) -> Option<Bytes> {
        loop {
            if self.draining {
                // Sink closed: hand out whatever is still buffered, then end.
                return self.frames.try_recv().ok();
            }

            tokio::select! {
                biased;
                frame = self.frames.recv() => return frame,
                changed = self.closed.changed() => {
                    if changed.is_err() || *self.closed.borrow() {
                        self.draining = true;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_then_drain() {
        let (sink, mut out) = ChannelSink::new(4);

        sink.enqueue(Bytes::from_static(b"one")).unwrap();
        sink.enqueue(Bytes::from_static(b"two")).unwrap();

        assert_eq!(out.next().await.unwrap(), Bytes::from_static(b"one"));
        assert_eq!(out.next().await.unwrap(), Bytes::from_static(b"two"));
    }

    #[tokio::test]
    async fn full_queue_reports_backpressure() {
        let (sink, _out) = ChannelSink::new(1);

        sink.enqueue(Bytes::from_static(b"x")).unwrap();
        assert_eq!(
            sink.enqueue(Bytes::from_static(b"y")),
            Err(EnqueueError::Full)
        );
    }

    #[tokio::test]
    async fn closed_sink_rejects_enqueue() {
        let (sink, _out) = ChannelSink::new(4);

        sink.close();
        assert_eq!(
            sink.enqueue(Bytes::from_static(b"x")),
            Err(EnqueueError::Closed)
        );
    }

    #[tokio::test]
    async fn close_is_idempotent_and_drain_terminates() {
        let (sink, mut out) = ChannelSink::new(4);

        sink.enqueue(Bytes::from_static(b"last")).unwrap();
        sink.close();
        sink.close();

        // Buffered frame is still delivered, then the drain ends.
        assert_eq!(out.next().await.unwrap(), Bytes::from_static(b"last"));
        assert!(out.next().await.is_none());
    }

    #[tokio::test]
    async fn drain_ends_immediately_when_nothing_buffered() {
        let (sink, mut out) = ChannelSink::new(4);

        sink.close();
        assert!(out.next().await.is_none());
    }
}
