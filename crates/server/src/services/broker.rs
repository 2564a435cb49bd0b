//! Per-session streaming token broker.
//!
//! The completion task publishes tokens into an unbounded per-session
//! channel; the SSE route drains it. Publishing without a consumer is a
//! silent no-op. Opening a channel for a session that already has one
//! replaces it, so the most recent stream connection wins; the stale
//! handle's drop is generation-guarded and cannot tear down its
//! replacement.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;

use shopmate_core::SessionKey;

/// One element of a session's token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    /// An incremental text fragment.
    Token(String),
    /// The completion failed; a terminal item.
    Error(String),
    /// The response finished normally; a terminal item.
    Done,
}

struct Channel {
    tx: mpsc::UnboundedSender<StreamItem>,
    generation: u64,
}

/// Registry of live per-session token channels.
#[derive(Clone, Default)]
pub struct StreamBroker {
    inner: Arc<BrokerInner>,
}

#[derive(Default)]
struct BrokerInner {
    channels: Mutex<HashMap<SessionKey, Channel>>,
    next_generation: AtomicU64,
}

impl StreamBroker {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or replace) the token channel for a session.
    ///
    /// Any previous channel for the same session is dropped, which closes
    /// the earlier consumer's stream.
    #[must_use]
    pub fn open(&self, session: &SessionKey) -> StreamHandle {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut channels = self
            .inner
            .channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        channels.insert(session.clone(), Channel { tx, generation });
        StreamHandle {
            broker: Arc::clone(&self.inner),
            session: session.clone(),
            generation,
            rx,
        }
    }

    /// Send an item to the session's consumer, if one is connected.
    pub fn publish(&self, session: &SessionKey, item: StreamItem) {
        let channels = self
            .inner
            .channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(channel) = channels.get(session) {
            // A closed receiver is indistinguishable from no consumer.
            let _ = channel.tx.send(item);
        }
    }

    /// Whether a consumer is currently connected for the session.
    #[must_use]
    pub fn is_open(&self, session: &SessionKey) -> bool {
        self.inner
            .channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains_key(session)
    }
}

impl BrokerInner {
    fn close(&self, session: &SessionKey, generation: u64) {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        // Only the handle that currently owns the slot may vacate it; a
        // replaced handle's late drop leaves the new channel alone.
        if channels
            .get(session)
            .is_some_and(|channel| channel.generation == generation)
        {
            channels.remove(session);
        }
    }
}

/// Consumer side of a session's token channel. Closing (dropping) it
/// deregisters the channel unless it has already been replaced.
pub struct StreamHandle {
    broker: Arc<BrokerInner>,
    session: SessionKey,
    generation: u64,
    rx: mpsc::UnboundedReceiver<StreamItem>,
}

impl StreamHandle {
    /// Receive the next item, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when the producer side is gone and the channel
    /// is drained, `Err(Elapsed)` on timeout.
    pub async fn recv_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<StreamItem>, tokio::time::error::Elapsed> {
        tokio::time::timeout(timeout, self.rx.recv()).await
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.broker.close(&self.session, self.generation);
    }
}
