//! Shutdown coordination.

use tokio::sync::broadcast;

/// Graceful shutdown fan-out.
///
/// The server and any background task hold a receiver from [`subscribe`];
/// [`trigger`] wakes all of them once. Clones share the same channel.
///
/// [`subscribe`]: Shutdown::subscribe
/// [`trigger`]: Shutdown::trigger
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Wake every subscriber. A no-op when nobody is listening.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Receivers still alive.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
