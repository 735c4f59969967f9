use tokio::sync::broadcast;
use tracing::{debug, info};

/// Fan-out for the shutdown signal. Every long-running component holds a
/// receiver and winds down when it fires.
pub struct ShutdownManager {
    tx: broadcast::Sender<()>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn shutdown(&self) {
        debug!(subscribers = self.tx.receiver_count(), "broadcasting shutdown");
        info!("shutdown requested");
        let _ = self.tx.send(());
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
