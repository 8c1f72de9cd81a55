//! Coordinated shutdown signal shared by every background loop (spec §5,
//! "CONCURRENCY & RESOURCE MODEL").
//!
//! One `broadcast::Sender<()>` reaches an open-ended set of subscribers —
//! the retention sweep, the snapshot flush, and the directory announce loop
//! all race it against their own interval tick in `tokio::select!`.

use tokio::sync::broadcast;

#[derive(Clone)]
pub struct Lifecycle {
    shutdown: broadcast::Sender<()>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self { shutdown }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown.subscribe()
    }

    /// Fires the shutdown signal to every current subscriber. Idempotent in
    /// practice: a second send just reaches zero receivers and errors, which
    /// we ignore.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
