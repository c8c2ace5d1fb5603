// src/reload.rs

//! Reload notification channel for connected live-preview clients.
//!
//! The core only guarantees "dev stage completed successfully, or a
//! reload-only pattern matched -> emit reload event". Delivery transport
//! beyond the event is a collaborator concern, so the runtime talks to a
//! trait and production wires in a broadcast channel that transports can
//! subscribe to.

use tokio::sync::broadcast;
use tracing::{debug, info};

/// A single reload signal. `reason` names the stage or changed path that
/// caused it.
#[derive(Debug, Clone)]
pub struct ReloadEvent {
    pub reason: String,
}

pub trait ReloadNotifier: Send + Sync {
    fn notify(&self, event: ReloadEvent);
}

/// Fans reload events out to any number of subscribed receivers.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ReloadEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }
}

impl ReloadNotifier for BroadcastNotifier {
    fn notify(&self, event: ReloadEvent) {
        info!(reason = %event.reason, "reload");
        // No subscribers is fine; the event is simply dropped.
        if self.tx.send(event).is_err() {
            debug!("reload emitted with no connected clients");
        }
    }
}

/// Notifier for one-shot builds: nothing to reload.
#[derive(Debug, Clone, Default)]
pub struct NullNotifier;

impl ReloadNotifier for NullNotifier {
    fn notify(&self, _event: ReloadEvent) {}
}
