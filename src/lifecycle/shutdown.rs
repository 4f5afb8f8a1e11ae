//! Shutdown coordination for the proxy.
//!
//! The trigger is a latched flag rather than a one-shot message: a listener
//! that subscribes after the trigger (a signal arriving mid-startup) still
//! stops.

use std::sync::Arc;

use tokio::sync::watch;

/// Coordinator for graceful shutdown.
///
/// Every listener takes a [`ShutdownSignal`]; one trigger stops them all.
#[derive(Debug, Clone)]
pub struct Shutdown {
    stopped: Arc<watch::Sender<bool>>,
}

/// One listener's handle on the shutdown trigger.
#[derive(Debug)]
pub struct ShutdownSignal {
    stopped: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            stopped: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            stopped: self.stopped.subscribe(),
        }
    }

    /// Stop every current and future subscriber. Idempotent.
    pub fn trigger(&self) {
        if !self.stopped.send_replace(true) {
            tracing::info!(listeners = self.stopped.receiver_count(), "Shutdown triggered");
        }
    }

    /// Listeners still holding a signal.
    pub fn receiver_count(&self) -> usize {
        self.stopped.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Resolve once shutdown is triggered, or once every [`Shutdown`] handle
    /// is gone.
    pub async fn recv(mut self) {
        let _ = self.stopped.wait_for(|stopped| *stopped).await;
    }
}
