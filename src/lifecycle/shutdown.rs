//! Signal handling for graceful shutdown

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Shutdown request shared by the tray menu and Ctrl+C
///
/// Clones observe the same flag; triggering it more than once is harmless.
#[derive(Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    /// Create a new shutdown signal handler
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request shutdown; returns false if it was already requested
    pub fn trigger(&self) -> bool {
        let first = self.tx.send_if_modified(|stopped| !std::mem::replace(stopped, true));
        if first {
            debug!("shutdown requested");
        }
        first
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until shutdown is requested or Ctrl+C is received
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();

        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => debug!("received Ctrl+C"),
                Err(e) => {
                    // No console handler; only an explicit trigger can stop us
                    debug!(?e, "Ctrl+C handler unavailable");
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {}
            _ = rx.wait_for(|stopped| *stopped) => {
                debug!("shutdown signal observed");
            }
        }

        self.trigger();
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
