//! Graceful shutdown coordination.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

/// Coordinator for graceful shutdown.
///
/// A stop is requested either by Ctrl+C or by calling [`trigger`](Self::trigger).
/// The request is sticky: futures from [`signal`](Self::signal) created after
/// the trigger resolve immediately.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Receiver of the stop flag, for tasks that poll it between units of work.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Ask every listener to stop accepting connections and drain.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Future resolving once shutdown is requested.
    pub fn signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                        stopped(&mut rx).await;
                    }
                }
                _ = stopped(&mut rx) => {}
            }
            tracing::info!("Shutdown signal received");
        }
    }
}

/// Resolves once the flag is set or every sender is gone.
async fn stopped(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
