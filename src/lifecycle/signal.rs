use std::sync::Arc;

use anyhow::Result;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::info;

use crate::lifecycle::coordinator::Lifecycle;

/// Read side of the coordinator's shutdown broadcast.
///
/// Every clone observes the same one-shot transition; once cancelled it
/// stays cancelled.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub(crate) fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested (or the coordinator is gone).
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Bridges SIGINT / SIGTERM to [`Lifecycle::cancel`].
pub(crate) fn bridge_os_signals(lifecycle: Arc<Lifecycle>) -> Result<()> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let quit = lifecycle.quit();

    tokio::spawn(async move {
        tokio::select! {
            _ = interrupt.recv() => info!("catch interrupt signal"),
            _ = terminate.recv() => info!("catch terminate signal"),
            _ = quit.cancelled() => return,
        }
        lifecycle.cancel();
    });
    Ok(())
}
