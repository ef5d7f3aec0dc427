//! Background task coordination.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Long-running tasks started after boot, stopped together.
pub struct BackgroundTasks {
    tx: broadcast::Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            handles: Vec::new(),
        }
    }

    /// Receiver a task listens on for the stop signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn track(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Signal every task and wait up to `deadline` for each to finish.
    pub async fn shutdown(self, deadline: Duration) {
        let _ = self.tx.send(());
        for handle in self.handles {
            match tokio::time::timeout(deadline, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Background task panicked"),
                Err(_) => tracing::warn!("Background task did not stop before the deadline"),
            }
        }
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}
