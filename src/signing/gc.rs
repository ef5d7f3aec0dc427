//! Periodic purge of expired signed URL records.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;

use crate::signing::signer::UrlSigner;

/// Run `UrlSigner::gc` every `interval` until `shutdown` fires.
///
/// Must be called from within a tokio runtime.
pub fn spawn_garbage_collector(
    signer: Arc<UrlSigner>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval_secs = interval.as_secs(), "Signed URL garbage collector starting");

        let mut ticker = time::interval(interval);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = signer.gc() {
                        tracing::error!(error = %e, "Signed URL garbage collection failed");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Signed URL garbage collector received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::signer::{ManualClock, SigningSecret};
    use crate::signing::storage::{InMemoryStorage, SignedUrlStorage};

    #[tokio::test]
    async fn test_collector_purges_and_stops() {
        let storage = Arc::new(InMemoryStorage::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let signer = Arc::new(
            UrlSigner::new(SigningSecret::generate(), storage.clone()).with_clock(clock.clone()),
        );

        let signed = signer.sign("/a", Duration::from_secs(5), 1).unwrap();
        clock.advance(Duration::from_secs(10));

        let (tx, rx) = broadcast::channel(1);
        let handle = spawn_garbage_collector(signer.clone(), Duration::from_millis(10), rx);

        let mut purged = false;
        for _ in 0..100 {
            if storage.get(&signed.identifier).unwrap().is_none() {
                purged = true;
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        assert!(purged);

        tx.send(()).unwrap();
        time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
