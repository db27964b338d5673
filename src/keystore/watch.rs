use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use super::KeyStore;

/// Background ticker that expires the key on time even when nobody reads it,
/// and publishes the remaining TTL for countdown displays.
pub struct ExpiryWatch {
    remaining: watch::Receiver<Option<Duration>>,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ExpiryWatch {
    pub fn remaining(&self) -> watch::Receiver<Option<Duration>> {
        self.remaining.clone()
    }

    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.task.await;
    }
}

pub fn spawn_expiry_watch(store: Arc<Mutex<KeyStore>>, period: Duration) -> ExpiryWatch {
    let initial = store.lock().ok().and_then(|s| s.remaining_ttl());
    let (tx, remaining) = watch::channel(initial);
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let left = match store.lock() {
                        Ok(mut guard) => {
                            if let Err(e) = guard.expire_if_due() {
                                tracing::warn!(error = %e, "Failed to clear expired key");
                            }
                            guard.remaining_ttl()
                        }
                        Err(_) => {
                            tracing::error!("Key store mutex poisoned, stopping expiry watch");
                            break;
                        }
                    };
                    tx.send_if_modified(|current| {
                        let changed = *current != left;
                        *current = left;
                        changed
                    });
                }
                _ = &mut stop_rx => break,
            }
        }
        tracing::debug!("Expiry watch exiting");
    });

    ExpiryWatch { remaining, stop_tx, task }
}

/// `MM:SS`, or `00:00` when there is nothing left.
pub fn format_countdown(remaining: Option<Duration>) -> String {
    let secs = remaining.map_or(0, |d| d.as_secs());
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
