//! Receive listener registry
//!
//! An in-memory map of file key -> receiver channel. The channel exists
//! only while at least one upload for that key is in flight; whichever
//! upload finishes first signals it, releasing every other handler that
//! is still copying the same content.
//!
//! This only arbitrates between handlers within one process. Integrity
//! under unexpected multi-writer scenarios is guaranteed by the
//! size/checksum verification gate plus the idempotent promote.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use crate::storage::FileKey;

const MONITOR_INTERVAL: Duration = Duration::from_secs(60);

/// Ephemeral per-key synchronization handle. Signal-once, idempotent;
/// observed by every current waiter and by any waiter that subscribes
/// before the key is re-registered.
#[derive(Debug, Clone)]
pub struct ReceiverChannel {
    rx: watch::Receiver<bool>,
}

impl ReceiverChannel {
    /// Resolves once another upload for the same key has completed.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // Ok: signalled. Err: sender dropped, which also releases us.
        let _ = rx.wait_for(|signalled| *signalled).await;
    }
}

/// Registry coordinating concurrent uploads for identical file keys.
#[derive(Debug, Clone)]
pub struct ReceiveListenerRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Debug)]
struct RegistryInner {
    /// Lock is held for map operations only, never across I/O.
    channels: RwLock<HashMap<FileKey, watch::Sender<bool>>>,
}

impl ReceiveListenerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                channels: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Return the receiver channel for `key`, registering a new one if
    /// none exists. At most one channel exists per key at any instant.
    pub async fn acquire(&self, key: &FileKey) -> ReceiverChannel {
        let mut channels = self.inner.channels.write().await;
        let tx = channels
            .entry(key.clone())
            .or_insert_with(|| watch::channel(false).0);
        ReceiverChannel { rx: tx.subscribe() }
    }

    /// Broadcast completion for `key` and drop the registration. Safe to
    /// call when nothing is registered.
    pub async fn signal_and_remove(&self, key: &FileKey) {
        let tx = self.inner.channels.write().await.remove(key);
        if let Some(tx) = tx {
            let _ = tx.send(true);
        }
    }

    /// Number of keys currently being coordinated.
    pub async fn outstanding(&self) -> usize {
        self.inner.channels.read().await.len()
    }

    /// Low-frequency diagnostic sweep reporting the number of outstanding
    /// keys. Not load-bearing for correctness.
    pub fn spawn_monitor(&self) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(MONITOR_INTERVAL);
            interval.tick().await;
            let mut last_reported = usize::MAX;
            loop {
                interval.tick().await;
                let outstanding = registry.outstanding().await;
                if outstanding > 0 {
                    tracing::debug!(outstanding, "receiving files");
                } else if last_reported != 0 {
                    tracing::debug!("no receive listener channels");
                }
                last_reported = outstanding;
            }
        })
    }
}

impl Default for ReceiveListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
