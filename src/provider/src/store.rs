//! In-memory pod cache.
//!
//! Holds the control plane's view of the pods on this node, keyed by
//! [`PodKey`]. The reconciler reads it and writes refreshed status back.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use podlet_core::{Pod, PodKey, PodStatus};

use crate::lifecycle::Notifier;
use crate::reconcile::PodCache;

/// In-memory store for pods known to the control plane.
pub struct PodStore {
    pods: Arc<RwLock<BTreeMap<PodKey, Pod>>>,
}

impl PodStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            pods: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Insert or replace a pod under its own key.
    pub async fn upsert(&self, pod: Pod) {
        let mut store = self.pods.write().await;
        store.insert(pod.key(), pod);
    }

    /// Get a pod by key.
    pub async fn get(&self, key: &PodKey) -> Option<Pod> {
        let store = self.pods.read().await;
        store.get(key).cloned()
    }

    /// Remove a pod by key.
    pub async fn remove(&self, key: &PodKey) -> Option<Pod> {
        let mut store = self.pods.write().await;
        store.remove(key)
    }

    /// All pods, in key order.
    pub async fn list(&self) -> Vec<Pod> {
        let store = self.pods.read().await;
        store.values().cloned().collect()
    }

    /// Number of cached pods.
    pub async fn len(&self) -> usize {
        self.pods.read().await.len()
    }

    /// Whether no pods are cached.
    pub async fn is_empty(&self) -> bool {
        self.pods.read().await.is_empty()
    }

    /// Replace the status of a cached pod. Returns false if it is unknown.
    pub async fn update_status(&self, key: &PodKey, status: PodStatus) -> bool {
        let mut store = self.pods.write().await;
        if let Some(pod) = store.get_mut(key) {
            pod.status = status;
            true
        } else {
            false
        }
    }
}

/// Notifier that applies refreshed status to pods already in `store`.
///
/// Notifications are applied one at a time in the order they were sent.
/// Pods that are not cached are ignored. The returned task ends once the
/// notifier and all its clones are dropped.
pub fn status_notifier(store: Arc<PodStore>) -> (Notifier, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Pod>();

    let task = tokio::spawn(async move {
        while let Some(pod) = rx.recv().await {
            let key = pod.key();
            if !store.update_status(&key, pod.status).await {
                tracing::debug!(key = %key, "Status for uncached pod ignored");
            }
        }
    });

    let notifier: Notifier = Arc::new(move |pod: Pod| {
        // Fails only once the task is gone, when nobody reads the cache.
        let _ = tx.send(pod);
    });
    (notifier, task)
}

impl Default for PodStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PodCache for PodStore {
    async fn pods(&self) -> Vec<Pod> {
        self.list().await
    }

    async fn set_status(&self, key: &PodKey, status: PodStatus) {
        self.update_status(key, status).await;
    }

    async fn forget(&self, key: &PodKey) {
        self.remove(key).await;
    }
}
