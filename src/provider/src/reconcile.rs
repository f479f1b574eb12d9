//! Periodic status reconciliation.
//!
//! Every interval, each pod in the cache is re-read from the runtime. On
//! success the cached status is replaced and the pod is handed to the
//! notifier; on failure the key is logged and skipped, and a pod the
//! runtime reports as gone is dropped from the cache. One bad key never
//! stops the pass or the loop. The loop runs until its handle is shut
//! down or dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use podlet_core::{Pod, PodKey, PodStatus};

use crate::lifecycle::PodLifecycle;

/// Control-plane pod cache the reconciler walks.
#[async_trait]
pub trait PodCache: Send + Sync {
    /// Snapshot of the cached pods.
    async fn pods(&self) -> Vec<Pod>;

    /// Overwrite the cached status of one pod.
    async fn set_status(&self, key: &PodKey, status: PodStatus);

    /// Drop a pod the runtime no longer has. Caches owned elsewhere keep it.
    async fn forget(&self, _key: &PodKey) {}
}

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Delay between passes.
    pub interval: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
        }
    }
}

/// Outcome of one reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub updated: Vec<PodKey>,
    pub failed: Vec<PodKey>,
}

pub struct Reconciler {
    lifecycle: Arc<PodLifecycle>,
    cache: Arc<dyn PodCache>,
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(
        lifecycle: Arc<PodLifecycle>,
        cache: Arc<dyn PodCache>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            lifecycle,
            cache,
            config,
        }
    }

    /// Refresh every cached pod once, sequentially.
    pub async fn reconcile_once(&self) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for mut pod in self.cache.pods().await {
            let key = pod.key();
            match self.lifecycle.get(&pod).await {
                Ok(observed) => {
                    self.cache.set_status(&key, observed.status.clone()).await;
                    pod.status = observed.status;
                    self.lifecycle.notify(pod);
                    report.updated.push(key);
                }
                Err(e) if e.is_not_found() => {
                    tracing::debug!(key = %key, "Pod no longer in runtime");
                    self.cache.forget(&key).await;
                    report.failed.push(key);
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Failed to refresh pod status");
                    report.failed.push(key);
                }
            }
        }

        tracing::debug!(
            updated = report.updated.len(),
            failed = report.failed.len(),
            "Reconcile pass complete"
        );
        report
    }

    /// Run passes every interval on a background task.
    pub fn spawn(self) -> ReconcilerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let interval = self.config.interval;

        let task = tokio::spawn(async move {
            tracing::info!(interval = ?interval, "Reconciler started");
            loop {
                tokio::select! {
                    result = shutdown_rx.changed() => {
                        if result.is_err() || *shutdown_rx.borrow() {
                            tracing::debug!("Reconciler shutting down");
                            break;
                        }
                    }
                    _ = tokio::time::sleep(interval) => {
                        self.reconcile_once().await;
                    }
                }
            }
        });

        ReconcilerHandle { shutdown_tx, task }
    }
}

/// Owner of a running reconciler. Dropping it also stops the loop.
pub struct ReconcilerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Signal the loop to stop and wait for the current pass to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Reconciler task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
