//! Pod lifecycle against the runtime.
//!
//! Per pod key: `Absent → Creating → Running → Absent` through
//! [`PodLifecycle::delete`], or back to `Creating` through
//! [`PodLifecycle::update`] (delete, then create). Nothing is changed in
//! place.
//!
//! Create runs as a fixed sequence of steps: validate, ensure host
//! volumes, create the pod, pull and create each container, start the pod,
//! then poll health. A failed step returns its error and leaves earlier
//! steps in place. The partial pod is visible to [`PodLifecycle::get`], so
//! a retried [`PodLifecycle::create_or_update`] replaces it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;

use podlet_core::pod::{HostPathType, Pod};
use podlet_core::stats::{ContainerStats, CpuStats, MemoryStats, PodReference, PodStats};
use podlet_core::{PodletError, Result};
use podlet_runtime::{RuntimeClient, RuntimePodRecord};

use crate::error::classify;
use crate::translate;

/// Callback receiving every pod whose observed state was refreshed.
pub type Notifier = Arc<dyn Fn(Pod) + Send + Sync>;

/// Lifecycle tunables.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Inspections after start-pod while waiting for containers to run.
    pub health_poll_attempts: u32,
    /// Delay between health inspections.
    pub health_poll_interval: Duration,
    /// Stamped into `status.hostIP` of every observed pod when non-empty.
    pub host_ip: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            health_poll_attempts: 4,
            health_poll_interval: Duration::from_millis(100),
            host_ip: String::new(),
        }
    }
}

/// Lifecycle orchestrator over one serialized runtime client.
pub struct PodLifecycle {
    client: Arc<RuntimeClient>,
    config: LifecycleConfig,
    notifier: RwLock<Option<Notifier>>,
}

impl PodLifecycle {
    /// Create a lifecycle over `client` with no notifier registered.
    pub fn new(client: Arc<RuntimeClient>, config: LifecycleConfig) -> Self {
        Self {
            client,
            config,
            notifier: RwLock::new(None),
        }
    }

    /// Register the status callback. Until one is set notifications are
    /// dropped.
    pub fn set_notifier(&self, notifier: Notifier) {
        *self.notifier.write() = Some(notifier);
    }

    /// Hand a pod to the registered callback, if any.
    pub fn notify(&self, pod: Pod) {
        // Clone the callback out so it never runs under the lock.
        let notifier = self.notifier.read().clone();
        if let Some(notifier) = notifier {
            notifier(pod);
        }
    }

    /// Create the pod in the runtime and return its observed state.
    pub async fn create(&self, pod: &Pod) -> Result<Pod> {
        self.provision(pod).await?;
        let observed = self.get(pod).await?;
        self.notify(observed.clone());
        Ok(observed)
    }

    /// Replace the pod: delete, then create.
    pub async fn update(&self, pod: &Pod) -> Result<Pod> {
        self.delete(pod).await?;
        self.provision(pod).await?;
        let observed = self.get(pod).await?;
        self.notify(observed.clone());
        Ok(observed)
    }

    /// Force-remove the runtime pod and its containers.
    pub async fn delete(&self, pod: &Pod) -> Result<()> {
        validate_key(pod)?;
        let key = pod.key();
        tracing::info!(key = %key, "Deleting pod");

        self.client
            .remove_pod(&key.to_string(), true)
            .await
            .map_err(|e| {
                tracing::warn!(key = %key, error = %e, "Failed to delete pod");
                classify(e)
            })?;
        Ok(())
    }

    /// Read the runtime's current view of `pod`.
    pub async fn get(&self, pod: &Pod) -> Result<Pod> {
        self.get_by_name(&pod.key().to_string()).await
    }

    /// Observed pod for a runtime pod name.
    pub async fn get_by_name(&self, name: &str) -> Result<Pod> {
        self.client.get_pod(name).await.map_err(classify)?;

        let raw = self.client.inspect_pod(name).await.map_err(classify)?;
        if raw.trim().is_empty() {
            return Err(PodletError::NotFound(format!(
                "runtime returned no inspection data for {}",
                name
            )));
        }

        let mut pod = translate::from_runtime_json(&raw)?;
        if !self.config.host_ip.is_empty() {
            pod.status.host_ip = self.config.host_ip.clone();
        }
        Ok(pod)
    }

    /// Every runtime pod, resolved one at a time. The first failure aborts.
    pub async fn list(&self) -> Result<Vec<Pod>> {
        let summaries = self.client.list_pods().await.map_err(classify)?;

        let mut pods = Vec::with_capacity(summaries.len());
        for summary in summaries {
            pods.push(self.get_by_name(&summary.name).await?);
        }
        Ok(pods)
    }

    /// Create when absent, otherwise replace.
    ///
    /// Concurrent callers for the same key may both see the pod as absent
    /// and both create; the runtime rejects the second create-pod.
    pub async fn create_or_update(&self, pod: &Pod) -> Result<Pod> {
        let key = pod.key();
        match self.get(pod).await {
            Ok(_) => {
                tracing::debug!(key = %key, "Pod exists, updating");
                self.update(pod).await
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(key = %key, "Pod not found, creating");
                self.create(pod).await
            }
            Err(e) => Err(e),
        }
    }

    /// Resource usage of the pod's first runtime container, reported as
    /// the usage of the whole pod.
    pub async fn get_stats(&self, pod: &Pod) -> Result<PodStats> {
        let key = pod.key();
        let raw = self
            .client
            .inspect_pod(&key.to_string())
            .await
            .map_err(classify)?;
        let record = RuntimePodRecord::parse(&raw)?;

        // TODO: sum usage over every container once per-container stats are reported.
        let first = record.containers.first().ok_or_else(|| {
            PodletError::NotFound(format!("pod {} has no containers", key))
        })?;
        let usage = self
            .client
            .get_container_stats(&first.id)
            .await
            .map_err(classify)?;

        let now = Utc::now();
        let cpu = CpuStats {
            time: now,
            usage_nano_cores: u64::try_from(usage.cpu_nano).ok(),
        };
        let memory = MemoryStats {
            time: now,
            usage_bytes: u64::try_from(usage.mem_usage).ok(),
        };
        let container_name = pod
            .spec
            .containers
            .first()
            .map(|c| c.name.clone())
            .unwrap_or_else(|| key.to_string());

        Ok(PodStats {
            pod_ref: PodReference {
                name: pod.metadata.name.clone(),
                namespace: pod.metadata.namespace.clone(),
                uid: pod.metadata.uid.clone(),
            },
            start_time: pod.metadata.creation_timestamp,
            cpu: Some(cpu.clone()),
            memory: Some(memory.clone()),
            containers: vec![ContainerStats {
                name: container_name,
                start_time: pod.metadata.creation_timestamp,
                cpu: Some(cpu),
                memory: Some(memory),
            }],
        })
    }

    async fn provision(&self, pod: &Pod) -> Result<()> {
        validate(pod)?;
        let key = pod.key();
        let pod_name = key.to_string();

        ensure_host_volumes(pod).await?;

        let create = translate::to_pod_create(&key, pod)?;
        let id = self.client.create_pod(&create).await.map_err(|e| {
            tracing::error!(key = %key, error = %e, "Failed to create pod");
            classify(e)
        })?;
        tracing::info!(key = %key, id = %id, "Pod created");

        for container in &pod.spec.containers {
            tracing::info!(key = %key, container = %container.name, image = %container.image, "Creating container");

            self.client
                .pull_image(&container.image)
                .await
                .map_err(|e| {
                    tracing::error!(key = %key, image = %container.image, error = %e, "Failed to pull image");
                    classify(e)
                })?;

            let create = translate::to_container_create(pod, container, &key);
            self.client.create_container(&create).await.map_err(|e| {
                tracing::error!(key = %key, container = %container.name, error = %e, "Failed to create container");
                classify(e)
            })?;
        }

        self.client.start_pod(&pod_name).await.map_err(|e| {
            tracing::error!(key = %key, error = %e, "Failed to start pod");
            classify(e)
        })?;

        self.await_running(&pod_name).await;
        Ok(())
    }

    /// Give containers a moment to reach `running`. Never fails.
    async fn await_running(&self, name: &str) {
        for attempt in 1..=self.config.health_poll_attempts {
            match self.client.inspect_pod(name).await {
                Ok(raw) => match RuntimePodRecord::parse(&raw) {
                    Ok(record) if record.all_running() => {
                        tracing::debug!(key = %name, attempt, "Pod healthy");
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(key = %name, error = %e, "Unparsable pod inspection")
                    }
                },
                Err(e) => tracing::warn!(key = %name, error = %e, "Health inspection failed"),
            }

            if attempt < self.config.health_poll_attempts {
                tokio::time::sleep(self.config.health_poll_interval).await;
            }
        }
        tracing::debug!(key = %name, "Pod not healthy after start, continuing");
    }
}

fn validate_key(pod: &Pod) -> Result<()> {
    if pod.metadata.name.is_empty() {
        return Err(PodletError::InvalidInput("pod name is empty".to_string()));
    }
    Ok(())
}

fn validate(pod: &Pod) -> Result<()> {
    validate_key(pod)?;
    if pod.spec.containers.is_empty() {
        return Err(PodletError::InvalidInput(format!(
            "pod {} has no containers",
            pod.key()
        )));
    }
    for container in &pod.spec.containers {
        if container.name.is_empty() || container.image.is_empty() {
            return Err(PodletError::InvalidInput(format!(
                "pod {} has a container without name or image",
                pod.key()
            )));
        }
    }
    Ok(())
}

/// Prepare host directories for hostPath volumes.
async fn ensure_host_volumes(pod: &Pod) -> Result<()> {
    for volume in &pod.spec.volumes {
        let Some(host_path) = &volume.host_path else {
            tracing::debug!(volume = %volume.name, kind = %volume.source_kind(), "Volume source not supported");
            continue;
        };

        match host_path.kind()? {
            HostPathType::DirectoryOrCreate => {
                let mut builder = tokio::fs::DirBuilder::new();
                builder.recursive(true);
                #[cfg(unix)]
                builder.mode(0o755);
                builder.create(&host_path.path).await?;
            }
            HostPathType::Directory => {
                if !is_dir(&host_path.path).await {
                    return Err(PodletError::VolumeMissing {
                        volume: volume.name.clone(),
                        path: host_path.path.clone(),
                    });
                }
            }
            other => tracing::debug!(
                volume = %volume.name,
                kind = %other,
                "hostPath volume type not checked"
            ),
        }
    }
    Ok(())
}

async fn is_dir(path: impl AsRef<Path>) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use podlet_core::pod::{Container, HostPathVolumeSource, ObjectMeta, PodSpec, Volume};

    use super::*;

    fn pod_with_volume(path: &str, kind: Option<&str>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: "web".to_string(),
                namespace: "default".to_string(),
                ..Default::default()
            },
            spec: PodSpec {
                containers: vec![Container {
                    name: "nginx".to_string(),
                    image: "nginx".to_string(),
                    ..Default::default()
                }],
                volumes: vec![Volume {
                    name: "data".to_string(),
                    host_path: Some(HostPathVolumeSource {
                        path: path.to_string(),
                        type_: kind.map(str::to_string),
                    }),
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = LifecycleConfig::default();
        assert_eq!(config.health_poll_attempts, 4);
        assert_eq!(config.health_poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let mut pod = pod_with_volume("/tmp", None);
        pod.metadata.name.clear();
        assert!(matches!(validate(&pod), Err(PodletError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_rejects_no_containers() {
        let mut pod = pod_with_volume("/tmp", None);
        pod.spec.containers.clear();
        assert!(matches!(validate(&pod), Err(PodletError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_rejects_imageless_container() {
        let mut pod = pod_with_volume("/tmp", None);
        pod.spec.containers[0].image.clear();
        assert!(matches!(validate(&pod), Err(PodletError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_directory_or_create_makes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/data");
        let pod = pod_with_volume(path.to_str().unwrap(), Some("DirectoryOrCreate"));

        ensure_host_volumes(&pod).await.unwrap();
        assert!(path.is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o022, 0);
        }
    }

    #[tokio::test]
    async fn test_directory_missing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");
        let pod = pod_with_volume(path.to_str().unwrap(), Some("Directory"));

        match ensure_host_volumes(&pod).await {
            Err(PodletError::VolumeMissing { volume, .. }) => assert_eq!(volume, "data"),
            other => panic!("expected VolumeMissing, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_directory_that_is_a_file_fails() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let pod = pod_with_volume(file.path().to_str().unwrap(), Some("Directory"));
        assert!(matches!(
            ensure_host_volumes(&pod).await,
            Err(PodletError::VolumeMissing { .. })
        ));
    }

    #[tokio::test]
    async fn test_existing_directory_passes() {
        let dir = tempfile::tempdir().unwrap();
        let pod = pod_with_volume(dir.path().to_str().unwrap(), Some("Directory"));
        ensure_host_volumes(&pod).await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_type_is_invalid_input() {
        let pod = pod_with_volume("/tmp", Some("Folder"));
        assert!(matches!(
            ensure_host_volumes(&pod).await,
            Err(PodletError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_other_types_skipped() {
        let pod = pod_with_volume("/definitely/not/here", Some("Socket"));
        ensure_host_volumes(&pod).await.unwrap();
        assert!(!Path::new("/definitely/not/here").exists());
    }
}
