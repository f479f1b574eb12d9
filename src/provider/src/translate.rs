//! Map between declarative pods and runtime requests/records.
//!
//! The runtime has no notion of a pod spec, so the full spec travels with
//! the runtime pod as a label:
//! - pod (status cleared) → YAML → base64 → label `pod`
//! - container → `io.podman.Create` with args `image, command..., args...`
//!
//! Pure functions; no I/O.

use base64::Engine;
use chrono::Utc;

use podlet_core::pod::{Container, Pod, PodStatus};
use podlet_core::{PodKey, PodletError, Result};
use podlet_runtime::{ContainerCreate, PodCreate, RuntimePodRecord};

use crate::status;

/// Reserved runtime label holding the encoded pod spec.
pub const POD_SPEC_LABEL: &str = "pod";

/// Build the create request for one container of `pod`.
///
/// Environment variables are taken from the first container of the pod
/// for every container, matching the records existing deployments hold.
pub fn to_container_create(pod: &Pod, container: &Container, key: &PodKey) -> ContainerCreate {
    let pod_name = key.to_string();

    let mut args = Vec::with_capacity(1 + container.command.len() + container.args.len());
    args.push(container.image.clone());
    args.extend(container.command.iter().cloned());
    args.extend(container.args.iter().cloned());

    let mut volume = Vec::new();
    for pod_volume in &pod.spec.volumes {
        for mount in container
            .volume_mounts
            .iter()
            .filter(|m| m.name == pod_volume.name)
        {
            match &pod_volume.host_path {
                Some(host_path) => {
                    volume.push(format!("{}:{}", host_path.path, mount.mount_path));
                }
                None => tracing::debug!(
                    container = %container.name,
                    volume = %pod_volume.name,
                    kind = %pod_volume.source_kind(),
                    "Volume source not supported, mount skipped"
                ),
            }
        }
    }

    let env = pod
        .spec
        .containers
        .first()
        .map(|first| {
            first
                .env
                .iter()
                .map(|e| format!("{}={}", e.name, e.value))
                .collect()
        })
        .unwrap_or_default();

    let privileged = container.privileged();

    ContainerCreate {
        args,
        command: container.command.clone(),
        env,
        name: format!("{}-{}", pod_name, container.name),
        pod: pod_name,
        volume,
        net: pod.spec.host_network.then(|| "host".to_string()),
        privileged,
        // Privileged containers get a TTY so they can drive host devices.
        tty: privileged,
    }
}

/// Build the pod create request, embedding the pod spec in its labels.
pub fn to_pod_create(key: &PodKey, pod: &Pod) -> Result<PodCreate> {
    let encoded = encode_pod_spec(pod)?;
    let mut labels = pod.metadata.labels.clone();
    labels.insert(POD_SPEC_LABEL.to_string(), encoded);

    Ok(PodCreate {
        name: key.to_string(),
        labels,
    })
}

/// Serialize and encode a pod for the spec label. Status is not stored.
pub fn encode_pod_spec(pod: &Pod) -> Result<String> {
    let mut spec = pod.clone();
    spec.status = PodStatus::default();
    let yaml = serde_yaml::to_string(&spec)
        .map_err(|e| PodletError::InvalidInput(format!("pod is not serializable: {}", e)))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(yaml))
}

/// Recover the pod stored in a runtime pod's labels.
pub fn decode_pod_spec(labels: &std::collections::HashMap<String, String>) -> Result<Pod> {
    let encoded = labels.get(POD_SPEC_LABEL).ok_or_else(|| {
        PodletError::DecodeError(format!("runtime pod has no '{}' label", POD_SPEC_LABEL))
    })?;
    let yaml = base64::engine::general_purpose::STANDARD.decode(encoded)?;
    Ok(serde_yaml::from_slice(&yaml)?)
}

/// Parse an inspect-pod document into a pod with projected status.
pub fn from_runtime_json(raw: &str) -> Result<Pod> {
    let record = RuntimePodRecord::parse(raw)?;
    let mut pod = decode_pod_spec(&record.config.labels)?;
    pod.status = status::project(&record, Utc::now());
    Ok(pod)
}
