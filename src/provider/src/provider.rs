//! Node-facing provider.
//!
//! Wraps [`PodLifecycle`] with what the node knows about itself: its
//! name, address and configured capacity. Applies the DaemonSet policy.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use podlet_core::node::{NodeAddress, NodeCondition, NodeStatus, NodeSystemInfo};
use podlet_core::pod::{ConditionStatus, ContainerStateTerminated, PodPhase};
use podlet_core::stats::{NodeStats, Summary};
use podlet_core::{Pod, PodKey, PodStatus, PodletError, ProviderConfig, Result};

use crate::lifecycle::{Notifier, PodLifecycle};

/// Reported when a DaemonSet pod is refused.
pub const DAEMON_SET_DISABLED_MESSAGE: &str = "DaemonSets are disabled on this node";

/// Node label keeping this node out of service load balancers.
pub const EXCLUDE_BALANCER_LABEL: &str = "alpha.service-controller.kubernetes.io/exclude-balancer";

const DEFAULT_OPERATING_SYSTEM: &str = "Linux";
const ARCHITECTURE: &str = "amd64";

/// Identity of the node this provider serves.
#[derive(Debug, Clone, Default)]
pub struct NodeInfo {
    pub node_name: String,
    pub operating_system: String,
    pub internal_ip: String,
    pub daemon_port: i32,
}

pub struct PodmanProvider {
    lifecycle: Arc<PodLifecycle>,
    config: ProviderConfig,
    node: NodeInfo,
    start_time: DateTime<Utc>,
}

impl PodmanProvider {
    pub fn new(lifecycle: Arc<PodLifecycle>, config: ProviderConfig, node: NodeInfo) -> Self {
        Self {
            lifecycle,
            config,
            node,
            start_time: Utc::now(),
        }
    }

    pub fn lifecycle(&self) -> &Arc<PodLifecycle> {
        &self.lifecycle
    }

    pub async fn create_pod(&self, pod: &Pod) -> Result<Pod> {
        if self.config.daemon_sets_disabled() && pod.is_owned_by_kind("DaemonSet") {
            tracing::info!(key = %pod.key(), "Refusing DaemonSet pod");
            self.lifecycle.notify(refused(pod));
            return Err(PodletError::InvalidInput(
                DAEMON_SET_DISABLED_MESSAGE.to_string(),
            ));
        }

        tracing::info!(key = %pod.key(), "CreatePod");
        self.lifecycle.create(pod).await
    }

    pub async fn update_pod(&self, pod: &Pod) -> Result<Pod> {
        tracing::info!(key = %pod.key(), "UpdatePod");
        self.lifecycle.update(pod).await
    }

    pub async fn delete_pod(&self, pod: &Pod) -> Result<()> {
        tracing::info!(key = %pod.key(), "DeletePod");
        self.lifecycle.delete(pod).await
    }

    pub async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        if name.is_empty() {
            return Err(PodletError::InvalidInput("pod name is empty".to_string()));
        }
        let key = PodKey::new(namespace, name);
        tracing::debug!(key = %key, "GetPod");
        self.lifecycle.get_by_name(&key.to_string()).await
    }

    pub async fn get_pod_status(&self, namespace: &str, name: &str) -> Result<PodStatus> {
        Ok(self.get_pod(namespace, name).await?.status)
    }

    pub async fn get_pods(&self) -> Result<Vec<Pod>> {
        tracing::debug!("GetPods");
        self.lifecycle.list().await
    }

    /// Node stats plus pod stats for every runtime pod.
    pub async fn get_stats_summary(&self) -> Result<Summary> {
        let mut summary = Summary {
            node: NodeStats {
                node_name: self.node.node_name.clone(),
                start_time: Some(self.start_time),
            },
            pods: Vec::new(),
        };

        for pod in self.get_pods().await? {
            summary.pods.push(self.lifecycle.get_stats(&pod).await?);
        }
        Ok(summary)
    }

    pub fn notify_pods(&self, notifier: Notifier) {
        self.lifecycle.set_notifier(notifier);
    }

    pub fn node_status(&self) -> NodeStatus {
        let capacity = BTreeMap::from([
            ("cpu".to_string(), self.config.cpu.clone()),
            ("memory".to_string(), self.config.memory.clone()),
            ("pods".to_string(), self.config.pods.clone()),
        ]);

        let operating_system = if self.node.operating_system.is_empty() {
            DEFAULT_OPERATING_SYSTEM.to_string()
        } else {
            self.node.operating_system.clone()
        };

        NodeStatus {
            allocatable: capacity.clone(),
            capacity,
            conditions: node_conditions(Utc::now()),
            addresses: vec![NodeAddress {
                type_: "InternalIP".to_string(),
                address: self.node.internal_ip.clone(),
            }],
            kubelet_port: self.node.daemon_port,
            node_info: NodeSystemInfo {
                operating_system,
                architecture: ARCHITECTURE.to_string(),
            },
            labels: BTreeMap::from([(EXCLUDE_BALANCER_LABEL.to_string(), "true".to_string())]),
        }
    }
}

/// The pod as reported back when it is refused.
fn refused(pod: &Pod) -> Pod {
    let mut pod = pod.clone();
    pod.status.phase = Some(PodPhase::Failed);
    pod.status.message = DAEMON_SET_DISABLED_MESSAGE.to_string();
    for status in &mut pod.status.container_statuses {
        status.state.terminated = Some(ContainerStateTerminated {
            exit_code: 1,
            message: DAEMON_SET_DISABLED_MESSAGE.to_string(),
            started_at: None,
        });
    }
    pod
}

fn node_conditions(now: DateTime<Utc>) -> Vec<NodeCondition> {
    [
        ("Ready", ConditionStatus::True, "KubeletReady", "kubelet is ready."),
        (
            "OutOfDisk",
            ConditionStatus::False,
            "KubeletHasSufficientDisk",
            "kubelet has sufficient disk space available",
        ),
        (
            "MemoryPressure",
            ConditionStatus::False,
            "KubeletHasSufficientMemory",
            "kubelet has sufficient memory available",
        ),
        (
            "DiskPressure",
            ConditionStatus::False,
            "KubeletHasNoDiskPressure",
            "kubelet has no disk pressure",
        ),
        (
            "NetworkUnavailable",
            ConditionStatus::False,
            "RouteCreated",
            "RouteController created a route",
        ),
    ]
    .into_iter()
    .map(|(type_, status, reason, message)| NodeCondition {
        type_: type_.to_string(),
        status,
        last_heartbeat_time: now,
        last_transition_time: now,
        reason: reason.to_string(),
        message: message.to_string(),
    })
    .collect()
}
