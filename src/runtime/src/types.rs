//! Wire types of the io.podman Varlink interface.
//!
//! Only the fields this adapter reads or writes are modeled; everything
//! else in a reply is ignored on decode.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// `io.podman.PodCreate`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodCreate {
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

/// `io.podman.Create`, the container create request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerCreate {
    /// `image, command..., args...`
    pub args: Vec<String>,
    #[serde(default)]
    pub command: Vec<String>,
    /// `NAME=value` pairs.
    #[serde(default)]
    pub env: Vec<String>,
    pub name: String,
    pub pod: String,
    /// `hostPath:mountPath` pairs.
    #[serde(default)]
    pub volume: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tty: Option<bool>,
}

/// `io.podman.ListPodData`, returned by `GetPod` and `ListPods`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListPodData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: HashMap<String, String>,
    #[serde(rename = "numberofcontainers", default)]
    pub number_of_containers: String,
}

/// `io.podman.ContainerStats`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerStats {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cpu: f64,
    #[serde(default)]
    pub cpu_nano: i64,
    #[serde(default)]
    pub system_nano: i64,
    #[serde(default)]
    pub mem_usage: i64,
    #[serde(default)]
    pub mem_limit: i64,
    #[serde(default)]
    pub mem_perc: f64,
    #[serde(default)]
    pub net_input: i64,
    #[serde(default)]
    pub net_output: i64,
    #[serde(default)]
    pub block_input: i64,
    #[serde(default)]
    pub block_output: i64,
    #[serde(default)]
    pub pids: i64,
}

/// The JSON document returned (as text) by `InspectPod`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimePodRecord {
    #[serde(rename = "Config")]
    pub config: RuntimePodConfig,
    #[serde(rename = "State", default)]
    pub state: RuntimePodState,
    #[serde(rename = "Containers", default, deserialize_with = "null_as_default")]
    pub containers: Vec<RuntimeContainerRecord>,
}

impl RuntimePodRecord {
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// True when every container reports `running`. Vacuously true for a
    /// pod with no containers.
    pub fn all_running(&self) -> bool {
        self.containers
            .iter()
            .all(|c| c.lifecycle() == ContainerLifecycle::Running)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimePodConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimePodState {
    #[serde(rename = "cgroupPath", default)]
    pub cgroup_path: String,
    #[serde(rename = "infraContainerID", default)]
    pub infra_container_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeContainerRecord {
    pub id: String,
    #[serde(default)]
    pub state: String,
}

impl RuntimeContainerRecord {
    pub fn lifecycle(&self) -> ContainerLifecycle {
        match self.state.as_str() {
            "running" => ContainerLifecycle::Running,
            "exited" => ContainerLifecycle::Exited,
            other => ContainerLifecycle::Other(other.to_string()),
        }
    }
}

/// Runtime container state as far as status projection cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerLifecycle {
    Running,
    Exited,
    Other(String),
}

/// Go encodes nil maps and slices as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
