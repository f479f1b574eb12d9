//! Serialized runtime client.
//!
//! `RuntimeClient` owns the single connection to the runtime. Every
//! primitive takes the connection lock, issues exactly one call and releases
//! the lock, so the runtime never sees interleaved requests from this
//! process, even across unrelated pods.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::error::{Result, RuntimeError};
use crate::transport::{Transport, VarlinkConnection};
use crate::types::{ContainerCreate, ContainerStats, ListPodData, PodCreate};

/// Varlink interface implemented by the podman service.
pub const INTERFACE: &str = "io.podman";

pub struct RuntimeClient {
    conn: Mutex<Box<dyn Transport>>,
}

impl RuntimeClient {
    /// Wrap an established transport.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            conn: Mutex::new(Box::new(transport)),
        }
    }

    /// Connect to the podman Varlink service at `address`.
    pub async fn connect(address: &str) -> Result<Self> {
        let conn = VarlinkConnection::connect(address).await?;
        tracing::info!(address = %address, "Runtime client connected");
        Ok(Self::new(conn))
    }

    /// Create an empty pod; returns the runtime pod id.
    pub async fn create_pod(&self, create: &PodCreate) -> Result<String> {
        self.call("CreatePod", json!({ "create": create }), "pod").await
    }

    /// Create a container inside its pod; returns the container id.
    pub async fn create_container(&self, create: &ContainerCreate) -> Result<String> {
        self.call("CreateContainer", json!({ "create": create }), "container")
            .await
    }

    /// Pull an image into local storage.
    pub async fn pull_image(&self, image: &str) -> Result<()> {
        self.call_raw("PullImage", json!({ "name": image })).await?;
        Ok(())
    }

    /// Start every container in a pod. Returns the pod id.
    pub async fn start_pod(&self, name: &str) -> Result<String> {
        self.call("StartPod", json!({ "name": name }), "pod").await
    }

    /// Inspection document for a pod, as JSON text.
    pub async fn inspect_pod(&self, name: &str) -> Result<String> {
        self.call("InspectPod", json!({ "name": name }), "pod").await
    }

    /// Remove a pod and its containers. Returns the pod id.
    pub async fn remove_pod(&self, name: &str, force: bool) -> Result<String> {
        self.call("RemovePod", json!({ "name": name, "force": force }), "pod")
            .await
    }

    /// Existence check and summary for a single pod.
    pub async fn get_pod(&self, name: &str) -> Result<ListPodData> {
        self.call("GetPod", json!({ "name": name }), "pod").await
    }

    /// List all pods known to the runtime.
    pub async fn list_pods(&self) -> Result<Vec<ListPodData>> {
        self.call("ListPods", json!({}), "pods").await
    }

    /// Get resource usage for one container.
    pub async fn get_container_stats(&self, name: &str) -> Result<ContainerStats> {
        self.call("GetContainerStats", json!({ "name": name }), "container")
            .await
    }

    /// Issue one call under the connection lock.
    async fn call_raw(&self, method: &str, parameters: Value) -> Result<Value> {
        let method = format!("{}.{}", INTERFACE, method);
        tracing::trace!(method = %method, "Runtime call");

        let mut conn = self.conn.lock().await;
        conn.call(&method, parameters).await
    }

    /// Issue one call and decode `field` of the reply.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        parameters: Value,
        field: &str,
    ) -> Result<T> {
        let mut reply = self.call_raw(method, parameters).await?;
        let value = reply
            .get_mut(field)
            .map(Value::take)
            .ok_or_else(|| {
                RuntimeError::Protocol(format!("{} reply has no '{}' field", method, field))
            })?;
        Ok(serde_json::from_value(value)?)
    }
}
