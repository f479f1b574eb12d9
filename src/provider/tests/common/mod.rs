//! Scripted in-memory podman runtime.
//!
//! Implements the io.podman calls the lifecycle issues against shared
//! state, so tests drive the real `RuntimeClient` and can inspect what the
//! runtime saw. Every call yields once, like a socket round trip would.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use podlet_core::pod::{Container, HostPathVolumeSource, ObjectMeta, PodSpec, Volume, VolumeMount};
use podlet_core::Pod;
use podlet_provider::{LifecycleConfig, Notifier, PodLifecycle};
use podlet_runtime::{RuntimeClient, RuntimeError, Transport};

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub id: String,
    pub name: String,
    pub image: String,
    pub request: Value,
}

#[derive(Debug, Clone)]
pub struct FakePod {
    pub id: String,
    pub labels: HashMap<String, String>,
    pub containers: Vec<FakeContainer>,
    pub started: bool,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub pods: BTreeMap<String, FakePod>,
    /// Short method names in call order.
    pub calls: Vec<String>,
    /// Containers running these images report `exited` once started.
    pub exited_images: HashSet<String>,
    /// Any call naming one of these pods fails with a generic error.
    pub failing_keys: HashSet<String>,
    /// Calls of these methods fail with a generic error.
    pub failing_methods: HashSet<String>,
    /// Inspections of started pods that report containers as `configured`.
    pub pending_inspections: usize,
    next_id: u64,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{:04}", prefix, self.next_id)
    }

    fn container_state(&self, pod: &FakePod, container: &FakeContainer) -> &'static str {
        if !pod.started {
            "configured"
        } else if self.exited_images.contains(&container.image) {
            "exited"
        } else {
            "running"
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeRuntime {
    pub state: Arc<Mutex<FakeState>>,
}

fn not_found(kind: &str, name: &str) -> RuntimeError {
    let error = format!("io.podman.{}NotFound", kind);
    RuntimeError::from_reply(&error, Some(&json!({ "id": name, "reason": "no such object" })))
}

fn failure(reason: &str) -> RuntimeError {
    RuntimeError::from_reply("io.podman.ErrorOccurred", Some(&json!({ "reason": reason })))
}

fn str_param<'a>(parameters: &'a Value, path: &[&str]) -> &'a str {
    let mut value = parameters;
    for segment in path {
        value = &value[*segment];
    }
    value.as_str().unwrap_or_default()
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| *c == method).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn pod(&self, key: &str) -> Option<FakePod> {
        self.state.lock().pods.get(key).cloned()
    }

    pub fn pod_names(&self) -> Vec<String> {
        self.state.lock().pods.keys().cloned().collect()
    }

    pub fn fail_key(&self, key: &str) {
        self.state.lock().failing_keys.insert(key.to_string());
    }

    pub fn fail_method(&self, method: &str) {
        self.state.lock().failing_methods.insert(method.to_string());
    }

    pub fn exit_image(&self, image: &str) {
        self.state.lock().exited_images.insert(image.to_string());
    }

    fn handle(&self, method: &str, parameters: &Value) -> Result<Value, RuntimeError> {
        let mut state = self.state.lock();
        state.calls.push(method.to_string());

        if state.failing_methods.contains(method) {
            return Err(failure(&format!("{} failed", method)));
        }
        let named = [
            str_param(parameters, &["name"]),
            str_param(parameters, &["create", "name"]),
            str_param(parameters, &["create", "pod"]),
        ];
        if named
            .iter()
            .any(|n| !n.is_empty() && state.failing_keys.contains(*n))
        {
            return Err(failure("injected failure"));
        }

        match method {
            "CreatePod" => {
                let name = str_param(parameters, &["create", "name"]).to_string();
                if state.pods.contains_key(&name) {
                    return Err(failure(&format!("pod {} already exists", name)));
                }
                let labels: HashMap<String, String> =
                    serde_json::from_value(parameters["create"]["labels"].clone())
                        .unwrap_or_default();
                let id = state.next_id("pod");
                state.pods.insert(
                    name,
                    FakePod {
                        id: id.clone(),
                        labels,
                        containers: Vec::new(),
                        started: false,
                    },
                );
                Ok(json!({ "pod": id }))
            }
            "CreateContainer" => {
                let create = &parameters["create"];
                let pod_name = str_param(parameters, &["create", "pod"]).to_string();
                let id = state.next_id("ctr");
                let pod = state
                    .pods
                    .get_mut(&pod_name)
                    .ok_or_else(|| not_found("Pod", &pod_name))?;
                pod.containers.push(FakeContainer {
                    id: id.clone(),
                    name: str_param(parameters, &["create", "name"]).to_string(),
                    image: create["args"][0].as_str().unwrap_or_default().to_string(),
                    request: create.clone(),
                });
                Ok(json!({ "container": id }))
            }
            "PullImage" => {
                let image = str_param(parameters, &["name"]);
                Ok(json!({ "reply": { "id": image } }))
            }
            "StartPod" => {
                let name = str_param(parameters, &["name"]);
                let pod = state
                    .pods
                    .get_mut(name)
                    .ok_or_else(|| not_found("Pod", name))?;
                pod.started = true;
                Ok(json!({ "pod": pod.id }))
            }
            "InspectPod" => {
                let name = str_param(parameters, &["name"]).to_string();
                let pending = state
                    .pods
                    .get(&name)
                    .map(|p| p.started && state.pending_inspections > 0)
                    .unwrap_or(false);
                if pending {
                    state.pending_inspections -= 1;
                }
                let pod = state.pods.get(&name).ok_or_else(|| not_found("Pod", &name))?;
                let containers: Vec<Value> = pod
                    .containers
                    .iter()
                    .map(|c| {
                        let s = if pending {
                            "configured"
                        } else {
                            state.container_state(pod, c)
                        };
                        json!({ "id": c.id, "state": s })
                    })
                    .collect();
                let doc = json!({
                    "Config": {
                        "id": pod.id,
                        "name": name,
                        "labels": pod.labels,
                        "created": "2024-05-01T12:00:00Z"
                    },
                    "State": { "cgroupPath": "/machine.slice", "infraContainerID": "" },
                    "Containers": containers
                });
                Ok(json!({ "pod": doc.to_string() }))
            }
            "RemovePod" => {
                let name = str_param(parameters, &["name"]);
                let pod = state.pods.remove(name).ok_or_else(|| not_found("Pod", name))?;
                Ok(json!({ "pod": pod.id }))
            }
            "GetPod" => {
                let name = str_param(parameters, &["name"]);
                let pod = state.pods.get(name).ok_or_else(|| not_found("Pod", name))?;
                Ok(json!({ "pod": list_pod_data(name, pod) }))
            }
            "ListPods" => {
                let pods: Vec<Value> = state
                    .pods
                    .iter()
                    .map(|(name, pod)| list_pod_data(name, pod))
                    .collect();
                Ok(json!({ "pods": pods }))
            }
            "GetContainerStats" => {
                let id = str_param(parameters, &["name"]);
                let container = state
                    .pods
                    .values()
                    .flat_map(|p| p.containers.iter())
                    .find(|c| c.id == id)
                    .ok_or_else(|| not_found("Container", id))?;
                Ok(json!({
                    "container": {
                        "id": container.id,
                        "name": container.name,
                        "cpu": 1.5,
                        "cpu_nano": 1500,
                        "system_nano": 100000,
                        "mem_usage": 4096,
                        "mem_limit": 1048576,
                        "mem_perc": 0.4,
                        "net_input": 0,
                        "net_output": 0,
                        "block_input": 0,
                        "block_output": 0,
                        "pids": 1
                    }
                }))
            }
            other => Err(RuntimeError::from_reply(
                "org.varlink.service.MethodNotFound",
                Some(&json!({ "method": other })),
            )),
        }
    }
}

fn list_pod_data(name: &str, pod: &FakePod) -> Value {
    json!({
        "id": pod.id,
        "name": name,
        "status": if pod.started { "Running" } else { "Created" },
        "labels": pod.labels,
        "numberofcontainers": pod.containers.len().to_string()
    })
}

#[async_trait]
impl Transport for FakeRuntime {
    async fn call(&mut self, method: &str, parameters: Value) -> podlet_runtime::Result<Value> {
        tokio::task::yield_now().await;
        let method = method.strip_prefix("io.podman.").unwrap_or(method);
        self.handle(method, &parameters)
    }
}

/// Lifecycle over a fresh fake runtime, with fast health polling.
pub fn lifecycle() -> (Arc<PodLifecycle>, FakeRuntime) {
    let runtime = FakeRuntime::new();
    let lifecycle = PodLifecycle::new(
        Arc::new(RuntimeClient::new(runtime.clone())),
        LifecycleConfig {
            health_poll_interval: Duration::from_millis(1),
            host_ip: "10.0.0.7".to_string(),
            ..Default::default()
        },
    );
    (Arc::new(lifecycle), runtime)
}

/// Notifier collecting every pod it receives.
pub fn recording_notifier() -> (Notifier, Arc<Mutex<Vec<Pod>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let notifier: Notifier = Arc::new(move |pod: Pod| sink.lock().push(pod));
    (notifier, seen)
}

pub fn container(name: &str, image: &str) -> Container {
    Container {
        name: name.to_string(),
        image: image.to_string(),
        ..Default::default()
    }
}

pub fn pod(namespace: &str, name: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: name.to_string(),
            namespace: namespace.to_string(),
            uid: format!("uid-{}", name),
            ..Default::default()
        },
        spec: PodSpec {
            containers: vec![container("app", "nginx:1.25")],
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Pod mounting one hostPath volume at `/data`.
pub fn pod_with_host_path(name: &str, path: &str, kind: &str) -> Pod {
    let mut pod = pod("default", name);
    pod.spec.volumes.push(Volume {
        name: "data".to_string(),
        host_path: Some(HostPathVolumeSource {
            path: path.to_string(),
            type_: Some(kind.to_string()),
        }),
        ..Default::default()
    });
    pod.spec.containers[0].volume_mounts.push(VolumeMount {
        name: "data".to_string(),
        mount_path: "/data".to_string(),
        read_only: false,
    });
    pod
}
