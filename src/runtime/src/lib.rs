//! Podlet Runtime - client side of the podman Varlink API.
//!
//! Exposes the nine runtime primitives the pod lifecycle needs
//! (create-pod, create-container, pull-image, start-pod, inspect-pod,
//! remove-pod, get-pod, list-pods, get-container-stats) over one
//! serialized connection.

pub mod client;
pub mod error;
pub mod transport;
pub mod types;

// Re-export common types
pub use client::RuntimeClient;
pub use error::{Result, RuntimeError};
pub use transport::{Transport, VarlinkConnection};
pub use types::{
    ContainerCreate, ContainerLifecycle, ContainerStats, ListPodData, PodCreate,
    RuntimeContainerRecord, RuntimePodRecord,
};

/// Podlet runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
