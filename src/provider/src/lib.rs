//! Podlet provider - runs declarative pods on a podman runtime.
//!
//! - Pod → runtime pod named by its key, spec embedded in a label
//! - Container → runtime container inside that pod
//! - Status → projected from runtime inspection on every read

pub mod error;
pub mod lifecycle;
pub mod provider;
pub mod reconcile;
pub mod status;
pub mod store;
pub mod translate;

pub use lifecycle::{LifecycleConfig, Notifier, PodLifecycle};
pub use provider::{NodeInfo, PodmanProvider};
pub use reconcile::{PodCache, ReconcileConfig, ReconcileReport, Reconciler, ReconcilerHandle};
pub use store::{status_notifier, PodStore};
