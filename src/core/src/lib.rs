//! Podlet Core - Pod model, keys, errors and configuration
//!
//! Shared by the runtime client and the lifecycle provider.

pub mod config;
pub mod error;
pub mod key;
pub mod node;
pub mod pod;
pub mod stats;

// Re-export commonly used types
pub use config::ProviderConfig;
pub use error::{PodletError, Result};
pub use key::PodKey;
pub use pod::{Pod, PodPhase, PodStatus};

/// Podlet version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
