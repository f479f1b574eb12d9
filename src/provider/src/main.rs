//! Podlet - node agent running control-plane pods on podman.
//!
//! Connects to the podman Varlink socket, publishes pod status through an
//! in-memory cache and keeps it fresh with a periodic reconciler.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use podlet_core::ProviderConfig;
use podlet_runtime::RuntimeClient;

use podlet_provider::{
    status_notifier, LifecycleConfig, NodeInfo, PodLifecycle, PodStore, PodmanProvider,
    ReconcileConfig, Reconciler,
};

/// Podlet node agent
#[derive(Parser, Debug)]
#[command(name = "podlet", about = "Run control-plane pods on a podman runtime")]
struct Args {
    /// JSON file mapping node names to provider configuration.
    #[arg(long)]
    provider_config: PathBuf,

    /// Name of this node; selects the entry in the provider config.
    #[arg(long)]
    node_name: String,

    /// Operating system reported for the node.
    #[arg(long, default_value = "Linux")]
    operating_system: String,

    /// Address reported as the node's InternalIP and pods' hostIP.
    #[arg(long, default_value = "")]
    internal_ip: String,

    /// Port of the kubelet API endpoint.
    #[arg(long, default_value = "10250")]
    daemon_port: i32,

    /// Runtime socket, overriding the provider config.
    #[arg(long)]
    socket: Option<String>,

    /// Emit logs as JSON.
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let mut config = ProviderConfig::load(&args.provider_config, &args.node_name)
        .context("Failed to load provider config")?;
    if let Some(socket) = args.socket {
        config.socket = socket;
    }

    tracing::info!(
        version = podlet_core::VERSION,
        runtime_client = podlet_runtime::VERSION,
        node = %args.node_name,
        socket = %config.socket,
        cpu = %config.cpu,
        memory = %config.memory,
        pods = %config.pods,
        "Starting podlet"
    );

    let client = RuntimeClient::connect(&config.socket)
        .await
        .with_context(|| format!("Failed to connect to runtime at {}", config.socket))?;

    let lifecycle = Arc::new(PodLifecycle::new(
        Arc::new(client),
        LifecycleConfig {
            host_ip: args.internal_ip.clone(),
            ..Default::default()
        },
    ));

    let provider = PodmanProvider::new(
        Arc::clone(&lifecycle),
        config,
        NodeInfo {
            node_name: args.node_name,
            operating_system: args.operating_system,
            internal_ip: args.internal_ip,
            daemon_port: args.daemon_port,
        },
    );

    // Refreshed status lands, in order, on pods the cache already holds.
    let store = Arc::new(PodStore::new());
    let (notifier, status_task) = status_notifier(Arc::clone(&store));
    provider.notify_pods(notifier);

    for pod in provider
        .get_pods()
        .await
        .context("Failed to list runtime pods")?
    {
        store.upsert(pod).await;
    }
    tracing::info!(pods = store.len().await, "Pod cache seeded");

    let node = provider.node_status();
    tracing::info!(
        addresses = ?node.addresses,
        capacity = ?node.capacity,
        "Node ready"
    );

    let reconciler = Reconciler::new(lifecycle, store, ReconcileConfig::default()).spawn();

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutting down");
    reconciler.shutdown().await;
    status_task.abort();

    Ok(())
}
