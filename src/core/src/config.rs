use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PodletError, Result};

/// Default node CPU capacity.
pub const DEFAULT_CPU_CAPACITY: &str = "5";

/// Default node memory capacity.
pub const DEFAULT_MEMORY_CAPACITY: &str = "2Gi";

/// Default node pod capacity.
pub const DEFAULT_POD_CAPACITY: &str = "10";

/// Default runtime socket address.
pub const DEFAULT_SOCKET: &str = "unix:/run/podman/io.podman";

/// DaemonSet pods are refused unless explicitly enabled.
pub const DEFAULT_DAEMON_SET_DISABLED: &str = "true";

/// Per-node provider configuration.
///
/// Values are kept as the strings found in the config file; they are
/// validated on load and re-parsed where a typed value is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub cpu: String,
    #[serde(default)]
    pub memory: String,
    #[serde(default)]
    pub pods: String,
    #[serde(default)]
    pub socket: String,
    #[serde(default)]
    pub daemon_set_disabled: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            cpu: DEFAULT_CPU_CAPACITY.to_string(),
            memory: DEFAULT_MEMORY_CAPACITY.to_string(),
            pods: DEFAULT_POD_CAPACITY.to_string(),
            socket: DEFAULT_SOCKET.to_string(),
            daemon_set_disabled: DEFAULT_DAEMON_SET_DISABLED.to_string(),
        }
    }
}

impl ProviderConfig {
    /// Load the configuration for `node_name` from a JSON file mapping
    /// node names to configs.
    pub fn load(path: impl AsRef<Path>, node_name: &str) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            PodletError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&data, node_name)
    }

    /// Parse the node map and pick, default and validate one entry.
    pub fn from_json(data: &str, node_name: &str) -> Result<Self> {
        let mut nodes: HashMap<String, ProviderConfig> = serde_json::from_str(data)
            .map_err(|e| PodletError::Config(format!("Invalid provider config: {}", e)))?;

        let config = nodes
            .remove(node_name)
            .ok_or_else(|| PodletError::Config(format!("Node config not found {}", node_name)))?
            .with_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Fill empty fields with defaults.
    pub fn with_defaults(mut self) -> Self {
        let defaults = ProviderConfig::default();
        if self.cpu.is_empty() {
            self.cpu = defaults.cpu;
        }
        if self.memory.is_empty() {
            self.memory = defaults.memory;
        }
        if self.pods.is_empty() {
            self.pods = defaults.pods;
        }
        if self.socket.is_empty() {
            self.socket = defaults.socket;
        }
        if self.daemon_set_disabled.is_empty() {
            self.daemon_set_disabled = defaults.daemon_set_disabled;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        parse_quantity(&self.cpu)
            .map_err(|e| PodletError::Config(format!("Invalid CPU value {}: {}", self.cpu, e)))?;
        parse_quantity(&self.memory).map_err(|e| {
            PodletError::Config(format!("Invalid memory value {}: {}", self.memory, e))
        })?;
        parse_quantity(&self.pods)
            .map_err(|e| PodletError::Config(format!("Invalid pods value {}: {}", self.pods, e)))?;
        parse_bool(&self.daemon_set_disabled).ok_or_else(|| {
            PodletError::Config(format!(
                "Invalid daemonSetDisabled value {}",
                self.daemon_set_disabled
            ))
        })?;
        Ok(())
    }

    /// Whether pods owned by a DaemonSet are refused.
    pub fn daemon_sets_disabled(&self) -> bool {
        parse_bool(&self.daemon_set_disabled).unwrap_or(true)
    }
}

/// Parse a Kubernetes resource quantity (`500m`, `2Gi`, `1.5`, `1e3`) into
/// its numeric value.
pub fn parse_quantity(s: &str) -> std::result::Result<f64, String> {
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    let split = unsigned
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(unsigned.len());
    let (number, suffix) = unsigned.split_at(split);

    if number.is_empty() || number == "." || number.matches('.').count() > 1 {
        return Err("expected a number".to_string());
    }
    let value: f64 = number
        .parse()
        .map_err(|_| "expected a number".to_string())?;

    let multiplier = match suffix {
        "" => 1.0,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 1024f64,
        "Mi" => 1024f64.powi(2),
        "Gi" => 1024f64.powi(3),
        "Ti" => 1024f64.powi(4),
        "Pi" => 1024f64.powi(5),
        "Ei" => 1024f64.powi(6),
        exp if exp.starts_with(['e', 'E']) => {
            let power: i32 = exp[1..]
                .parse()
                .map_err(|_| format!("invalid exponent '{}'", exp))?;
            10f64.powi(power)
        }
        other => return Err(format!("unknown suffix '{}'", other)),
    };

    let sign = if s.starts_with('-') { -1.0 } else { 1.0 };
    Ok(sign * value * multiplier)
}

/// Boolean spellings accepted by Go's `strconv.ParseBool`.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
