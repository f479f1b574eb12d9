use thiserror::Error;

/// Podlet error types, as seen by the control plane
#[derive(Error, Debug)]
pub enum PodletError {
    /// Request rejected before touching the runtime
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Runtime has no matching record
    #[error("Not found: {0}")]
    NotFound(String),

    /// Required host directory for a hostPath volume is absent
    #[error("Volume {volume} does not exist at {path}")]
    VolumeMissing { volume: String, path: String },

    /// Embedded pod spec label missing or unparsable
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Any other runtime failure, original message preserved
    #[error("Runtime error: {0}")]
    RuntimeError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error on the host filesystem
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PodletError {
    /// Whether this error means the runtime has no such record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, PodletError::NotFound(_))
    }
}

impl From<serde_json::Error> for PodletError {
    fn from(err: serde_json::Error) -> Self {
        PodletError::DecodeError(err.to_string())
    }
}

impl From<serde_yaml::Error> for PodletError {
    fn from(err: serde_yaml::Error) -> Self {
        PodletError::DecodeError(err.to_string())
    }
}

impl From<base64::DecodeError> for PodletError {
    fn from(err: base64::DecodeError) -> Self {
        PodletError::DecodeError(err.to_string())
    }
}

/// Result type alias for podlet operations
pub type Result<T> = std::result::Result<T, PodletError>;
