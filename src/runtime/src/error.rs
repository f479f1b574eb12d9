//! Runtime-side error types.

use thiserror::Error;

/// Errors returned by the runtime client.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The runtime reported that the named object does not exist.
    #[error("{error}: {reason}")]
    NotFound { error: String, reason: String },

    /// The runtime rejected or failed the call.
    #[error("{error}: {reason}")]
    Remote { error: String, reason: String },

    /// Socket-level failure; the connection is unusable afterwards.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// Reply was not a valid message for the call.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Reply parameters did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RuntimeError {
    /// Build an error from a Varlink error reply.
    ///
    /// Every podman error whose name ends in `NotFound` (`PodNotFound`,
    /// `ContainerNotFound`, `ImageNotFound`, ...) is a not-found condition.
    pub fn from_reply(error: &str, parameters: Option<&serde_json::Value>) -> Self {
        let reason = parameters
            .and_then(|p| p.get("reason"))
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .or_else(|| parameters.map(|p| p.to_string()))
            .unwrap_or_default();

        if error.ends_with("NotFound") {
            RuntimeError::NotFound {
                error: error.to_string(),
                reason,
            }
        } else {
            RuntimeError::Remote {
                error: error.to_string(),
                reason,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::NotFound { .. })
    }
}

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pod_not_found_reply() {
        let params = json!({"name": "default-web", "reason": "no such pod"});
        let err = RuntimeError::from_reply("io.podman.PodNotFound", Some(&params));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "io.podman.PodNotFound: no such pod");
    }

    #[test]
    fn test_other_not_found_kinds() {
        for name in ["io.podman.ContainerNotFound", "io.podman.ImageNotFound"] {
            assert!(RuntimeError::from_reply(name, None).is_not_found());
        }
    }

    #[test]
    fn test_error_occurred_is_remote() {
        let params = json!({"reason": "pod already exists"});
        let err = RuntimeError::from_reply("io.podman.ErrorOccurred", Some(&params));
        assert!(!err.is_not_found());
        assert!(matches!(err, RuntimeError::Remote { ref reason, .. } if reason == "pod already exists"));
    }

    #[test]
    fn test_reason_falls_back_to_parameters() {
        let params = json!({"code": 3});
        let err = RuntimeError::from_reply("org.varlink.service.InvalidParameter", Some(&params));
        assert_eq!(
            err.to_string(),
            "org.varlink.service.InvalidParameter: {\"code\":3}"
        );
    }
}
