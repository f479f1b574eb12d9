//! Runtime error classification.

use podlet_core::PodletError;
use podlet_runtime::RuntimeError;

/// Convert a runtime failure into the control-plane taxonomy.
///
/// Only a runtime not-found reply becomes `NotFound`; every other failure,
/// including transport loss, is a `RuntimeError` carrying the message.
pub fn classify(err: RuntimeError) -> PodletError {
    match &err {
        RuntimeError::NotFound { .. } => PodletError::NotFound(err.to_string()),
        _ => PodletError::RuntimeError(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_not_found_maps_to_not_found() {
        let err = RuntimeError::NotFound {
            error: "io.podman.PodNotFound".to_string(),
            reason: "no such pod".to_string(),
        };
        let classified = classify(err);
        assert!(classified.is_not_found());
        assert!(classified.to_string().contains("no such pod"));
    }

    #[test]
    fn test_remote_error_maps_to_runtime_error() {
        let err = RuntimeError::Remote {
            error: "io.podman.ErrorOccurred".to_string(),
            reason: "image pull failed".to_string(),
        };
        match classify(err) {
            PodletError::RuntimeError(msg) => {
                assert_eq!(msg, "io.podman.ErrorOccurred: image pull failed")
            }
            other => panic!("Expected RuntimeError, got {:?}", other),
        }
    }

    #[test]
    fn test_connection_loss_maps_to_runtime_error() {
        let err = RuntimeError::Connection(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "broken pipe",
        ));
        assert!(matches!(classify(err), PodletError::RuntimeError(_)));
    }

    #[test]
    fn test_protocol_error_maps_to_runtime_error() {
        let err = RuntimeError::Protocol("not found in reply".to_string());
        assert!(!classify(err).is_not_found());
    }
}
