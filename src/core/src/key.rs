//! Composite pod keys.
//!
//! A pod is stored in the runtime under `name` when it has no namespace and
//! under `namespace-name` otherwise. The joined form is what existing
//! runtime records are named, so it is kept as the on-runtime name.
//!
//! The joined form is lossy once either half contains `-`:
//! `a-b` + `c` and `a` + `b-c` both produce `a-b-c`. Code that needs the
//! namespace or name of a runtime pod reads them from the embedded pod spec
//! rather than parsing the key; [`PodKey::parse`] is only exact for halves
//! without `-`.

use std::fmt;

/// Namespace + name pair identifying a pod.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PodKey {
    namespace: String,
    name: String,
}

impl PodKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Split a runtime pod name on its first `-`.
    pub fn parse(key: &str) -> Self {
        match key.split_once('-') {
            Some((namespace, name)) => Self::new(namespace, name),
            None => Self::new("", key),
        }
    }
}

impl fmt::Display for PodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}-{}", self.namespace, self.name)
        }
    }
}
