//! Image repository classification.

use crate::{Error, Result};

/// Public registries that are never treated as an internal `<project>/<app>` shorthand.
const PUBLIC_REGISTRIES: [&str; 2] = ["docker.io", "quay.io"];

/// Default hostname of the OpenShift internal image registry.
pub const DEFAULT_INTERNAL_REGISTRY: &str = "image-registry.openshift-image-registry.svc:5000";

/// Where pipeline-built images are pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRepo {
    internal: bool,
    repository: String,
}

impl ImageRepo {
    /// Validate `raw` and decide whether it targets the internal registry.
    ///
    /// Accepts `<registry>/<username>/<repository>` or the internal-registry
    /// shorthand `<project>/<app>`, which gets `internal_hostname` prepended.
    pub fn classify(raw: &str, internal_hostname: &str) -> Result<Self> {
        let components: Vec<&str> = raw.split('/').collect();

        if components.len() < 2 || components.len() > 3 {
            return Err(Error::malformed_repo(raw));
        }
        if components.iter().any(|c| c.trim().is_empty()) {
            return Err(Error::malformed_repo(raw));
        }

        if components.len() == 2 {
            // docker.io/foo looks like registry/user with the repository missing
            if PUBLIC_REGISTRIES.contains(&components[0]) {
                return Err(Error::malformed_repo(raw));
            }
            return Ok(Self {
                internal: true,
                repository: format!("{internal_hostname}/{raw}"),
            });
        }

        Ok(Self {
            internal: components[0] == internal_hostname,
            repository: raw.to_string(),
        })
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }

    /// The normalized `<registry>/<namespace>/<repository>` path.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Namespace of the internal registry project that receives pushes.
    pub fn registry_namespace(&self) -> Option<&str> {
        if !self.internal {
            return None;
        }
        self.repository.split('/').nth(1)
    }
}
