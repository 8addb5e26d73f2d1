//! Kubernetes API backed cluster queries.

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{Api, Client};
use pipekit_core::cluster::{InstallChecker, NamespaceQuery};
use pipekit_core::{Error, Result};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, warn};

/// Definitions that must exist for the generated pipelines and triggers to apply.
pub const REQUIRED_CRDS: [&str; 2] = ["pipelines.tekton.dev", "eventlisteners.triggers.tekton.dev"];

/// Cluster queries over the kube client.
///
/// Owns a current-thread runtime and blocks on every request.
pub struct KubeCluster {
    client: Client,
    runtime: Runtime,
}

impl KubeCluster {
    /// Connect using the default kubeconfig or in-cluster configuration.
    pub fn connect() -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::ClusterQuery(format!("failed to start runtime: {e}")))?;
        let client = runtime
            .block_on(Client::try_default())
            .map_err(|e| Error::ClusterQuery(format!("failed to create client: {e}")))?;
        Ok(Self { client, runtime })
    }
}

impl InstallChecker for KubeCluster {
    fn check_install(&self) -> Result<bool> {
        let api: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        for crd in REQUIRED_CRDS {
            let found = exists(self.runtime.block_on(api.get(crd)), crd)?;
            if !found {
                warn!(crd, "Required CRD is not installed");
                return Ok(false);
            }
            debug!(crd, "Found CRD");
        }
        Ok(true)
    }
}

impl NamespaceQuery for KubeCluster {
    fn namespace_exists(&self, name: &str) -> Result<bool> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let found = exists(self.runtime.block_on(api.get(name)), name)?;
        debug!(namespace = name, found, "Checked namespace");
        Ok(found)
    }
}

/// Map a GET result to existence: not found is `false`, other errors propagate.
fn exists<T>(result: std::result::Result<T, kube::Error>, what: &str) -> Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
        Err(e) => Err(Error::ClusterQuery(format!("failed to get {what}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "boom".to_string(),
            reason: "Test".to_string(),
            code,
        })
    }

    #[test]
    fn test_exists() {
        assert!(exists(Ok::<_, kube::Error>(()), "x").unwrap());
        assert!(!exists::<()>(Err(api_error(404)), "x").unwrap());
    }

    #[test]
    fn test_other_errors_propagate() {
        let err = exists::<()>(Err(api_error(403)), "tst-cicd").unwrap_err();
        assert!(matches!(err, Error::ClusterQuery(msg) if msg.contains("tst-cicd")));
    }
}
