pub mod bootstrap;
pub mod service;

use anyhow::{Context, Result};
use clap::Args;
use pipekit_cluster::{CertFileKeySource, KubesealCertSource, KubesealEncryptor};
use pipekit_config::{BootstrapConfig, VariableContext, load_bootstrap};
use pipekit_resources::SecretSealer;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Load a KDL configuration file, or an empty configuration when none is given.
pub(crate) fn load_config(path: Option<&Path>) -> Result<BootstrapConfig> {
    let Some(path) = path else {
        return Ok(BootstrapConfig::default());
    };
    let config = load_bootstrap(path, &VariableContext::from_process_env())
        .with_context(|| format!("Failed to load config file: {}", path.display()))?;
    debug!(path = %path.display(), services = config.services.len(), "Loaded config");
    Ok(config)
}

/// Where the sealing certificate comes from.
#[derive(Args, Debug, Default)]
pub struct SealingArgs {
    /// Sealed-secrets controller certificate; fetched from the cluster when absent
    #[arg(long)]
    sealed_secrets_cert: Option<PathBuf>,

    /// Namespace of the sealed-secrets controller to fetch the certificate from
    #[arg(long, requires = "sealed_secrets_controller")]
    sealed_secrets_namespace: Option<String>,

    /// Name of the sealed-secrets controller to fetch the certificate from
    #[arg(long, requires = "sealed_secrets_namespace")]
    sealed_secrets_controller: Option<String>,
}

impl SealingArgs {
    /// Build a sealer from a certificate file, or from the cluster's controller.
    ///
    /// `fallback_cert` is the certificate named in the config file.
    pub(crate) fn sealer(&self, fallback_cert: Option<&str>) -> Result<SecretSealer> {
        let encryptor = KubesealEncryptor::new()?;
        let cert = self
            .sealed_secrets_cert
            .clone()
            .or_else(|| fallback_cert.map(PathBuf::from));
        if let Some(path) = cert {
            return Ok(SecretSealer::new(CertFileKeySource::new(path), encryptor));
        }

        let mut source = KubesealCertSource::new()?;
        if let (Some(ns), Some(name)) = (&self.sealed_secrets_namespace, &self.sealed_secrets_controller) {
            debug!(namespace = %ns, controller = %name, "Using sealed-secrets controller");
            source = source.controller(ns, name);
        }
        Ok(SecretSealer::new(source, encryptor))
    }
}
