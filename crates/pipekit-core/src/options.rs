//! Bootstrap input parameters.

use crate::image_repo::DEFAULT_INTERNAL_REGISTRY;
use crate::repository::repo_from_url;
use crate::{Plaintext, Result};

/// Everything a bootstrap run needs, supplied once and never mutated.
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Prepended to every environment namespace name.
    pub prefix: String,
    /// Repository the generated configuration will be committed to.
    pub gitops_repo_url: String,
    pub gitops_webhook_secret: Plaintext,
    /// Application services deployed into the dev environment.
    pub services: Vec<ServiceSpec>,
    pub image_repo: String,
    pub internal_registry_hostname: String,
    /// Contents of a dockerconfigjson file, needed for external registries.
    pub docker_config: Option<Plaintext>,
    pub skip_checks: bool,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            gitops_repo_url: String::new(),
            gitops_webhook_secret: Plaintext::default(),
            services: Vec::new(),
            image_repo: String::new(),
            internal_registry_hostname: DEFAULT_INTERNAL_REGISTRY.to_string(),
            docker_config: None,
            skip_checks: false,
        }
    }
}

/// A service to generate deployment configuration for.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    pub app_name: String,
    pub service_name: String,
    pub source_url: String,
    pub webhook_secret: Plaintext,
}

impl ServiceSpec {
    /// Derive the application and service names from the source repository.
    ///
    /// `https://github.com/my-org/http-api.git` yields app `http-api` and
    /// service `http-api-svc`.
    pub fn from_repo_url(source_url: &str, webhook_secret: impl Into<Plaintext>) -> Result<Self> {
        let repo = repo_from_url(source_url)?;
        Ok(Self {
            service_name: format!("{repo}-svc"),
            app_name: repo,
            source_url: source_url.to_string(),
            webhook_secret: webhook_secret.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_from_repo_url() {
        let svc = ServiceSpec::from_repo_url("https://github.com/my-org/http-api.git", "456").unwrap();
        assert_eq!(svc.app_name, "http-api");
        assert_eq!(svc.service_name, "http-api-svc");
        assert_eq!(svc.source_url, "https://github.com/my-org/http-api.git");
        assert_eq!(svc.webhook_secret.expose(), "456");
    }

    #[test]
    fn test_default_internal_registry() {
        let opts = BootstrapOptions::default();
        assert_eq!(opts.internal_registry_hostname, DEFAULT_INTERNAL_REGISTRY);
        assert!(!opts.skip_checks);
    }
}
