//! The bootstrap entry point.

use pipekit_core::cluster::{InstallChecker, NamespaceQuery};
use pipekit_core::{BootstrapOptions, Error, ImageRepo, NamespaceSet, Naming, Result};
use pipekit_resources::SecretSealer;
use tracing::info;

use crate::builder::ManifestTreeBuilder;
use crate::tree::ManifestTree;

/// One bootstrap run: preflight checks, then the full manifest tree.
pub struct Bootstrap {
    options: BootstrapOptions,
    naming: Naming,
    sealer: SecretSealer,
    install_checker: Option<Box<dyn InstallChecker>>,
    namespace_query: Option<Box<dyn NamespaceQuery>>,
    previous: Option<ManifestTree>,
}

impl Bootstrap {
    pub fn new(options: BootstrapOptions, naming: Naming, sealer: SecretSealer) -> Self {
        Self {
            options,
            naming,
            sealer,
            install_checker: None,
            namespace_query: None,
            previous: None,
        }
    }

    pub fn with_install_checker(mut self, checker: impl InstallChecker + 'static) -> Self {
        self.install_checker = Some(Box::new(checker));
        self
    }

    pub fn with_namespace_query(mut self, query: impl NamespaceQuery + 'static) -> Self {
        self.namespace_query = Some(Box::new(query));
        self
    }

    /// Regenerate over a previously written repository.
    pub fn with_existing_tree(mut self, previous: ManifestTree) -> Self {
        self.previous = Some(previous);
        self
    }

    /// Run the preflight checks and assemble the manifest tree.
    pub fn run(&self) -> Result<ManifestTree> {
        if !self.options.skip_checks {
            self.preflight()?;
        }

        let image_repo =
            ImageRepo::classify(&self.options.image_repo, &self.options.internal_registry_hostname)?;
        let namespaces = NamespaceSet::derive(&self.options.prefix);
        info!(
            prefix = %self.options.prefix,
            image = image_repo.repository(),
            internal = image_repo.is_internal(),
            "Bootstrapping"
        );

        let mut builder = ManifestTreeBuilder::new(
            &self.options,
            &self.naming,
            namespaces,
            image_repo,
            &self.sealer,
        );
        if let Some(query) = self.namespace_query.as_deref() {
            builder = builder.with_namespace_query(query);
        }
        if let Some(previous) = &self.previous {
            builder = builder.with_existing_tree(previous.clone());
        }
        builder.build()
    }

    fn preflight(&self) -> Result<()> {
        let checker = self.install_checker.as_deref().ok_or_else(|| {
            Error::PreflightNotInstalled("no installation checker configured".to_string())
        })?;
        if !checker.check_install()? {
            return Err(Error::PreflightNotInstalled(
                "Tekton Pipelines and Triggers must be installed".to_string(),
            ));
        }
        Ok(())
    }
}
