//! Live-cluster collaborators.
//!
//! Both calls block until the cluster answers. Retry and timeout policy belongs
//! to the implementation, never to the manifest engine.

use crate::Result;
use std::rc::Rc;

/// Checks that the pipeline engine the generated manifests target is installed.
pub trait InstallChecker {
    /// `Ok(false)` when the cluster answered but something is missing.
    fn check_install(&self) -> Result<bool>;
}

/// Answers whether a namespace already exists on the cluster.
pub trait NamespaceQuery {
    fn namespace_exists(&self, name: &str) -> Result<bool>;
}

impl<T: InstallChecker + ?Sized> InstallChecker for Rc<T> {
    fn check_install(&self) -> Result<bool> {
        (**self).check_install()
    }
}

impl<T: NamespaceQuery + ?Sized> NamespaceQuery for Rc<T> {
    fn namespace_exists(&self, name: &str) -> Result<bool> {
        (**self).namespace_exists(name)
    }
}
