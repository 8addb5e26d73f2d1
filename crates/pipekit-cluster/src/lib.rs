//! Live collaborators for pipekit.
//!
//! - [`KubeCluster`]: installation check and namespace lookups against the
//!   current kubeconfig context
//! - [`kubeseal`]: certificate sources and the encryptor backed by the
//!   `kubeseal` binary

pub mod kubernetes;
pub mod kubeseal;

pub use kubernetes::KubeCluster;
pub use kubeseal::{CertFileKeySource, KubesealCertSource, KubesealEncryptor};
