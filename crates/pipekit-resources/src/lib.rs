//! Resource factory for pipekit.
//!
//! Pure builder functions for every resource kind a bootstrap emits, the
//! [`Resource`] sum type that carries them through the manifest tree, and the
//! [`SecretSealer`] that turns plaintext secrets into sealed secrets.
//!
//! Builders never consult global state: the metadata of every resource comes
//! from the [`NamespacedName`](pipekit_core::NamespacedName) it is given.

pub mod kustomization;
pub mod meta;
pub mod objects;
pub mod rbac;
pub mod resource;
pub mod route;
pub mod sealed;
pub mod sealer;
pub mod tekton;

pub use kustomization::Kustomization;
pub use resource::Resource;
pub use sealed::{SealedSecret, SecretType};
pub use sealer::SecretSealer;
