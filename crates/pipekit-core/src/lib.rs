//! Core domain types and traits for pipekit.
//!
//! This crate contains:
//! - Error types shared by every pipekit crate
//! - Bootstrap options and the naming table
//! - Namespace derivation and image repository classification
//! - The `pipelines.yaml` manifest descriptor
//! - Collaborator traits (cluster checks, sealing capabilities)

pub mod cluster;
pub mod error;
pub mod image_repo;
pub mod manifest;
pub mod meta;
pub mod naming;
pub mod options;
pub mod repository;
pub mod secret;

pub use error::{Error, Result};
pub use image_repo::ImageRepo;
pub use meta::NamespacedName;
pub use naming::{NamespaceSet, Naming, Role};
pub use options::{BootstrapOptions, ServiceSpec};
pub use secret::Plaintext;
