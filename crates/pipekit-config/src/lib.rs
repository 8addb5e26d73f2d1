//! KDL configuration parsing for pipekit.
//!
//! This crate handles parsing of:
//! - Bootstrap parameters and services (pipekit.kdl)
//! - Naming overrides
//! - Variable interpolation

pub mod bootstrap;
pub mod error;
pub mod variables;

pub use bootstrap::{BootstrapConfig, ServiceConfig, load_bootstrap, parse_bootstrap};
pub use error::{ConfigError, ConfigResult};
pub use variables::{VariableContext, VariableContextBuilder};
