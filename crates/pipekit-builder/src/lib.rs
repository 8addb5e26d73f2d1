//! Manifest tree assembly for pipekit.
//!
//! [`Bootstrap`] runs the preflight checks and drives the
//! [`ManifestTreeBuilder`], which produces a verified [`ManifestTree`].
//! [`add_service`] extends an existing tree, and [`serialize_tree`] writes a
//! tree to any [`ManifestSink`].

pub mod bootstrap;
pub mod builder;
pub mod paths;
pub mod serializer;
pub mod service;
pub mod tree;

#[cfg(test)]
mod testing;

pub use bootstrap::Bootstrap;
pub use builder::ManifestTreeBuilder;
pub use serializer::{ManifestSink, MemorySink, StreamSink, serialize_tree};
pub use service::add_service;
pub use tree::ManifestTree;
