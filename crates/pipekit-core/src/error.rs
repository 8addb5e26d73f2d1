//! Error types for pipekit.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("preflight check failed: {0}")]
    PreflightNotInstalled(String),

    #[error(
        "failed to parse image repo: {repo}, expected image repository in the form \
         <registry>/<username>/<repository> or <project>/<app> for internal registry"
    )]
    MalformedRepo { repo: String },

    #[error("sealing failed: {0}")]
    Sealing(String),

    #[error("cluster query failed: {0}")]
    ClusterQuery(String),

    #[error("failed to marshal {path}: {message}")]
    Serialization { path: String, message: String },

    #[error("failed to write {path}: {message}")]
    Write { path: String, message: String },

    #[error("manifest integrity violated: {0}")]
    Integrity(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn malformed_repo(repo: impl Into<String>) -> Self {
        Self::MalformedRepo { repo: repo.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
