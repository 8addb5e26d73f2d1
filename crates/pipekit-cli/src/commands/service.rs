//! `pipekit service add`

use anyhow::{Context, Result};
use clap::Args;
use pipekit_builder::{add_service, serialize_tree};
use pipekit_core::ServiceSpec;
use std::path::{Path, PathBuf};
use tracing::info;

use super::SealingArgs;
use crate::files::{DirectorySink, load_tree};

#[derive(Args)]
pub struct AddArgs {
    /// Environment to add the service to
    #[arg(long)]
    env_name: String,

    /// Application the service belongs to; defaults to the repository name
    #[arg(long)]
    app_name: Option<String>,

    /// Service name; defaults to "<repository>-svc"
    #[arg(long)]
    service_name: Option<String>,

    /// Source repository of the service
    #[arg(long)]
    service_git_repo: String,

    /// Secret used to validate the service repository's webhooks
    #[arg(long, env = "PIPEKIT_SERVICE_WEBHOOK_SECRET", hide_env_values = true)]
    service_webhook_secret: String,

    /// Path of the repository's pipelines.yaml
    #[arg(long, default_value = "pipelines.yaml")]
    manifest: PathBuf,

    #[command(flatten)]
    sealing: SealingArgs,

    /// KDL configuration file, read for naming overrides
    #[arg(long, short)]
    config: Option<PathBuf>,
}

pub fn add(args: AddArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    let spec = spec(&args)?;

    let root = repository_root(&args.manifest);
    let mut tree = load_tree(root)
        .with_context(|| format!("Failed to load repository at {}", root.display()))?;

    let sealer = args.sealing.sealer(config.sealed_secrets_cert.as_deref())?;

    add_service(&mut tree, &sealer, &config.naming, &args.env_name, &spec)?;

    let written = serialize_tree(&tree, &mut DirectorySink::new(root))?;
    info!(files = written, root = %root.display(), "Service added");
    Ok(())
}

fn spec(args: &AddArgs) -> Result<ServiceSpec> {
    let mut spec = ServiceSpec::from_repo_url(
        &args.service_git_repo,
        args.service_webhook_secret.as_str(),
    )?;
    if let Some(app) = &args.app_name {
        spec.app_name = app.clone();
    }
    if let Some(name) = &args.service_name {
        spec.service_name = name.clone();
    }
    Ok(spec)
}

/// Directory holding the manifest; relative paths in the tree start here.
fn repository_root(manifest: &Path) -> &Path {
    match manifest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
