//! `pipekit bootstrap`

use anyhow::{Context, Result, bail};
use clap::Args;
use pipekit_builder::{Bootstrap, ManifestSink, StreamSink, serialize_tree};
use pipekit_builder::paths::MANIFEST_PATH;
use pipekit_cluster::KubeCluster;
use pipekit_core::{BootstrapOptions, ImageRepo, Plaintext, ServiceSpec};
use pipekit_config::BootstrapConfig;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::info;

use super::SealingArgs;
use crate::files::{DirectorySink, load_docker_config, load_tree};

#[derive(Args)]
pub struct BootstrapArgs {
    /// KDL configuration file; flags override its values
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Prefix for every environment namespace, e.g. "tst-"
    #[arg(long)]
    prefix: Option<String>,

    /// URL of the GitOps repository
    #[arg(long)]
    gitops_repo_url: Option<String>,

    /// Secret used to validate GitOps repository webhooks
    #[arg(long, env = "PIPEKIT_GITOPS_WEBHOOK_SECRET", hide_env_values = true)]
    gitops_webhook_secret: Option<String>,

    /// URL of an application source repository
    #[arg(long)]
    app_repo_url: Option<String>,

    /// Secret used to validate application repository webhooks
    #[arg(long, env = "PIPEKIT_APP_WEBHOOK_SECRET", hide_env_values = true)]
    app_webhook_secret: Option<String>,

    /// Image repository, <registry>/<user>/<repo> or <project>/<app> for the internal registry
    #[arg(long)]
    image_repo: Option<String>,

    /// Hostname of the internal image registry
    #[arg(long)]
    internal_registry_hostname: Option<String>,

    /// dockerconfigjson file for pushing to an external registry
    #[arg(long)]
    dockercfgjson: Option<String>,

    #[command(flatten)]
    sealing: SealingArgs,

    /// Skip the cluster checks and generate offline
    #[arg(long)]
    skip_checks: bool,

    /// Directory to write the generated repository to
    #[arg(long, short, default_value = ".", conflicts_with = "stdout")]
    output: PathBuf,

    /// Write a multi-document YAML stream to stdout instead
    #[arg(long)]
    stdout: bool,
}

const DEFAULT_DOCKER_CONFIG: &str = "~/.docker/config.json";

pub fn run(args: BootstrapArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref())?;
    let config_cert = config.sealed_secrets_cert.clone();
    let naming = config.naming.clone();
    let options = options(&args, config)?;

    let sealer = args.sealing.sealer(config_cert.as_deref())?;
    let mut bootstrap = Bootstrap::new(options.clone(), naming, sealer);

    if !options.skip_checks {
        let cluster = Rc::new(KubeCluster::connect()?);
        bootstrap = bootstrap
            .with_install_checker(cluster.clone())
            .with_namespace_query(cluster);
    }
    if !args.stdout && args.output.join(MANIFEST_PATH).exists() {
        info!(path = %args.output.display(), "Regenerating over existing repository");
        bootstrap = bootstrap.with_existing_tree(load_tree(&args.output)?);
    }

    let tree = bootstrap.run()?;

    let written = if args.stdout {
        let stdout = std::io::stdout();
        write(&tree, &mut StreamSink::new(stdout.lock()))?
    } else {
        write(&tree, &mut DirectorySink::new(&args.output))?
    };
    info!(files = written, "Bootstrap complete");
    Ok(())
}

fn write(tree: &pipekit_builder::ManifestTree, sink: &mut dyn ManifestSink) -> Result<usize> {
    Ok(serialize_tree(tree, sink)?)
}

/// Merge flags over the configuration file into bootstrap options.
fn options(args: &BootstrapArgs, config: BootstrapConfig) -> Result<BootstrapOptions> {
    let mut options = BootstrapOptions::default();

    options.prefix = args.prefix.clone().or(config.prefix).unwrap_or_default();
    options.gitops_repo_url = args
        .gitops_repo_url
        .clone()
        .or(config.gitops_repo_url)
        .context("--gitops-repo-url is required")?;
    options.gitops_webhook_secret = args
        .gitops_webhook_secret
        .clone()
        .map(Plaintext::new)
        .or(config.gitops_webhook_secret)
        .context("--gitops-webhook-secret is required")?;
    options.image_repo = args
        .image_repo
        .clone()
        .or(config.image_repo)
        .context("--image-repo is required")?;
    if let Some(host) = args
        .internal_registry_hostname
        .clone()
        .or(config.internal_registry_hostname)
    {
        options.internal_registry_hostname = host;
    }
    options.skip_checks = args.skip_checks;

    for svc in config.services {
        let Some(secret) = svc.webhook_secret else {
            bail!("service {} has no webhook-secret", svc.source_url);
        };
        let mut spec = ServiceSpec::from_repo_url(&svc.source_url, secret)?;
        if let Some(app) = svc.app_name {
            spec.app_name = app;
        }
        if let Some(name) = svc.service_name {
            spec.service_name = name;
        }
        options.services.push(spec);
    }
    if let Some(url) = &args.app_repo_url {
        let secret = args
            .app_webhook_secret
            .clone()
            .context("--app-webhook-secret is required with --app-repo-url")?;
        if options.services.iter().any(|s| &s.source_url == url) {
            bail!("service {url} is given twice");
        }
        options.services.push(ServiceSpec::from_repo_url(url, secret)?);
    }
    if options.services.is_empty() {
        bail!("at least one service is required, pass --app-repo-url or declare one in the config");
    }

    let image_repo = ImageRepo::classify(&options.image_repo, &options.internal_registry_hostname)?;
    if !image_repo.is_internal() {
        let path = args
            .dockercfgjson
            .clone()
            .or(config.dockercfgjson)
            .unwrap_or_else(|| DEFAULT_DOCKER_CONFIG.to_string());
        options.docker_config = Some(load_docker_config(&path)?);
    }

    Ok(options)
}
