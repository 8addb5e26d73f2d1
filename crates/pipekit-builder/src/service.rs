//! Per-service deployment configuration and the add-service operation.

use pipekit_core::manifest::{SecretRef, Service as ServiceEntry, Webhook};
use pipekit_core::{Error, NamespacedName, Naming, Result, ServiceSpec};
use pipekit_resources::{SealedSecret, SecretSealer};
use pipekit_resources::objects::{deployment, service};
use tracing::{debug, info};

use crate::paths::{
    DEPLOYMENT_FILE, KUSTOMIZATION, MANIFEST_PATH, SECRETS_DIR, SERVICE_FILE, app_dir, join,
    pipelines_dir, service_dir,
};
use crate::tree::ManifestTree;

/// Emit the deployment, service, kustomizations and sealed webhook secret of
/// one service, returning its descriptor entry.
///
/// Every write is idempotent: emitting the same service twice leaves the
/// tree as after the first time.
pub(crate) fn emit_service(
    tree: &mut ManifestTree,
    sealer: &SecretSealer,
    naming: &Naming,
    env: &str,
    cicd: &str,
    spec: &ServiceSpec,
) -> Result<ServiceEntry> {
    emit_service_config(tree, naming, env, &spec.app_name, &spec.service_name)?;

    let secret_name = naming.service_webhook_secret(&spec.service_name);
    let sealed = sealer.seal_opaque(
        &NamespacedName::new(cicd, &secret_name),
        &naming.webhook_secret_key,
        &spec.webhook_secret,
    )?;
    list_webhook_secret(tree, cicd, &secret_name, sealed)?;

    debug!(service = %spec.service_name, env, app = %spec.app_name, "Emitted service configuration");

    Ok(ServiceEntry {
        name: spec.service_name.clone(),
        source_url: Some(spec.source_url.clone()),
        webhook: Some(Webhook {
            secret: SecretRef {
                name: secret_name,
                namespace: cicd.to_string(),
            },
        }),
    })
}

/// Emit the deployment, service and kustomizations of a service.
pub(crate) fn emit_service_config(
    tree: &mut ManifestTree,
    naming: &Naming,
    env: &str,
    app_name: &str,
    service_name: &str,
) -> Result<()> {
    let svc_dir = service_dir(env, service_name);
    let config_dir = join(&svc_dir, "base/config");
    let name = NamespacedName::new(env, service_name);

    tree.insert_listed(
        &config_dir,
        DEPLOYMENT_FILE,
        deployment(&name, app_name, &naming.bootstrap_image, naming.container_port),
    )?;
    tree.insert_listed(
        &config_dir,
        SERVICE_FILE,
        service(&name, app_name, naming.container_port),
    )?;
    tree.kustomization_mut(&join(&svc_dir, "base"))?
        .add_base("./config");
    tree.kustomization_mut(&join(&svc_dir, "overlays"))?
        .add_base("../base");

    let app = app_dir(env, app_name);
    tree.kustomization_mut(&join(&app, "base"))?
        .add_base(format!("../../../services/{service_name}/overlays"));
    tree.kustomization_mut(&join(&app, "overlays"))?
        .add_base("../base");
    Ok(())
}

/// Path of a service webhook secret, relative to the CI/CD pipelines directory.
pub(crate) fn webhook_secret_file(secret_name: &str) -> String {
    format!("{SECRETS_DIR}/{secret_name}.yaml")
}

/// Store a sealed webhook secret and list it in the pipelines kustomization.
pub(crate) fn list_webhook_secret(
    tree: &mut ManifestTree,
    cicd: &str,
    secret_name: &str,
    sealed: SealedSecret,
) -> Result<()> {
    tree.insert_listed(&pipelines_dir(cicd), &webhook_secret_file(secret_name), sealed)
}

/// Add a service to an already bootstrapped repository.
///
/// `tree` must hold at least the `pipelines.yaml` descriptor and the
/// kustomization of the CI/CD pipelines directory. On error the tree is left
/// untouched.
pub fn add_service(
    tree: &mut ManifestTree,
    sealer: &SecretSealer,
    naming: &Naming,
    env_name: &str,
    spec: &ServiceSpec,
) -> Result<()> {
    let mut manifest = tree
        .manifest()
        .cloned()
        .ok_or_else(|| Error::InvalidInput(format!("{MANIFEST_PATH} not found")))?;

    if manifest.environment(env_name).is_none() {
        return Err(Error::InvalidInput(format!(
            "environment {env_name} does not exist"
        )));
    }
    let cicd = manifest
        .cicd_environment()
        .map(|e| e.name.clone())
        .ok_or_else(|| Error::InvalidInput("no CI/CD environment in manifest".to_string()))?;

    let pipelines_kustomization = join(&pipelines_dir(&cicd), KUSTOMIZATION);
    if !tree.contains(&pipelines_kustomization) {
        return Err(Error::InvalidInput(format!(
            "{pipelines_kustomization} not found"
        )));
    }

    let mut staged = tree.clone();
    let entry = emit_service(&mut staged, sealer, naming, env_name, &cicd, spec)?;
    if let Some(env) = manifest.environment_mut(env_name) {
        env.add_service(&spec.app_name, entry);
    }
    staged.insert(MANIFEST_PATH, manifest);
    *tree = staged;

    info!(
        environment = env_name,
        app = %spec.app_name,
        service = %spec.service_name,
        "Added service"
    );
    Ok(())
}
