//! Assembles the complete manifest tree of a bootstrap.

use pipekit_core::cluster::NamespaceQuery;
use pipekit_core::manifest::{
    Environment, Manifest, Pipelines, Service as ServiceEntry, TemplateBinding,
};
use pipekit_core::repository::org_repo_from_url;
use pipekit_core::{
    BootstrapOptions, Error, ImageRepo, NamespaceSet, NamespacedName, Naming, Result,
};
use pipekit_resources::objects::{add_secret_to_service_account, namespace, service_account};
use pipekit_resources::rbac::{EDIT_CLUSTER_ROLE, RoleKind, pipeline_rules, role, role_binding};
use pipekit_resources::route::{EVENT_LISTENER_PORT, route};
use pipekit_resources::tekton::eventlisteners::{
    app_repo_filter, cel_interceptor, event_listener, github_interceptor, gitops_repo_filter,
    trigger,
};
use pipekit_resources::tekton::pipelines::{
    APP_CI_PIPELINE, CI_DRYRUN_FROM_PR_PIPELINE, app_ci_pipeline, ci_dryrun_from_pr_pipeline,
};
use pipekit_resources::tekton::tasks::{
    BUILD_IMAGE_TASK, DEPLOY_FROM_SOURCE_TASK, build_image_task, deploy_from_source_task,
};
use pipekit_resources::tekton::triggers::{
    APP_CI_BUILD_PR_TEMPLATE, CI_DRYRUN_FROM_PR_TEMPLATE, GITHUB_PR_BINDING,
    app_ci_build_pr_template, ci_dryrun_from_pr_template, github_pr_binding,
};
use pipekit_resources::{Resource, SecretSealer};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::paths::{
    BINDINGS_DIR, EVENT_LISTENERS_DIR, Layout, MANIFEST_PATH, NAMESPACES_DIR, PIPELINES_DIR,
    ROLEBINDINGS_DIR, ROUTES_DIR, SECRETS_DIR, TASKS_DIR, TEMPLATES_DIR, env_base, env_overlays,
    join, pipelines_dir,
};
use crate::service::{emit_service, emit_service_config, list_webhook_secret, webhook_secret_file};
use crate::tree::ManifestTree;

const SERVICE_ACCOUNT_FILE: &str = "pipeline-service-account.yaml";
const DOCKER_CONFIG_FILE: &str = "docker-config.yaml";

/// Builds the manifest tree stage by stage.
///
/// Stages run in a fixed order and each one only adds to the tree. The first
/// failing stage aborts the build and the partial tree is dropped.
pub struct ManifestTreeBuilder<'a> {
    options: &'a BootstrapOptions,
    naming: &'a Naming,
    image_repo: ImageRepo,
    layout: Layout,
    sealer: &'a SecretSealer,
    namespace_query: Option<&'a dyn NamespaceQuery>,
    previous: Option<ManifestTree>,
    services: Vec<(String, ServiceEntry)>,
    tree: ManifestTree,
}

impl<'a> ManifestTreeBuilder<'a> {
    pub fn new(
        options: &'a BootstrapOptions,
        naming: &'a Naming,
        namespaces: NamespaceSet,
        image_repo: ImageRepo,
        sealer: &'a SecretSealer,
    ) -> Self {
        Self {
            options,
            naming,
            image_repo,
            layout: Layout::new(namespaces),
            sealer,
            namespace_query: None,
            previous: None,
            services: Vec::new(),
            tree: ManifestTree::new(),
        }
    }

    /// Skip emitting the registry namespace when the cluster already has it.
    pub fn with_namespace_query(mut self, query: &'a dyn NamespaceQuery) -> Self {
        self.namespace_query = Some(query);
        self
    }

    /// Build on a previously generated repository.
    ///
    /// The generated descriptor is merged into the one found in `previous`.
    /// Services recorded there but not declared again keep their configuration
    /// and their sealed webhook secret, which is taken over from `previous`.
    pub fn with_existing_tree(mut self, previous: ManifestTree) -> Self {
        self.previous = Some(previous);
        self
    }

    pub fn build(mut self) -> Result<ManifestTree> {
        self.add_namespaces()?;
        self.add_rbac()?;
        self.add_registry()?;
        self.add_pipelines()?;
        self.add_services()?;
        self.add_existing_services()?;
        self.add_descriptor()?;
        self.add_overlays()?;
        self.tree.verify()?;

        info!(
            files = self.tree.len(),
            cicd = self.layout.namespaces().cicd(),
            "Manifest tree assembled"
        );
        Ok(self.tree)
    }

    fn ns(&self) -> &NamespaceSet {
        self.layout.namespaces()
    }

    fn cicd_name(&self, name: &str) -> NamespacedName {
        NamespacedName::new(self.ns().cicd(), name)
    }

    fn insert_pipeline_file(&mut self, sub: &str, file: &str, resource: impl Into<Resource>) -> Result<()> {
        let dir = self.layout.pipelines();
        self.tree.insert_listed(&dir, &join(sub, file), resource)
    }

    fn add_namespaces(&mut self) -> Result<()> {
        debug!(stage = "namespaces", "Running build stage");
        let ns = self.ns().clone();

        self.insert_pipeline_file(NAMESPACES_DIR, "cicd-environment.yaml", namespace(ns.cicd()))?;
        for env in [ns.dev(), ns.stage()] {
            self.tree.insert_listed(
                &env_base(env),
                &format!("{env}-environment.yaml"),
                namespace(env),
            )?;
        }
        let argocd = ns.argocd();
        self.tree.insert_listed(
            &self.layout.argocd_config(),
            &format!("{argocd}-environment.yaml"),
            namespace(argocd),
        )
    }

    fn add_rbac(&mut self) -> Result<()> {
        debug!(stage = "rbac", "Running build stage");
        let naming = self.naming;
        let sa = service_account(&self.cicd_name(&naming.service_account));

        self.insert_pipeline_file(
            ROLEBINDINGS_DIR,
            "pipeline-service-role.yaml",
            role(&self.cicd_name(&naming.role), pipeline_rules()),
        )?;
        self.insert_pipeline_file(
            ROLEBINDINGS_DIR,
            "pipeline-service-rolebinding.yaml",
            role_binding(&self.cicd_name(&naming.role_binding), &sa, RoleKind::Role, &naming.role),
        )?;
        self.insert_pipeline_file(
            ROLEBINDINGS_DIR,
            "edit-clusterrole-binding.yaml",
            role_binding(
                &self.cicd_name(&naming.cicd_edit_binding),
                &sa,
                RoleKind::ClusterRole,
                EDIT_CLUSTER_ROLE,
            ),
        )?;

        let ns = self.ns().clone();
        for (env, binding) in [
            (ns.dev(), &naming.dev_edit_binding),
            (ns.stage(), &naming.stage_edit_binding),
        ] {
            self.tree.insert_listed(
                &env_base(env),
                &format!("{env}-rolebinding.yaml"),
                role_binding(
                    &NamespacedName::new(env, binding),
                    &sa,
                    RoleKind::ClusterRole,
                    EDIT_CLUSTER_ROLE,
                ),
            )?;
        }

        self.insert_pipeline_file(ROLEBINDINGS_DIR, SERVICE_ACCOUNT_FILE, sa)
    }

    fn add_registry(&mut self) -> Result<()> {
        debug!(stage = "registry", internal = self.image_repo.is_internal(), "Running build stage");
        if self.image_repo.is_internal() {
            self.add_internal_registry()
        } else {
            self.add_external_registry()
        }
    }

    fn add_internal_registry(&mut self) -> Result<()> {
        let registry_ns = self
            .image_repo
            .registry_namespace()
            .map(str::to_string)
            .ok_or_else(|| Error::malformed_repo(self.image_repo.repository()))?;

        let generated = self.ns().iter().any(|(_, ns)| ns == registry_ns);
        let exists = match self.namespace_query {
            Some(query) if !generated => query.namespace_exists(&registry_ns)?,
            _ => generated,
        };
        if exists {
            debug!(namespace = %registry_ns, "Registry namespace exists, not emitting it");
        } else {
            self.insert_pipeline_file(
                NAMESPACES_DIR,
                &format!("{registry_ns}-environment.yaml"),
                namespace(&registry_ns),
            )?;
        }

        let sa = service_account(&self.cicd_name(&self.naming.service_account));
        self.insert_pipeline_file(
            ROLEBINDINGS_DIR,
            "internal-registry-binding.yaml",
            role_binding(
                &NamespacedName::new(&registry_ns, &self.naming.internal_registry_binding),
                &sa,
                RoleKind::ClusterRole,
                EDIT_CLUSTER_ROLE,
            ),
        )
    }

    fn add_external_registry(&mut self) -> Result<()> {
        let docker_config = self.options.docker_config.clone().unwrap_or_default();
        let sealed = self.sealer.seal_docker_config(
            &self.cicd_name(&self.naming.docker_secret),
            &docker_config,
        )?;
        self.insert_pipeline_file(SECRETS_DIR, DOCKER_CONFIG_FILE, sealed)?;

        let path = join(&self.layout.pipelines(), &join(ROLEBINDINGS_DIR, SERVICE_ACCOUNT_FILE));
        match self.tree.get_mut(&path) {
            Some(Resource::ServiceAccount(sa)) => {
                *sa = add_secret_to_service_account(std::mem::take(sa), &self.naming.docker_secret);
                Ok(())
            }
            _ => Err(Error::Integrity(format!("{path}: service account missing"))),
        }
    }

    fn add_pipelines(&mut self) -> Result<()> {
        debug!(stage = "pipelines", "Running build stage");
        let naming = self.naming;
        let org_repo = org_repo_from_url(&self.options.gitops_repo_url)?;

        let sealed = self.sealer.seal_opaque(
            &self.cicd_name(&naming.gitops_webhook_secret),
            &naming.webhook_secret_key,
            &self.options.gitops_webhook_secret,
        )?;
        self.insert_pipeline_file(SECRETS_DIR, "gitops-webhook-secret.yaml", sealed)?;

        let tls_verify = !self.image_repo.is_internal();
        self.insert_pipeline_file(
            TASKS_DIR,
            "build-image-task.yaml",
            build_image_task(&self.cicd_name(BUILD_IMAGE_TASK), tls_verify),
        )?;
        self.insert_pipeline_file(
            TASKS_DIR,
            "deploy-from-source-task.yaml",
            deploy_from_source_task(&self.cicd_name(DEPLOY_FROM_SOURCE_TASK)),
        )?;

        self.insert_pipeline_file(
            PIPELINES_DIR,
            "app-ci-pipeline.yaml",
            app_ci_pipeline(&self.cicd_name(APP_CI_PIPELINE), BUILD_IMAGE_TASK),
        )?;
        self.insert_pipeline_file(
            PIPELINES_DIR,
            "ci-dryrun-from-pr-pipeline.yaml",
            ci_dryrun_from_pr_pipeline(
                &self.cicd_name(CI_DRYRUN_FROM_PR_PIPELINE),
                DEPLOY_FROM_SOURCE_TASK,
            ),
        )?;

        self.insert_pipeline_file(
            BINDINGS_DIR,
            "github-pr-binding.yaml",
            github_pr_binding(&self.cicd_name(GITHUB_PR_BINDING)),
        )?;

        self.insert_pipeline_file(
            TEMPLATES_DIR,
            "app-ci-build-pr-template.yaml",
            app_ci_build_pr_template(
                &self.cicd_name(APP_CI_BUILD_PR_TEMPLATE),
                &naming.service_account,
                APP_CI_PIPELINE,
                self.image_repo.repository(),
            ),
        )?;
        self.insert_pipeline_file(
            TEMPLATES_DIR,
            "ci-dryrun-from-pr-template.yaml",
            ci_dryrun_from_pr_template(
                &self.cicd_name(CI_DRYRUN_FROM_PR_TEMPLATE),
                &naming.service_account,
                CI_DRYRUN_FROM_PR_PIPELINE,
            ),
        )?;

        let triggers = vec![
            trigger(
                "ci-dryrun-from-pr",
                vec![
                    github_interceptor(
                        Some(naming.gitops_webhook_secret.as_str()),
                        &naming.webhook_secret_key,
                    ),
                    cel_interceptor(gitops_repo_filter(&org_repo)),
                ],
                GITHUB_PR_BINDING,
                CI_DRYRUN_FROM_PR_TEMPLATE,
            ),
            // One trigger serves every application repository, so it checks the
            // event type only. Per-service webhook secrets are sealed into the
            // CI/CD namespace and recorded in pipelines.yaml for the webhooks
            // registered on each repository.
            trigger(
                "app-ci-build-from-pr",
                vec![
                    github_interceptor(None, &naming.webhook_secret_key),
                    cel_interceptor(app_repo_filter(&org_repo)),
                ],
                GITHUB_PR_BINDING,
                APP_CI_BUILD_PR_TEMPLATE,
            ),
        ];
        self.insert_pipeline_file(
            EVENT_LISTENERS_DIR,
            "cicd-event-listener.yaml",
            event_listener(
                &self.cicd_name(&naming.event_listener),
                &naming.service_account,
                triggers,
            ),
        )?;

        self.insert_pipeline_file(
            ROUTES_DIR,
            "gitops-webhook-event-listener.yaml",
            route(
                &self.cicd_name(&naming.route),
                &naming.event_listener_service(),
                EVENT_LISTENER_PORT,
            ),
        )
    }

    fn add_services(&mut self) -> Result<()> {
        debug!(stage = "services", count = self.options.services.len(), "Running build stage");
        let options = self.options;
        let mut seen = HashSet::new();
        let dev = self.ns().dev().to_string();
        let cicd = self.ns().cicd().to_string();

        for spec in &options.services {
            if !seen.insert(spec.service_name.as_str()) {
                warn!(service = %spec.service_name, "Service declared twice, ignoring duplicate");
                continue;
            }
            let entry = emit_service(&mut self.tree, self.sealer, self.naming, &dev, &cicd, spec)?;
            self.services.push((spec.app_name.clone(), entry));
        }
        Ok(())
    }

    fn add_existing_services(&mut self) -> Result<()> {
        let Some(previous) = self.previous.take() else {
            return Ok(());
        };
        let result = self.keep_services(&previous);
        self.previous = Some(previous);
        result
    }

    /// Re-emit the services recorded in `previous` that were not declared again.
    fn keep_services(&mut self, previous: &ManifestTree) -> Result<()> {
        let Some(manifest) = previous.manifest() else {
            return Ok(());
        };
        debug!(stage = "existing-services", "Running build stage");

        let dev = self.ns().dev().to_string();
        let cicd = self.ns().cicd().to_string();
        let declared: HashSet<&str> = self.services.iter().map(|(_, s)| s.name.as_str()).collect();

        for env in &manifest.environments {
            for (app, svc) in env.services() {
                if env.name == dev && declared.contains(svc.name.as_str()) {
                    continue;
                }
                emit_service_config(&mut self.tree, self.naming, &env.name, app, &svc.name)?;

                let Some(webhook) = &svc.webhook else {
                    continue;
                };
                let secret = &webhook.secret;
                if secret.namespace != cicd {
                    return Err(Error::InvalidInput(format!(
                        "service {} keeps its webhook secret in {}, not in {cicd}",
                        svc.name, secret.namespace
                    )));
                }
                let path = join(&pipelines_dir(&cicd), &webhook_secret_file(&secret.name));
                let sealed = match previous.get(&path) {
                    Some(Resource::SealedSecret(sealed)) => sealed.clone(),
                    _ => {
                        return Err(Error::Integrity(format!(
                            "service {} refers to {path}, which does not exist",
                            svc.name
                        )));
                    }
                };
                list_webhook_secret(&mut self.tree, &cicd, &secret.name, sealed)?;
                debug!(service = %svc.name, env = %env.name, "Kept existing service");
            }
        }
        Ok(())
    }

    fn add_descriptor(&mut self) -> Result<()> {
        debug!(stage = "descriptor", "Running build stage");
        let ns = self.ns();

        let mut dev = Environment::new(ns.dev());
        dev.pipelines = Some(Pipelines {
            integration: Some(TemplateBinding {
                template: APP_CI_BUILD_PR_TEMPLATE.to_string(),
                binding: GITHUB_PR_BINDING.to_string(),
            }),
        });
        for (app, service) in &self.services {
            dev.add_service(app, service.clone());
        }

        let mut cicd = Environment::new(ns.cicd());
        cicd.cicd = true;
        let mut argocd = Environment::new(ns.argocd());
        argocd.argo = true;

        let generated = Manifest {
            gitops_url: Some(self.options.gitops_repo_url.clone()),
            environments: vec![dev, Environment::new(ns.stage()), cicd, argocd],
        };

        let manifest = match self.previous.as_ref().and_then(ManifestTree::manifest).cloned() {
            Some(mut existing) => {
                existing.merge(generated);
                existing
            }
            None => generated,
        };
        self.tree.insert(MANIFEST_PATH, manifest);
        Ok(())
    }

    fn add_overlays(&mut self) -> Result<()> {
        debug!(stage = "overlays", "Running build stage");
        self.tree
            .kustomization_mut(&self.layout.cicd_base())?
            .add_base("./pipelines");
        self.tree
            .kustomization_mut(&self.layout.cicd_overlays())?
            .add_base("../base");

        let ns = self.ns().clone();
        for env in [ns.dev(), ns.stage()] {
            self.tree.kustomization_mut(&env_overlays(env))?.add_base("../base");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::KUSTOMIZATION;
    use crate::testing::{FakeNamespaces, external_options, options, sealer, service};
    use pipekit_core::image_repo::DEFAULT_INTERNAL_REGISTRY;
    use pipekit_core::manifest::Application;

    const PIPELINES: &str = "environments/tst-cicd/base/pipelines";

    fn build(opts: &BootstrapOptions, sealer: &SecretSealer) -> Result<ManifestTree> {
        let naming = Naming::default();
        let repo = ImageRepo::classify(&opts.image_repo, DEFAULT_INTERNAL_REGISTRY)?;
        ManifestTreeBuilder::new(opts, &naming, NamespaceSet::derive(&opts.prefix), repo, sealer).build()
    }

    fn pipelines_file(rel: &str) -> String {
        format!("{PIPELINES}/{rel}")
    }

    #[test]
    fn test_end_to_end_internal() {
        let (sealer, _) = sealer();
        let tree = build(&options(), &sealer).unwrap();

        match tree.get(&pipelines_file("01-namespaces/cicd-environment.yaml")) {
            Some(Resource::Namespace(ns)) => assert_eq!(ns.metadata.name.as_deref(), Some("tst-cicd")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            tree.get(&pipelines_file("03-secrets/gitops-webhook-secret.yaml")),
            Some(Resource::SealedSecret(_))
        ));
        assert!(matches!(
            tree.get("environments/tst-dev/services/http-api-svc/base/config/100-deployment.yaml"),
            Some(Resource::Deployment(_))
        ));

        let manifest = tree.manifest().unwrap();
        let names: Vec<_> = manifest.environments.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["tst-dev", "tst-stage", "tst-cicd", "tst-argocd"]);
        assert!(manifest.environment("tst-cicd").unwrap().cicd);
        assert!(manifest.environment("tst-argocd").unwrap().argo);
        let svc = manifest
            .environment("tst-dev")
            .and_then(|e| e.app("http-api"))
            .and_then(|a| a.service("http-api-svc"))
            .unwrap();
        assert_eq!(svc.webhook.as_ref().unwrap().secret.name, "github-webhook-secret-http-api-svc");
        assert_eq!(svc.webhook.as_ref().unwrap().secret.namespace, "tst-cicd");
    }

    #[test]
    fn test_internal_registry_branch() {
        let (sealer, _) = sealer();
        let tree = build(&options(), &sealer).unwrap();

        assert!(tree.contains(&pipelines_file("01-namespaces/image-environment.yaml")));
        match tree.get(&pipelines_file("02-rolebindings/internal-registry-binding.yaml")) {
            Some(Resource::RoleBinding(rb)) => {
                assert_eq!(rb.metadata.namespace.as_deref(), Some("image"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!tree.contains(&pipelines_file("03-secrets/docker-config.yaml")));

        match tree.get(&pipelines_file("04-tasks/build-image-task.yaml")) {
            Some(Resource::Task(task)) => {
                let tls = task.spec.params.iter().find(|p| p.name == "TLSVERIFY").unwrap();
                assert_eq!(tls.default.as_deref(), Some("false"));
            }
            other => panic!("unexpected {other:?}"),
        }
        match tree.get(&pipelines_file("07-templates/app-ci-build-pr-template.yaml")) {
            Some(Resource::TriggerTemplate(tt)) => {
                let image = &tt.spec.resourcetemplates[0].spec.params[2].value;
                assert!(image.starts_with("image-registry.openshift-image-registry.svc:5000/image/repo:"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_external_registry_branch() {
        let (sealer, _) = sealer();
        let tree = build(&external_options(), &sealer).unwrap();

        assert!(tree.contains(&pipelines_file("03-secrets/docker-config.yaml")));
        assert!(!tree.contains(&pipelines_file("02-rolebindings/internal-registry-binding.yaml")));
        assert!(
            !tree
                .paths()
                .any(|p| p.starts_with(&pipelines_file("01-namespaces/")) && !p.ends_with("cicd-environment.yaml"))
        );
        match tree.get(&pipelines_file("02-rolebindings/pipeline-service-account.yaml")) {
            Some(Resource::ServiceAccount(sa)) => {
                let secrets = sa.secrets.as_ref().unwrap();
                assert_eq!(secrets[0].name.as_deref(), Some("regcred"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_external_registry_needs_docker_config() {
        let (sealer, _) = sealer();
        let opts = BootstrapOptions {
            docker_config: None,
            ..external_options()
        };
        assert!(matches!(build(&opts, &sealer), Err(Error::Sealing(_))));
    }

    #[test]
    fn test_existing_registry_namespace_skipped() {
        let (sealer, _) = sealer();
        let opts = options();
        let naming = Naming::default();
        let query = FakeNamespaces(vec!["image"]);
        let repo = ImageRepo::classify(&opts.image_repo, DEFAULT_INTERNAL_REGISTRY).unwrap();
        let tree = ManifestTreeBuilder::new(&opts, &naming, NamespaceSet::derive("tst-"), repo, &sealer)
            .with_namespace_query(&query)
            .build()
            .unwrap();

        assert!(!tree.contains(&pipelines_file("01-namespaces/image-environment.yaml")));
        assert!(tree.contains(&pipelines_file("02-rolebindings/internal-registry-binding.yaml")));
    }

    #[test]
    fn test_registry_in_generated_namespace() {
        let (sealer, _) = sealer();
        let opts = BootstrapOptions {
            image_repo: "tst-cicd/app".to_string(),
            ..options()
        };
        let tree = build(&opts, &sealer).unwrap();
        assert!(!tree.contains(&pipelines_file("01-namespaces/tst-cicd-environment.yaml")));
    }

    #[test]
    fn test_adding_service_changes_only_listing() {
        let (sealer_a, _) = sealer();
        let (sealer_b, _) = sealer();
        let first = build(&options(), &sealer_a).unwrap();
        let mut opts = options();
        opts.services.push(service("billing"));
        let second = build(&opts, &sealer_b).unwrap();

        let pipelines_kustomization = pipelines_file(KUSTOMIZATION);
        for (path, resource) in first.iter() {
            if path == pipelines_kustomization || path == MANIFEST_PATH {
                continue;
            }
            let other = second.get(path).unwrap();
            assert_eq!(resource.to_yaml().unwrap(), other.to_yaml().unwrap(), "{path}");
        }

        let before = &first.kustomization(PIPELINES).unwrap().resources;
        let after = &second.kustomization(PIPELINES).unwrap().resources;
        assert_eq!(after.len(), before.len() + 1);
        assert!(after.contains(&"03-secrets/github-webhook-secret-billing-svc.yaml".to_string()));

        let count = |tree: &ManifestTree| -> usize {
            tree.manifest()
                .and_then(|m| m.environment("tst-dev"))
                .map(|e| e.apps.iter().map(|a| a.services.len()).sum())
                .unwrap_or(0)
        };
        assert_eq!(count(&second), count(&first) + 1);
    }

    #[test]
    fn test_sealer_calls() {
        let (sealer, calls) = sealer();
        build(&options(), &sealer).unwrap();
        assert_eq!(calls.key.get(), 1);
        assert_eq!(calls.encrypt.get(), 2);

        let (sealer, calls) = crate::testing::sealer();
        let mut opts = external_options();
        opts.services.push(service("billing"));
        build(&opts, &sealer).unwrap();
        assert_eq!(calls.key.get(), 1);
        assert_eq!(calls.encrypt.get(), 4);
    }

    #[test]
    fn test_duplicate_service_ignored() {
        let (sealer, calls) = sealer();
        let mut opts = options();
        opts.services.push(service("http-api"));
        let tree = build(&opts, &sealer).unwrap();

        assert_eq!(calls.encrypt.get(), 2);
        let app = tree
            .manifest()
            .and_then(|m| m.environment("tst-dev"))
            .and_then(|e| e.app("http-api"))
            .unwrap();
        assert_eq!(app.services.len(), 1);
    }

    #[test]
    fn test_kustomizations() {
        let (sealer, _) = sealer();
        let tree = build(&options(), &sealer).unwrap();

        assert_eq!(
            tree.kustomization("environments/tst-cicd/base").unwrap().bases,
            vec!["./pipelines"]
        );
        assert_eq!(
            tree.kustomization("environments/tst-dev/services/http-api-svc/base/config")
                .unwrap()
                .resources,
            vec!["100-deployment.yaml", "200-service.yaml"]
        );
        assert_eq!(
            tree.kustomization("environments/tst-dev/apps/http-api/base").unwrap().bases,
            vec!["../../../services/http-api-svc/overlays"]
        );
        assert_eq!(
            tree.kustomization("environments/tst-stage/env/base").unwrap().resources,
            vec!["tst-stage-environment.yaml", "tst-stage-rolebinding.yaml"]
        );
        tree.verify().unwrap();
    }

    #[test]
    fn test_merge_existing_manifest() {
        let (sealer, _) = sealer();
        let opts = options();
        let naming = Naming::default();
        let mut legacy = Environment::new("tst-dev");
        legacy.apps.push(Application::new("legacy"));
        let existing = Manifest {
            gitops_url: None,
            environments: vec![legacy],
        };

        let mut previous = ManifestTree::new();
        previous.insert(MANIFEST_PATH, existing);

        let repo = ImageRepo::classify(&opts.image_repo, DEFAULT_INTERNAL_REGISTRY).unwrap();
        let tree = ManifestTreeBuilder::new(&opts, &naming, NamespaceSet::derive("tst-"), repo, &sealer)
            .with_existing_tree(previous)
            .build()
            .unwrap();

        let manifest = tree.manifest().unwrap();
        assert_eq!(manifest.environments.len(), 4);
        let dev = manifest.environment("tst-dev").unwrap();
        assert!(dev.app("legacy").is_some());
        assert!(dev.app("http-api").is_some());
    }

    fn rebuild(opts: &BootstrapOptions, sealer: &SecretSealer, previous: ManifestTree) -> Result<ManifestTree> {
        let naming = Naming::default();
        let repo = ImageRepo::classify(&opts.image_repo, DEFAULT_INTERNAL_REGISTRY)?;
        ManifestTreeBuilder::new(opts, &naming, NamespaceSet::derive(&opts.prefix), repo, sealer)
            .with_existing_tree(previous)
            .build()
    }

    #[test]
    fn test_app_trigger_checks_event_type_only() {
        let (sealer, _) = sealer();
        let mut opts = options();
        opts.services.push(service("billing"));
        let tree = build(&opts, &sealer).unwrap();

        let Some(Resource::EventListener(el)) =
            tree.get(&pipelines_file("08-eventlisteners/cicd-event-listener.yaml"))
        else {
            panic!("event listener missing");
        };
        assert_eq!(el.spec.triggers.len(), 2);
        assert_eq!(el.secret_refs().collect::<Vec<_>>(), vec!["gitops-webhook-secret"]);

        // the service secrets stay reachable through the descriptor
        let dev = tree.manifest().unwrap().environment("tst-dev").unwrap();
        for (_, svc) in dev.services() {
            let secret = &svc.webhook.as_ref().unwrap().secret;
            let path = pipelines_file(&format!("03-secrets/{}.yaml", secret.name));
            assert!(matches!(tree.get(&path), Some(Resource::SealedSecret(_))), "{path}");
        }
    }

    #[test]
    fn test_rebootstrap_keeps_recorded_services() {
        let (first_sealer, _) = sealer();
        let mut opts = options();
        opts.services.push(service("billing"));
        let first = build(&opts, &first_sealer).unwrap();

        let (sealer, calls) = sealer();
        let second = rebuild(&options(), &sealer, first.clone()).unwrap();

        let secret = "03-secrets/github-webhook-secret-billing-svc.yaml";
        assert!(
            second
                .kustomization(PIPELINES)
                .unwrap()
                .resources
                .contains(&secret.to_string())
        );
        assert_eq!(second.get(&pipelines_file(secret)), first.get(&pipelines_file(secret)));
        assert!(matches!(
            second.get("environments/tst-dev/services/billing-svc/base/config/100-deployment.yaml"),
            Some(Resource::Deployment(_))
        ));
        let dev = second.manifest().unwrap().environment("tst-dev").unwrap();
        assert!(dev.app("billing").and_then(|a| a.service("billing-svc")).is_some());
        // gitops and http-api secrets only, billing is taken over sealed
        assert_eq!(calls.encrypt.get(), 2);
        assert_eq!(second, first);
    }

    #[test]
    fn test_rebootstrap_recorded_secret_missing() {
        let (sealer, _) = sealer();
        let mut dev = Environment::new("tst-dev");
        dev.add_service(
            "billing",
            ServiceEntry {
                name: "billing-svc".to_string(),
                source_url: Some("https://github.com/my-org/billing.git".to_string()),
                webhook: Some(pipekit_core::manifest::Webhook {
                    secret: pipekit_core::manifest::SecretRef {
                        name: "github-webhook-secret-billing-svc".to_string(),
                        namespace: "tst-cicd".to_string(),
                    },
                }),
            },
        );
        let mut previous = ManifestTree::new();
        previous.insert(
            MANIFEST_PATH,
            Manifest {
                gitops_url: None,
                environments: vec![dev],
            },
        );

        let err = rebuild(&options(), &sealer, previous).unwrap_err();
        assert!(matches!(err, Error::Integrity(msg) if msg.contains("github-webhook-secret-billing-svc")));
    }

    #[test]
    fn test_rebootstrap_service_without_webhook() {
        let (sealer, _) = sealer();
        let mut stage = Environment::new("tst-stage");
        stage.add_service(
            "legacy",
            ServiceEntry {
                name: "legacy-svc".to_string(),
                ..Default::default()
            },
        );
        let mut previous = ManifestTree::new();
        previous.insert(
            MANIFEST_PATH,
            Manifest {
                gitops_url: None,
                environments: vec![stage],
            },
        );

        let tree = rebuild(&options(), &sealer, previous).unwrap();
        assert!(tree.contains("environments/tst-stage/services/legacy-svc/base/config/200-service.yaml"));
    }

    #[test]
    fn test_invalid_gitops_url() {
        let (sealer, _) = sealer();
        let opts = BootstrapOptions {
            gitops_repo_url: "not a url".to_string(),
            ..options()
        };
        assert!(matches!(build(&opts, &sealer), Err(Error::InvalidInput(_))));
    }
}
