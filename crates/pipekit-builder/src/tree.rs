//! Path-addressed manifest tree.
//!
//! Every file of the GitOps repository is kept in memory, keyed by its path
//! relative to the repository root. Paths iterate in lexicographic order, which
//! is also the order documents are serialized in.

use pipekit_core::manifest::Manifest;
use pipekit_core::{Error, NamespacedName, Result};
use pipekit_resources::sealed::SEALED_SECRET_KIND;
use pipekit_resources::{Kustomization, Resource};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::paths::{KUSTOMIZATION, MANIFEST_PATH, join, parent, resolve};

/// Ordered map from repository path to the resource stored there.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestTree {
    files: BTreeMap<String, Resource>,
}

impl ManifestTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a resource, returning whatever was at `path` before.
    pub fn insert(&mut self, path: impl Into<String>, resource: impl Into<Resource>) -> Option<Resource> {
        self.files.insert(path.into(), resource.into())
    }

    /// Store a resource at `dir/rel` and list `rel` in the kustomization of `dir`.
    pub fn insert_listed(&mut self, dir: &str, rel: &str, resource: impl Into<Resource>) -> Result<()> {
        self.kustomization_mut(dir)?.add_resource(rel);
        self.files.insert(join(dir, rel), resource.into());
        Ok(())
    }

    /// The kustomization of `dir`, created empty if missing.
    pub fn kustomization_mut(&mut self, dir: &str) -> Result<&mut Kustomization> {
        let path = join(dir, KUSTOMIZATION);
        let entry = self
            .files
            .entry(path.clone())
            .or_insert_with(|| Kustomization::new().into());
        match entry {
            Resource::Kustomization(k) => Ok(k),
            other => Err(Error::Integrity(format!(
                "{path} holds a {} instead of a kustomization",
                other.kind()
            ))),
        }
    }

    pub fn kustomization(&self, dir: &str) -> Option<&Kustomization> {
        self.get(&join(dir, KUSTOMIZATION))
            .and_then(Resource::as_kustomization)
    }

    pub fn get(&self, path: &str) -> Option<&Resource> {
        self.files.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Resource> {
        self.files.get_mut(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// The `pipelines.yaml` descriptor, if present.
    pub fn manifest(&self) -> Option<&Manifest> {
        self.get(MANIFEST_PATH).and_then(Resource::as_manifest)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Resource)> {
        self.files.iter().map(|(p, r)| (p.as_str(), r))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Check kustomization coverage and every cross reference between resources.
    pub fn verify(&self) -> Result<()> {
        self.verify_kustomizations()?;
        self.verify_references()
    }

    fn verify_kustomizations(&self) -> Result<()> {
        let kustomizations: BTreeMap<&str, &Kustomization> = self
            .files
            .iter()
            .filter_map(|(path, r)| Some((path.as_str(), r.as_kustomization()?)))
            .map(|(path, k)| (parent(path), k))
            .collect();
        let dirs: BTreeSet<&str> = kustomizations.keys().copied().collect();

        let mut expected: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for (path, resource) in &self.files {
            if resource.as_kustomization().is_some() {
                if !path.ends_with(KUSTOMIZATION) {
                    return Err(Error::Integrity(format!(
                        "{path}: kustomizations must be named {KUSTOMIZATION}"
                    )));
                }
                continue;
            }
            match owner(&dirs, path) {
                Some(dir) => {
                    let rel = if dir.is_empty() {
                        path.as_str()
                    } else {
                        &path[dir.len() + 1..]
                    };
                    expected.entry(dir).or_default().insert(rel);
                }
                None if path.starts_with("environments/") => {
                    return Err(Error::Integrity(format!(
                        "{path} is not listed by any kustomization"
                    )));
                }
                None => {}
            }
        }

        for (dir, k) in &kustomizations {
            let listed: BTreeSet<&str> = k.resources.iter().map(String::as_str).collect();
            if listed.len() != k.resources.len() {
                return Err(Error::Integrity(format!(
                    "{}: duplicate resource entries",
                    join(dir, KUSTOMIZATION)
                )));
            }
            let files = expected.remove(dir).unwrap_or_default();
            if let Some(missing) = files.difference(&listed).next() {
                return Err(Error::Integrity(format!(
                    "{}: {missing} is not listed",
                    join(dir, KUSTOMIZATION)
                )));
            }
            if let Some(extra) = listed.difference(&files).next() {
                return Err(Error::Integrity(format!(
                    "{}: {extra} does not exist",
                    join(dir, KUSTOMIZATION)
                )));
            }
            for base in &k.bases {
                let resolved = resolve(dir, base);
                if !resolved.as_deref().is_some_and(|r| dirs.contains(r)) {
                    return Err(Error::Integrity(format!(
                        "{}: base {base} has no kustomization",
                        join(dir, KUSTOMIZATION)
                    )));
                }
            }
        }
        Ok(())
    }

    fn verify_references(&self) -> Result<()> {
        let objects: HashSet<(&str, NamespacedName)> = self
            .files
            .values()
            .filter_map(|r| Some((r.kind(), r.namespaced_name()?)))
            .collect();
        let require = |path: &str, kind: &str, namespace: &str, name: &str| -> Result<()> {
            if objects.contains(&(kind, NamespacedName::new(namespace, name))) {
                Ok(())
            } else {
                Err(Error::Integrity(format!(
                    "{path}: {kind} {namespace}/{name} does not exist"
                )))
            }
        };

        for (path, resource) in &self.files {
            let ns = resource
                .metadata()
                .and_then(|m| m.namespace.as_deref())
                .unwrap_or_default();
            match resource {
                Resource::RoleBinding(rb) => {
                    if rb.role_ref.kind == "Role" {
                        require(path, "Role", ns, &rb.role_ref.name)?;
                    }
                    for subject in rb.subjects.iter().flatten() {
                        if subject.kind == "ServiceAccount" {
                            let subject_ns = subject.namespace.as_deref().unwrap_or(ns);
                            require(path, "ServiceAccount", subject_ns, &subject.name)?;
                        }
                    }
                }
                Resource::ServiceAccount(sa) => {
                    for secret in sa.secrets.iter().flatten() {
                        if let Some(name) = &secret.name {
                            require(path, SEALED_SECRET_KIND, ns, name)?;
                        }
                    }
                }
                Resource::Pipeline(p) => {
                    for task in p.task_refs() {
                        require(path, "Task", ns, task)?;
                    }
                }
                Resource::TriggerTemplate(tt) => {
                    for pipeline in tt.pipeline_refs() {
                        require(path, "Pipeline", ns, pipeline)?;
                    }
                    for sa in tt.service_accounts() {
                        require(path, "ServiceAccount", ns, sa)?;
                    }
                }
                Resource::EventListener(el) => {
                    require(path, "ServiceAccount", ns, &el.spec.service_account_name)?;
                    for binding in el.binding_refs() {
                        require(path, "TriggerBinding", ns, binding)?;
                    }
                    for template in el.template_refs() {
                        require(path, "TriggerTemplate", ns, template)?;
                    }
                    for secret in el.secret_refs() {
                        require(path, SEALED_SECRET_KIND, ns, secret)?;
                    }
                }
                Resource::Route(route) => {
                    let target = route.target_service();
                    let found = self.files.values().any(|r| match r {
                        Resource::EventListener(el) => {
                            el.metadata.namespace.as_deref() == Some(ns) && el.service_name() == target
                        }
                        _ => false,
                    });
                    if !found {
                        return Err(Error::Integrity(format!(
                            "{path}: no event listener serves {ns}/{target}"
                        )));
                    }
                }
                Resource::Manifest(manifest) => {
                    for env in &manifest.environments {
                        for (_, svc) in env.services() {
                            if let Some(webhook) = &svc.webhook {
                                let secret = &webhook.secret;
                                require(path, SEALED_SECRET_KIND, &secret.namespace, &secret.name)?;
                            }
                        }
                    }
                }
                Resource::Service(svc) => {
                    let Some(selector) = svc.spec.as_ref().and_then(|s| s.selector.as_ref()) else {
                        continue;
                    };
                    if !self.deployment_matches(ns, selector) {
                        return Err(Error::Integrity(format!(
                            "{path}: selector matches no deployment in {ns}"
                        )));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn deployment_matches(&self, namespace: &str, selector: &BTreeMap<String, String>) -> bool {
        self.files.values().any(|r| {
            let Resource::Deployment(d) = r else {
                return false;
            };
            if d.metadata.namespace.as_deref() != Some(namespace) {
                return false;
            }
            let labels = d
                .spec
                .as_ref()
                .and_then(|s| s.template.metadata.as_ref())
                .and_then(|m| m.labels.as_ref());
            labels.is_some_and(|labels| selector.iter().all(|(k, v)| labels.get(k) == Some(v)))
        })
    }
}

/// Directory of the nearest kustomization enclosing `path`.
fn owner<'a>(dirs: &BTreeSet<&'a str>, path: &str) -> Option<&'a str> {
    let mut dir = parent(path);
    loop {
        if let Some(found) = dirs.get(dir) {
            return Some(*found);
        }
        if dir.is_empty() {
            return None;
        }
        dir = parent(dir);
    }
}
