//! Where every generated file lives in the GitOps repository.

use pipekit_core::NamespaceSet;

pub const MANIFEST_PATH: &str = "pipelines.yaml";
pub const KUSTOMIZATION: &str = "kustomization.yaml";

pub const NAMESPACES_DIR: &str = "01-namespaces";
pub const ROLEBINDINGS_DIR: &str = "02-rolebindings";
pub const SECRETS_DIR: &str = "03-secrets";
pub const TASKS_DIR: &str = "04-tasks";
pub const PIPELINES_DIR: &str = "05-pipelines";
pub const BINDINGS_DIR: &str = "06-bindings";
pub const TEMPLATES_DIR: &str = "07-templates";
pub const EVENT_LISTENERS_DIR: &str = "08-eventlisteners";
pub const ROUTES_DIR: &str = "09-routes";

pub const DEPLOYMENT_FILE: &str = "100-deployment.yaml";
pub const SERVICE_FILE: &str = "200-service.yaml";

/// Join a directory and a relative path with `/`.
pub fn join(dir: &str, rel: &str) -> String {
    if dir.is_empty() {
        rel.to_string()
    } else {
        format!("{dir}/{rel}")
    }
}

/// Directory part of a path; empty for top-level files.
pub fn parent(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Resolve `rel` against `dir`, folding `.` and `..` segments.
///
/// Returns `None` when `..` climbs above the repository root.
pub fn resolve(dir: &str, rel: &str) -> Option<String> {
    let mut parts: Vec<&str> = dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in rel.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

pub fn environment_dir(namespace: &str) -> String {
    format!("environments/{namespace}")
}

/// Directory layout derived from the namespace set.
#[derive(Debug, Clone)]
pub struct Layout {
    namespaces: NamespaceSet,
}

impl Layout {
    pub fn new(namespaces: NamespaceSet) -> Self {
        Self { namespaces }
    }

    pub fn namespaces(&self) -> &NamespaceSet {
        &self.namespaces
    }

    pub fn cicd_base(&self) -> String {
        format!("{}/base", environment_dir(self.namespaces.cicd()))
    }

    pub fn cicd_overlays(&self) -> String {
        format!("{}/overlays", environment_dir(self.namespaces.cicd()))
    }

    /// Holds every pipeline resource and the sealed secrets.
    pub fn pipelines(&self) -> String {
        pipelines_dir(self.namespaces.cicd())
    }

    pub fn argocd_config(&self) -> String {
        format!("{}/config", environment_dir(self.namespaces.argocd()))
    }
}

pub fn pipelines_dir(cicd: &str) -> String {
    format!("{}/base/pipelines", environment_dir(cicd))
}

pub fn env_base(env: &str) -> String {
    format!("{}/env/base", environment_dir(env))
}

pub fn env_overlays(env: &str) -> String {
    format!("{}/env/overlays", environment_dir(env))
}

pub fn service_dir(env: &str, service: &str) -> String {
    format!("{}/services/{service}", environment_dir(env))
}

pub fn app_dir(env: &str, app: &str) -> String {
    format!("{}/apps/{app}", environment_dir(env))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        assert_eq!(resolve("a/b/c", "../d").as_deref(), Some("a/b/d"));
        assert_eq!(resolve("a/b", "./c").as_deref(), Some("a/b/c"));
        assert_eq!(
            resolve("environments/tst-dev/apps/http-api/base", "../../../services/svc/overlays")
                .as_deref(),
            Some("environments/tst-dev/services/svc/overlays")
        );
        assert_eq!(resolve("a", "../.."), None);
    }

    #[test]
    fn test_parent() {
        assert_eq!(parent("a/b/kustomization.yaml"), "a/b");
        assert_eq!(parent("pipelines.yaml"), "");
    }

    #[test]
    fn test_layout() {
        let layout = Layout::new(NamespaceSet::derive("tst-"));
        assert_eq!(layout.pipelines(), "environments/tst-cicd/base/pipelines");
        assert_eq!(layout.cicd_overlays(), "environments/tst-cicd/overlays");
        assert_eq!(layout.argocd_config(), "environments/tst-argocd/config");
        assert_eq!(env_base("tst-stage"), "environments/tst-stage/env/base");
        assert_eq!(
            service_dir("tst-dev", "http-api-svc"),
            "environments/tst-dev/services/http-api-svc"
        );
    }
}
