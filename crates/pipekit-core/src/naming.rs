//! Environment namespace derivation and the naming table.
//!
//! Every name that ends up in a generated manifest and is referenced from
//! another manifest comes from [`Naming`], so a single value decides the whole
//! cross-reference graph.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Logical role of an environment namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[display("dev")]
    Dev,
    #[display("stage")]
    Stage,
    #[display("cicd")]
    Cicd,
    #[display("argocd")]
    ArgoCd,
}

impl Role {
    /// All roles, in the order environments are listed in the manifest.
    pub const ALL: [Role; 4] = [Role::Dev, Role::Stage, Role::Cicd, Role::ArgoCd];
}

/// Concrete namespace names for each environment role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceSet {
    dev: String,
    stage: String,
    cicd: String,
    argocd: String,
}

impl NamespaceSet {
    /// Derive the namespace names for a prefix. An empty prefix is allowed.
    pub fn derive(prefix: &str) -> Self {
        let name = |role: Role| format!("{prefix}{role}");
        Self {
            dev: name(Role::Dev),
            stage: name(Role::Stage),
            cicd: name(Role::Cicd),
            argocd: name(Role::ArgoCd),
        }
    }

    pub fn get(&self, role: Role) -> &str {
        match role {
            Role::Dev => &self.dev,
            Role::Stage => &self.stage,
            Role::Cicd => &self.cicd,
            Role::ArgoCd => &self.argocd,
        }
    }

    pub fn dev(&self) -> &str {
        &self.dev
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn cicd(&self) -> &str {
        &self.cicd
    }

    pub fn argocd(&self) -> &str {
        &self.argocd
    }

    /// Iterate over `(role, namespace)` pairs in [`Role::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Role, &str)> {
        Role::ALL.into_iter().map(move |role| (role, self.get(role)))
    }
}

/// Fixed names of the shared resources generated for every bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Naming {
    /// Service account the pipelines and event listener run as.
    pub service_account: String,
    /// Image pull/push secret attached to the service account for external registries.
    pub docker_secret: String,
    pub role: String,
    pub role_binding: String,
    pub cicd_edit_binding: String,
    pub dev_edit_binding: String,
    pub stage_edit_binding: String,
    pub internal_registry_binding: String,
    pub gitops_webhook_secret: String,
    /// Data key holding the webhook token inside webhook secrets.
    pub webhook_secret_key: String,
    pub event_listener: String,
    pub route: String,
    /// Placeholder image deployed until the first CI run pushes a real one.
    pub bootstrap_image: String,
    pub container_port: i32,
}

impl Default for Naming {
    fn default() -> Self {
        Self {
            service_account: "pipeline".to_string(),
            docker_secret: "regcred".to_string(),
            role: "pipelines-service-role".to_string(),
            role_binding: "pipelines-service-role-binding".to_string(),
            cicd_edit_binding: "edit-clusterrole-binding".to_string(),
            dev_edit_binding: "pipeline-admin-dev".to_string(),
            stage_edit_binding: "pipeline-admin-stage".to_string(),
            internal_registry_binding: "internal-registry-binding".to_string(),
            gitops_webhook_secret: "gitops-webhook-secret".to_string(),
            webhook_secret_key: "webhook-secret-key".to_string(),
            event_listener: "cicd-event-listener".to_string(),
            route: "gitops-webhook-event-listener-route".to_string(),
            bootstrap_image: "nginxinc/nginx-unprivileged:latest".to_string(),
            container_port: 8080,
        }
    }
}

impl Naming {
    /// Name of the sealed webhook secret for a service.
    pub fn service_webhook_secret(&self, service: &str) -> String {
        format!("github-webhook-secret-{service}")
    }

    /// Name of the service Tekton Triggers creates in front of the event listener.
    pub fn event_listener_service(&self) -> String {
        format!("el-{}", self.event_listener)
    }
}
