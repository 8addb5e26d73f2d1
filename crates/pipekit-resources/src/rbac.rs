//! Roles and role bindings.

use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};
use pipekit_core::NamespacedName;

use crate::meta::object_meta;

pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

/// Kind of role a binding refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    Role,
    ClusterRole,
}

impl RoleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::Role => "Role",
            RoleKind::ClusterRole => "ClusterRole",
        }
    }
}

/// Cluster role granting write access to most namespaced objects.
pub const EDIT_CLUSTER_ROLE: &str = "edit";

/// Permissions the pipeline service account needs to run triggers.
pub fn pipeline_rules() -> Vec<PolicyRule> {
    let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    vec![
        PolicyRule {
            api_groups: Some(strings(&["tekton.dev"])),
            resources: Some(strings(&[
                "eventlisteners",
                "triggerbindings",
                "triggertemplates",
                "tasks",
                "taskruns",
            ])),
            verbs: strings(&["get"]),
            ..Default::default()
        },
        PolicyRule {
            api_groups: Some(strings(&["tekton.dev"])),
            resources: Some(strings(&["pipelineruns", "pipelineresources", "taskruns"])),
            verbs: strings(&["create"]),
            ..Default::default()
        },
    ]
}

pub fn role(name: &NamespacedName, rules: Vec<PolicyRule>) -> Role {
    Role {
        metadata: object_meta(name),
        rules: Some(rules),
    }
}

/// Bind `role_kind`/`role_name` to the given service account.
///
/// The subject carries the service account's namespace so the binding also
/// works when it lives in a different namespace.
pub fn role_binding(
    name: &NamespacedName,
    sa: &ServiceAccount,
    role_kind: RoleKind,
    role_name: &str,
) -> RoleBinding {
    RoleBinding {
        metadata: object_meta(name),
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: role_kind.as_str().to_string(),
            name: role_name.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: sa.metadata.name.clone().unwrap_or_default(),
            namespace: sa.metadata.namespace.clone(),
            ..Default::default()
        }]),
    }
}
