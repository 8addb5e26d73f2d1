//! The closed set of resources a manifest tree can hold.

use derive_more::From;
use k8s_openapi::Resource as K8sResource;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use pipekit_core::NamespacedName;
use pipekit_core::manifest::Manifest;

use crate::kustomization::Kustomization;
use crate::meta::namespaced_name;
use crate::route::Route;
use crate::sealed::SealedSecret;
use crate::tekton::{EventListener, Pipeline, Task, TriggerBinding, TriggerTemplate};

/// A single document in the manifest tree.
#[derive(Debug, Clone, PartialEq, From)]
pub enum Resource {
    Namespace(Namespace),
    ServiceAccount(ServiceAccount),
    Role(Role),
    RoleBinding(RoleBinding),
    SealedSecret(SealedSecret),
    Task(Task),
    Pipeline(Pipeline),
    TriggerTemplate(TriggerTemplate),
    TriggerBinding(TriggerBinding),
    EventListener(EventListener),
    Route(Route),
    Deployment(Deployment),
    Service(Service),
    Kustomization(Kustomization),
    Manifest(Manifest),
}

impl Resource {
    pub fn kind(&self) -> &str {
        match self {
            Resource::Namespace(_) => Namespace::KIND,
            Resource::ServiceAccount(_) => ServiceAccount::KIND,
            Resource::Role(_) => Role::KIND,
            Resource::RoleBinding(_) => RoleBinding::KIND,
            Resource::Deployment(_) => Deployment::KIND,
            Resource::Service(_) => Service::KIND,
            Resource::SealedSecret(r) => &r.types.kind,
            Resource::Task(r) => &r.types.kind,
            Resource::Pipeline(r) => &r.types.kind,
            Resource::TriggerTemplate(r) => &r.types.kind,
            Resource::TriggerBinding(r) => &r.types.kind,
            Resource::EventListener(r) => &r.types.kind,
            Resource::Route(r) => &r.types.kind,
            Resource::Kustomization(r) => &r.types.kind,
            Resource::Manifest(_) => "Manifest",
        }
    }

    /// The API version tag; empty for the descriptor, which is not applied.
    pub fn api_version(&self) -> &str {
        match self {
            Resource::Namespace(_) => Namespace::API_VERSION,
            Resource::ServiceAccount(_) => ServiceAccount::API_VERSION,
            Resource::Role(_) => Role::API_VERSION,
            Resource::RoleBinding(_) => RoleBinding::API_VERSION,
            Resource::Deployment(_) => Deployment::API_VERSION,
            Resource::Service(_) => Service::API_VERSION,
            Resource::SealedSecret(r) => &r.types.api_version,
            Resource::Task(r) => &r.types.api_version,
            Resource::Pipeline(r) => &r.types.api_version,
            Resource::TriggerTemplate(r) => &r.types.api_version,
            Resource::TriggerBinding(r) => &r.types.api_version,
            Resource::EventListener(r) => &r.types.api_version,
            Resource::Route(r) => &r.types.api_version,
            Resource::Kustomization(r) => &r.types.api_version,
            Resource::Manifest(_) => "",
        }
    }

    pub fn metadata(&self) -> Option<&ObjectMeta> {
        let meta = match self {
            Resource::Namespace(r) => &r.metadata,
            Resource::ServiceAccount(r) => &r.metadata,
            Resource::Role(r) => &r.metadata,
            Resource::RoleBinding(r) => &r.metadata,
            Resource::Deployment(r) => &r.metadata,
            Resource::Service(r) => &r.metadata,
            Resource::SealedSecret(r) => &r.metadata,
            Resource::Task(r) => &r.metadata,
            Resource::Pipeline(r) => &r.metadata,
            Resource::TriggerTemplate(r) => &r.metadata,
            Resource::TriggerBinding(r) => &r.metadata,
            Resource::EventListener(r) => &r.metadata,
            Resource::Route(r) => &r.metadata,
            Resource::Kustomization(_) | Resource::Manifest(_) => return None,
        };
        Some(meta)
    }

    /// Namespace and name of the object; cluster-scoped objects have an empty namespace.
    pub fn namespaced_name(&self) -> Option<NamespacedName> {
        self.metadata().and_then(namespaced_name)
    }

    pub fn as_kustomization(&self) -> Option<&Kustomization> {
        match self {
            Resource::Kustomization(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_manifest(&self) -> Option<&Manifest> {
        match self {
            Resource::Manifest(m) => Some(m),
            _ => None,
        }
    }

    /// Encode the resource as a single YAML document.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        match self {
            Resource::Namespace(r) => serde_yaml::to_string(r),
            Resource::ServiceAccount(r) => serde_yaml::to_string(r),
            Resource::Role(r) => serde_yaml::to_string(r),
            Resource::RoleBinding(r) => serde_yaml::to_string(r),
            Resource::SealedSecret(r) => serde_yaml::to_string(r),
            Resource::Task(r) => serde_yaml::to_string(r),
            Resource::Pipeline(r) => serde_yaml::to_string(r),
            Resource::TriggerTemplate(r) => serde_yaml::to_string(r),
            Resource::TriggerBinding(r) => serde_yaml::to_string(r),
            Resource::EventListener(r) => serde_yaml::to_string(r),
            Resource::Route(r) => serde_yaml::to_string(r),
            Resource::Deployment(r) => serde_yaml::to_string(r),
            Resource::Service(r) => serde_yaml::to_string(r),
            Resource::Kustomization(r) => serde_yaml::to_string(r),
            Resource::Manifest(r) => serde_yaml::to_string(r),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{namespace, service_account};

    #[test]
    fn test_kind_and_version() {
        let ns: Resource = namespace("tst-dev").into();
        assert_eq!(ns.kind(), "Namespace");
        assert_eq!(ns.api_version(), "v1");

        let k: Resource = Kustomization::new().into();
        assert_eq!(k.kind(), "Kustomization");
        assert_eq!(k.api_version(), "kustomize.config.k8s.io/v1beta1");
        assert!(k.namespaced_name().is_none());
    }

    #[test]
    fn test_namespaced_name() {
        let sa: Resource = service_account(&NamespacedName::new("tst-cicd", "pipeline")).into();
        assert_eq!(
            sa.namespaced_name(),
            Some(NamespacedName::new("tst-cicd", "pipeline"))
        );

        let ns: Resource = namespace("tst-dev").into();
        assert_eq!(ns.namespaced_name(), Some(NamespacedName::new("", "tst-dev")));
    }

    #[test]
    fn test_to_yaml_includes_type() {
        let sa: Resource = service_account(&NamespacedName::new("tst-cicd", "pipeline")).into();
        let yaml = sa.to_yaml().unwrap();
        assert!(yaml.starts_with("apiVersion: v1\nkind: ServiceAccount\n"));
        assert!(yaml.contains("namespace: tst-cicd"));
    }

    #[test]
    fn test_manifest_document() {
        let m: Resource = Manifest {
            gitops_url: Some("https://github.com/my-org/gitops.git".to_string()),
            environments: Vec::new(),
        }
        .into();
        assert_eq!(m.kind(), "Manifest");
        assert!(m.metadata().is_none());
        assert!(m.to_yaml().unwrap().contains("gitops_url"));
    }
}
