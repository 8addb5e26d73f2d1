//! Kustomization files.

use kube::core::TypeMeta;
use serde::{Deserialize, Serialize};

use crate::meta::type_meta;

pub const KUSTOMIZE_API_VERSION: &str = "kustomize.config.k8s.io/v1beta1";

/// Aggregates the resource files and base directories a directory contributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kustomization {
    #[serde(flatten)]
    pub types: TypeMeta,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,
}

impl Default for Kustomization {
    fn default() -> Self {
        Self {
            types: type_meta(KUSTOMIZE_API_VERSION, "Kustomization"),
            resources: Vec::new(),
            bases: Vec::new(),
        }
    }
}

impl Kustomization {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource unless it is already listed.
    ///
    /// Returns whether the list changed.
    pub fn add_resource(&mut self, resource: impl Into<String>) -> bool {
        push_unique(&mut self.resources, resource.into())
    }

    pub fn add_base(&mut self, base: impl Into<String>) -> bool {
        push_unique(&mut self.bases, base.into())
    }
}

fn push_unique(list: &mut Vec<String>, item: String) -> bool {
    if list.contains(&item) {
        return false;
    }
    list.push(item);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_resource_idempotent() {
        let mut k = Kustomization::new();
        assert!(k.add_resource("01-namespaces/cicd-environment.yaml"));
        assert!(!k.add_resource("01-namespaces/cicd-environment.yaml"));
        assert!(k.add_resource("03-secrets/gitops-webhook-secret.yaml"));
        assert_eq!(k.resources.len(), 2);
    }

    #[test]
    fn test_empty_lists_omitted() {
        let mut k = Kustomization::new();
        k.add_base("../base");
        let yaml = serde_yaml::to_string(&k).unwrap();
        assert_eq!(
            yaml,
            "apiVersion: kustomize.config.k8s.io/v1beta1\nkind: Kustomization\nbases:\n- ../base\n"
        );
    }

    #[test]
    fn test_parse_existing() {
        let yaml = "apiVersion: kustomize.config.k8s.io/v1beta1\nkind: Kustomization\nresources:\n- a.yaml\n";
        let k: Kustomization = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(k.resources, vec!["a.yaml"]);
        assert!(k.bases.is_empty());
    }
}
