//! Metadata helpers shared by every builder.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::TypeMeta;
use pipekit_core::NamespacedName;
use std::collections::BTreeMap;

pub const NAME_LABEL: &str = "app.kubernetes.io/name";
pub const PART_OF_LABEL: &str = "app.kubernetes.io/part-of";

/// Metadata for a namespaced object.
pub fn object_meta(name: &NamespacedName) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.name.clone()),
        namespace: Some(name.namespace.clone()),
        ..Default::default()
    }
}

/// Metadata for a cluster-scoped object.
pub fn cluster_meta(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        ..Default::default()
    }
}

pub fn type_meta(api_version: &str, kind: &str) -> TypeMeta {
    TypeMeta {
        api_version: api_version.to_string(),
        kind: kind.to_string(),
    }
}

/// Recommended labels identifying a component and the application it belongs to.
pub fn component_labels(name: &str, part_of: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (NAME_LABEL.to_string(), name.to_string()),
        (PART_OF_LABEL.to_string(), part_of.to_string()),
    ])
}

/// The subset of [`component_labels`] used as a selector.
pub fn selector_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(NAME_LABEL.to_string(), name.to_string())])
}

/// Read the namespaced name back out of object metadata.
///
/// Cluster-scoped objects report an empty namespace.
pub fn namespaced_name(meta: &ObjectMeta) -> Option<NamespacedName> {
    let name = meta.name.as_ref()?;
    Some(NamespacedName::new(
        meta.namespace.clone().unwrap_or_default(),
        name.clone(),
    ))
}
