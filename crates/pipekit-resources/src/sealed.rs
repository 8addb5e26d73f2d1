//! Sealed secrets.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::TypeMeta;
use pipekit_core::NamespacedName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::meta::{object_meta, type_meta};

pub const SEALED_SECRET_API_VERSION: &str = "bitnami.com/v1alpha1";
pub const SEALED_SECRET_KIND: &str = "SealedSecret";

/// Data key a `kubernetes.io/dockerconfigjson` secret must use.
pub const DOCKER_CONFIG_KEY: &str = ".dockerconfigjson";

/// Type of the secret the controller unseals into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretType {
    Opaque,
    DockerConfigJson,
}

impl SecretType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretType::Opaque => "Opaque",
            SecretType::DockerConfigJson => "kubernetes.io/dockerconfigjson",
        }
    }
}

/// A secret encrypted for a single namespace/name pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealedSecret {
    #[serde(flatten)]
    pub types: TypeMeta,
    pub metadata: ObjectMeta,
    pub spec: SealedSecretSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedSecretSpec {
    /// Base64 ciphertext per data key.
    pub encrypted_data: BTreeMap<String, String>,
    pub template: SecretTemplate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretTemplate {
    pub metadata: ObjectMeta,
    #[serde(rename = "type")]
    pub type_: String,
}

impl SealedSecret {
    pub fn new(
        name: &NamespacedName,
        secret_type: SecretType,
        encrypted_data: BTreeMap<String, String>,
    ) -> Self {
        Self {
            types: type_meta(SEALED_SECRET_API_VERSION, SEALED_SECRET_KIND),
            metadata: object_meta(name),
            spec: SealedSecretSpec {
                encrypted_data,
                template: SecretTemplate {
                    metadata: object_meta(name),
                    type_: secret_type.as_str().to_string(),
                },
            },
        }
    }
}
