//! The event listener receiving repository webhooks.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::TypeMeta;
use pipekit_core::NamespacedName;
use serde::{Deserialize, Serialize};

use super::TRIGGERS_API_VERSION;
use crate::meta::{object_meta, type_meta};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventListener {
    #[serde(flatten)]
    pub types: TypeMeta,
    pub metadata: ObjectMeta,
    pub spec: EventListenerSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListenerSpec {
    pub service_account_name: String,
    pub triggers: Vec<EventListenerTrigger>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventListenerTrigger {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interceptors: Vec<Interceptor>,
    pub bindings: Vec<BindingRef>,
    pub template: TemplateRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingRef {
    #[serde(rename = "ref")]
    pub ref_: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRef {
    #[serde(rename = "ref")]
    pub ref_: String,
}

/// One interceptor; exactly one field is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interceptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<GithubInterceptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cel: Option<CelInterceptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubInterceptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretKeyRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyRef {
    pub secret_name: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CelInterceptor {
    pub filter: String,
}

impl EventListener {
    /// Name of the service Tekton Triggers creates in front of the listener.
    pub fn service_name(&self) -> String {
        format!("el-{}", self.metadata.name.as_deref().unwrap_or_default())
    }

    pub fn binding_refs(&self) -> impl Iterator<Item = &str> {
        self.spec
            .triggers
            .iter()
            .flat_map(|t| t.bindings.iter().map(|b| b.ref_.as_str()))
    }

    pub fn template_refs(&self) -> impl Iterator<Item = &str> {
        self.spec.triggers.iter().map(|t| t.template.ref_.as_str())
    }

    /// Secrets the interceptors validate webhook signatures with.
    pub fn secret_refs(&self) -> impl Iterator<Item = &str> {
        self.spec
            .triggers
            .iter()
            .flat_map(|t| t.interceptors.iter())
            .filter_map(|i| i.github.as_ref()?.secret_ref.as_ref())
            .map(|s| s.secret_name.as_str())
    }
}

/// A trigger with the given interceptors, binding and template.
pub fn trigger(
    name: &str,
    interceptors: Vec<Interceptor>,
    binding: &str,
    template: &str,
) -> EventListenerTrigger {
    EventListenerTrigger {
        name: name.to_string(),
        interceptors,
        bindings: vec![BindingRef {
            ref_: binding.to_string(),
        }],
        template: TemplateRef {
            ref_: template.to_string(),
        },
    }
}

/// Validate the GitHub signature with `secret` and accept `pull_request` events.
pub fn github_interceptor(secret: Option<&str>, secret_key: &str) -> Interceptor {
    Interceptor {
        github: Some(GithubInterceptor {
            secret_ref: secret.map(|s| SecretKeyRef {
                secret_name: s.to_string(),
                secret_key: secret_key.to_string(),
            }),
            event_types: vec!["pull_request".to_string()],
        }),
        cel: None,
    }
}

pub fn cel_interceptor(filter: impl Into<String>) -> Interceptor {
    Interceptor {
        github: None,
        cel: Some(CelInterceptor {
            filter: filter.into(),
        }),
    }
}

const PR_ACTIONS: &str = "(body.action == 'opened' || body.action == 'synchronize')";

/// CEL filter accepting pull requests against `org_repo` only.
pub fn gitops_repo_filter(org_repo: &str) -> String {
    format!("{PR_ACTIONS} && body.repository.full_name == '{org_repo}'")
}

/// CEL filter accepting pull requests against any repository except `org_repo`.
pub fn app_repo_filter(org_repo: &str) -> String {
    format!("{PR_ACTIONS} && body.repository.full_name != '{org_repo}'")
}

pub fn event_listener(
    name: &NamespacedName,
    service_account: &str,
    triggers: Vec<EventListenerTrigger>,
) -> EventListener {
    EventListener {
        types: type_meta(TRIGGERS_API_VERSION, "EventListener"),
        metadata: object_meta(name),
        spec: EventListenerSpec {
            service_account_name: service_account.to_string(),
            triggers,
        },
    }
}
