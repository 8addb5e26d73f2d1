//! Tekton Pipelines and Triggers resources.
//!
//! Only the fields the generated resources use are modelled. Every struct
//! serializes to the camelCase layout the Tekton controllers expect.

pub mod eventlisteners;
pub mod pipelines;
pub mod tasks;
pub mod triggers;

use serde::{Deserialize, Serialize};

pub use eventlisteners::EventListener;
pub use pipelines::Pipeline;
pub use tasks::Task;
pub use triggers::{TriggerBinding, TriggerTemplate};

pub const TEKTON_API_VERSION: &str = "tekton.dev/v1beta1";
pub const TRIGGERS_API_VERSION: &str = "triggers.tekton.dev/v1alpha1";

/// A declared parameter of a task, pipeline or trigger template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ParamSpec {
    /// A string parameter.
    pub fn string(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            type_: Some("string".to_string()),
            description: Some(description.to_string()),
            default: None,
        }
    }

    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }
}

/// A parameter value passed to a task, pipeline or run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

impl Param {
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// Reference to another resource by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameRef {
    pub name: String,
}

impl NameRef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceDeclaration {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Name of the shared workspace every task clones its source into.
pub const SOURCE_WORKSPACE: &str = "source";

/// Reference a pipeline parameter from inside a pipeline.
pub(crate) fn pipeline_param(name: &str) -> String {
    format!("$(params.{name})")
}

/// Reference a trigger template parameter from inside a resource template.
pub(crate) fn template_param(name: &str) -> String {
    format!("$(tt.params.{name})")
}
