//! Pipeline definitions.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::TypeMeta;
use pipekit_core::NamespacedName;
use serde::{Deserialize, Serialize};

use super::{
    NameRef, Param, ParamSpec, SOURCE_WORKSPACE, TEKTON_API_VERSION, WorkspaceDeclaration,
    pipeline_param,
};
use crate::meta::{object_meta, type_meta};

pub const APP_CI_PIPELINE: &str = "app-ci-pipeline";
pub const CI_DRYRUN_FROM_PR_PIPELINE: &str = "ci-dryrun-from-pr-pipeline";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(flatten)]
    pub types: TypeMeta,
    pub metadata: ObjectMeta,
    pub spec: PipelineSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workspaces: Vec<WorkspaceDeclaration>,
    pub tasks: Vec<PipelineTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTask {
    pub name: String,
    pub task_ref: NameRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workspaces: Vec<WorkspaceBinding>,
}

/// Maps a pipeline workspace onto a task workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceBinding {
    pub name: String,
    pub workspace: String,
}

impl Pipeline {
    pub fn new(name: &NamespacedName, spec: PipelineSpec) -> Self {
        Self {
            types: type_meta(TEKTON_API_VERSION, "Pipeline"),
            metadata: object_meta(name),
            spec,
        }
    }

    /// Names of the tasks the pipeline runs.
    pub fn task_refs(&self) -> impl Iterator<Item = &str> {
        self.spec.tasks.iter().map(|t| t.task_ref.name.as_str())
    }
}

fn source_params() -> Vec<ParamSpec> {
    vec![
        ParamSpec::string("REPO", "Git repository URL"),
        ParamSpec::string("COMMIT_SHA", "Commit to build"),
    ]
}

fn forward(names: &[&str]) -> Vec<Param> {
    names
        .iter()
        .map(|n| Param::new(n, pipeline_param(n)))
        .collect()
}

fn shared_source() -> (Vec<WorkspaceDeclaration>, Vec<WorkspaceBinding>) {
    (
        vec![WorkspaceDeclaration {
            name: SOURCE_WORKSPACE.to_string(),
            description: None,
        }],
        vec![WorkspaceBinding {
            name: SOURCE_WORKSPACE.to_string(),
            workspace: SOURCE_WORKSPACE.to_string(),
        }],
    )
}

/// Build and push the image of an application repository.
pub fn app_ci_pipeline(name: &NamespacedName, build_task: &str) -> Pipeline {
    let mut params = source_params();
    params.push(ParamSpec::string("IMAGE", "Reference of the image to push"));
    let (workspaces, bindings) = shared_source();

    Pipeline::new(
        name,
        PipelineSpec {
            params,
            workspaces,
            tasks: vec![PipelineTask {
                name: "build-image".to_string(),
                task_ref: NameRef::new(build_task),
                params: forward(&["REPO", "COMMIT_SHA", "IMAGE"]),
                workspaces: bindings,
            }],
        },
    )
}

/// Validate a GitOps pull request by applying it as a dry run.
pub fn ci_dryrun_from_pr_pipeline(name: &NamespacedName, deploy_task: &str) -> Pipeline {
    let (workspaces, bindings) = shared_source();
    let mut params = forward(&["REPO", "COMMIT_SHA"]);
    params.push(Param::new("DRYRUN", "true"));

    Pipeline::new(
        name,
        PipelineSpec {
            params: source_params(),
            workspaces,
            tasks: vec![PipelineTask {
                name: "apply-source".to_string(),
                task_ref: NameRef::new(deploy_task),
                params,
                workspaces: bindings,
            }],
        },
    )
}
