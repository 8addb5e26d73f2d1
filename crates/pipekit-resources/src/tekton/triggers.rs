//! Trigger bindings and trigger templates.

use k8s_openapi::api::core::v1::EmptyDirVolumeSource;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::TypeMeta;
use pipekit_core::NamespacedName;
use serde::{Deserialize, Serialize};

use super::{
    NameRef, Param, ParamSpec, SOURCE_WORKSPACE, TEKTON_API_VERSION, TRIGGERS_API_VERSION,
    template_param,
};
use crate::meta::{object_meta, type_meta};

pub const GITHUB_PR_BINDING: &str = "github-pr-binding";
pub const APP_CI_BUILD_PR_TEMPLATE: &str = "app-ci-build-pr-template";
pub const CI_DRYRUN_FROM_PR_TEMPLATE: &str = "ci-dryrun-from-pr-template";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerBinding {
    #[serde(flatten)]
    pub types: TypeMeta,
    pub metadata: ObjectMeta,
    pub spec: TriggerBindingSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerBindingSpec {
    pub params: Vec<Param>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerTemplate {
    #[serde(flatten)]
    pub types: TypeMeta,
    pub metadata: ObjectMeta,
    pub spec: TriggerTemplateSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerTemplateSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamSpec>,
    pub resourcetemplates: Vec<PipelineRun>,
}

/// A pipeline run rendered by a trigger template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    #[serde(flatten)]
    pub types: TypeMeta,
    pub metadata: ObjectMeta,
    pub spec: PipelineRunSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunSpec {
    pub service_account_name: String,
    pub pipeline_ref: NameRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workspaces: Vec<RunWorkspace>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunWorkspace {
    pub name: String,
    pub empty_dir: EmptyDirVolumeSource,
}

impl TriggerTemplate {
    /// Pipelines referenced by the rendered runs.
    pub fn pipeline_refs(&self) -> impl Iterator<Item = &str> {
        self.spec
            .resourcetemplates
            .iter()
            .map(|r| r.spec.pipeline_ref.name.as_str())
    }

    /// Service accounts the rendered runs execute as.
    pub fn service_accounts(&self) -> impl Iterator<Item = &str> {
        self.spec
            .resourcetemplates
            .iter()
            .map(|r| r.spec.service_account_name.as_str())
    }
}

/// Extract the pull request coordinates from a GitHub pull_request event.
pub fn github_pr_binding(name: &NamespacedName) -> TriggerBinding {
    TriggerBinding {
        types: type_meta(TRIGGERS_API_VERSION, "TriggerBinding"),
        metadata: object_meta(name),
        spec: TriggerBindingSpec {
            params: vec![
                Param::new("gitref", "$(body.pull_request.head.ref)"),
                Param::new("gitsha", "$(body.pull_request.head.sha)"),
                Param::new("gitrepositoryurl", "$(body.repository.clone_url)"),
                Param::new("fullname", "$(body.repository.full_name)"),
            ],
        },
    }
}

fn template_params() -> Vec<ParamSpec> {
    vec![
        ParamSpec::string("gitref", "The git branch of the pull request"),
        ParamSpec::string("gitsha", "The head commit of the pull request"),
        ParamSpec::string("gitrepositoryurl", "The git repository URL"),
        ParamSpec::string("fullname", "The owner/repository name"),
    ]
}

fn pipeline_run(
    generate_name: &str,
    namespace: &str,
    service_account: &str,
    pipeline: &str,
    params: Vec<Param>,
) -> PipelineRun {
    PipelineRun {
        types: type_meta(TEKTON_API_VERSION, "PipelineRun"),
        metadata: ObjectMeta {
            generate_name: Some(generate_name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: PipelineRunSpec {
            service_account_name: service_account.to_string(),
            pipeline_ref: NameRef::new(pipeline),
            params,
            workspaces: vec![RunWorkspace {
                name: SOURCE_WORKSPACE.to_string(),
                empty_dir: EmptyDirVolumeSource::default(),
            }],
        },
    }
}

fn template(name: &NamespacedName, run: PipelineRun) -> TriggerTemplate {
    TriggerTemplate {
        types: type_meta(TRIGGERS_API_VERSION, "TriggerTemplate"),
        metadata: object_meta(name),
        spec: TriggerTemplateSpec {
            params: template_params(),
            resourcetemplates: vec![run],
        },
    }
}

/// Build and push an application image for every pull request.
///
/// Images are tagged with the head commit of the pull request.
pub fn app_ci_build_pr_template(
    name: &NamespacedName,
    service_account: &str,
    pipeline: &str,
    image_repo: &str,
) -> TriggerTemplate {
    let run = pipeline_run(
        "app-ci-pipeline-run-",
        &name.namespace,
        service_account,
        pipeline,
        vec![
            Param::new("REPO", template_param("gitrepositoryurl")),
            Param::new("COMMIT_SHA", template_param("gitsha")),
            Param::new("IMAGE", format!("{image_repo}:{}", template_param("gitsha"))),
        ],
    );
    template(name, run)
}

/// Dry-run the GitOps repository for every pull request against it.
pub fn ci_dryrun_from_pr_template(
    name: &NamespacedName,
    service_account: &str,
    pipeline: &str,
) -> TriggerTemplate {
    let run = pipeline_run(
        "ci-dryrun-from-pr-pipeline-run-",
        &name.namespace,
        service_account,
        pipeline,
        vec![
            Param::new("REPO", template_param("gitrepositoryurl")),
            Param::new("COMMIT_SHA", template_param("gitsha")),
        ],
    );
    template(name, run)
}
