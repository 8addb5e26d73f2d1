//! Task definitions.

use k8s_openapi::api::core::v1::SecurityContext;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::TypeMeta;
use pipekit_core::NamespacedName;
use serde::{Deserialize, Serialize};

use super::{ParamSpec, SOURCE_WORKSPACE, TEKTON_API_VERSION, WorkspaceDeclaration};
use crate::meta::{object_meta, type_meta};

pub const BUILD_IMAGE_TASK: &str = "build-image-task";
pub const DEPLOY_FROM_SOURCE_TASK: &str = "deploy-from-source-task";

const GIT_IMAGE: &str = "alpine/git:v2.26.2";
const BUILDAH_IMAGE: &str = "quay.io/buildah/buildah:v1.14.0";
const KUBECTL_IMAGE: &str = "quay.io/openshift/origin-cli:latest";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(flatten)]
    pub types: TypeMeta,
    pub metadata: ObjectMeta,
    pub spec: TaskSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParamSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workspaces: Vec<WorkspaceDeclaration>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub name: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<SecurityContext>,
    pub script: String,
}

impl Task {
    pub fn new(name: &NamespacedName, spec: TaskSpec) -> Self {
        Self {
            types: type_meta(TEKTON_API_VERSION, "Task"),
            metadata: object_meta(name),
            spec,
        }
    }
}

fn source_workspace() -> WorkspaceDeclaration {
    WorkspaceDeclaration {
        name: SOURCE_WORKSPACE.to_string(),
        description: Some("The git repository is cloned here".to_string()),
    }
}

fn clone_step() -> Step {
    Step {
        name: "git-clone".to_string(),
        image: GIT_IMAGE.to_string(),
        working_dir: Some(format!("$(workspaces.{SOURCE_WORKSPACE}.path)")),
        security_context: None,
        script: [
            "git clone $(params.REPO) .",
            "git checkout $(params.COMMIT_SHA)",
        ]
        .join("\n"),
    }
}

fn source_params() -> Vec<ParamSpec> {
    vec![
        ParamSpec::string("REPO", "Git repository URL to clone"),
        ParamSpec::string("COMMIT_SHA", "Commit to check out"),
    ]
}

/// Clone a repository, build its Dockerfile with buildah and push the image.
///
/// `tls_verify` sets the default of the `TLSVERIFY` parameter; the cluster's
/// internal registry serves a self-signed certificate.
pub fn build_image_task(name: &NamespacedName, tls_verify: bool) -> Task {
    let privileged = SecurityContext {
        privileged: Some(true),
        ..Default::default()
    };
    let build_step = |step: &str, script: &str| Step {
        name: step.to_string(),
        image: BUILDAH_IMAGE.to_string(),
        working_dir: Some(format!("$(workspaces.{SOURCE_WORKSPACE}.path)")),
        security_context: Some(privileged.clone()),
        script: script.to_string(),
    };

    let mut params = source_params();
    params.push(ParamSpec::string("IMAGE", "Reference of the image to build"));
    params.push(
        ParamSpec::string("DOCKERFILE", "Path to the Dockerfile to build").with_default("./Dockerfile"),
    );
    params.push(
        ParamSpec::string("TLSVERIFY", "Verify the TLS certificate of the registry")
            .with_default(if tls_verify { "true" } else { "false" }),
    );

    Task::new(
        name,
        TaskSpec {
            params,
            workspaces: vec![source_workspace()],
            steps: vec![
                clone_step(),
                build_step(
                    "build",
                    "buildah bud --tls-verify=$(params.TLSVERIFY) --layers -f $(params.DOCKERFILE) -t $(params.IMAGE) .",
                ),
                build_step(
                    "push",
                    "buildah push --tls-verify=$(params.TLSVERIFY) $(params.IMAGE) docker://$(params.IMAGE)",
                ),
            ],
        },
    )
}

/// Clone a repository and apply a kustomization from it, optionally as a dry run.
pub fn deploy_from_source_task(name: &NamespacedName) -> Task {
    let mut params = source_params();
    params.push(
        ParamSpec::string("PATHTODEPLOY", "Path of the kustomization to apply")
            .with_default("./environments"),
    );
    params.push(
        ParamSpec::string("DRYRUN", "Validate the resources without applying them")
            .with_default("false"),
    );

    let apply = Step {
        name: "apply-source".to_string(),
        image: KUBECTL_IMAGE.to_string(),
        working_dir: Some(format!("$(workspaces.{SOURCE_WORKSPACE}.path)")),
        security_context: None,
        script: [
            "if [ \"$(params.DRYRUN)\" = \"true\" ]; then",
            "  kubectl apply --dry-run=client -k $(params.PATHTODEPLOY)",
            "else",
            "  kubectl apply -k $(params.PATHTODEPLOY)",
            "fi",
        ]
        .join("\n"),
    };

    Task::new(
        name,
        TaskSpec {
            params,
            workspaces: vec![source_workspace()],
            steps: vec![clone_step(), apply],
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_of(task: &Task, param: &str) -> Option<String> {
        task.spec
            .params
            .iter()
            .find(|p| p.name == param)
            .and_then(|p| p.default.clone())
    }

    #[test]
    fn test_tls_verify_default() {
        let nn = NamespacedName::new("tst-cicd", BUILD_IMAGE_TASK);
        assert_eq!(
            default_of(&build_image_task(&nn, false), "TLSVERIFY").as_deref(),
            Some("false")
        );
        assert_eq!(
            default_of(&build_image_task(&nn, true), "TLSVERIFY").as_deref(),
            Some("true")
        );
    }

    #[test]
    fn test_build_steps_privileged() {
        let task = build_image_task(&NamespacedName::new("tst-cicd", BUILD_IMAGE_TASK), false);
        let names: Vec<_> = task.spec.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["git-clone", "build", "push"]);
        assert!(task.spec.steps[0].security_context.is_none());
        assert_eq!(
            task.spec.steps[1]
                .security_context
                .as_ref()
                .and_then(|c| c.privileged),
            Some(true)
        );
    }

    #[test]
    fn test_deploy_task_serializes() {
        let task = deploy_from_source_task(&NamespacedName::new("tst-cicd", DEPLOY_FROM_SOURCE_TASK));
        assert_eq!(default_of(&task, "DRYRUN").as_deref(), Some("false"));

        let yaml = serde_yaml::to_string(&task).unwrap();
        assert!(yaml.contains("apiVersion: tekton.dev/v1beta1"));
        assert!(yaml.contains("kind: Task"));
        assert!(yaml.contains("workingDir:"));
        assert!(!yaml.contains("securityContext"));
    }
}
