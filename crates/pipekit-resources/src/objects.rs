//! Core and apps resources: namespaces, service accounts, deployments, services.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, Namespace, ObjectReference, PodSpec, PodTemplateSpec, Service,
    ServiceAccount, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use pipekit_core::NamespacedName;

use crate::meta::{cluster_meta, component_labels, object_meta, selector_labels};

pub fn namespace(name: &str) -> Namespace {
    Namespace {
        metadata: cluster_meta(name),
        ..Default::default()
    }
}

pub fn service_account(name: &NamespacedName) -> ServiceAccount {
    ServiceAccount {
        metadata: object_meta(name),
        ..Default::default()
    }
}

/// Attach a secret to a service account, once.
pub fn add_secret_to_service_account(mut sa: ServiceAccount, secret_name: &str) -> ServiceAccount {
    let secrets = sa.secrets.get_or_insert_with(Vec::new);
    if !secrets
        .iter()
        .any(|s| s.name.as_deref() == Some(secret_name))
    {
        secrets.push(ObjectReference {
            name: Some(secret_name.to_string()),
            ..Default::default()
        });
    }
    sa
}

/// A single-replica deployment running `image` and exposing `port`.
pub fn deployment(name: &NamespacedName, part_of: &str, image: &str, port: i32) -> Deployment {
    let labels = component_labels(&name.name, part_of);

    Deployment {
        metadata: ObjectMeta {
            labels: Some(labels.clone()),
            ..object_meta(name)
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(selector_labels(&name.name)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: name.name.clone(),
                        image: Some(image.to_string()),
                        image_pull_policy: Some("Always".to_string()),
                        ports: Some(vec![ContainerPort {
                            container_port: port,
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A service routing `port` to the pods of the deployment with the same name.
pub fn service(name: &NamespacedName, part_of: &str, port: i32) -> Service {
    Service {
        metadata: ObjectMeta {
            labels: Some(component_labels(&name.name, part_of)),
            ..object_meta(name)
        },
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::Int(port)),
                ..Default::default()
            }]),
            selector: Some(selector_labels(&name.name)),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::NAME_LABEL;

    #[test]
    fn test_namespace_is_cluster_scoped() {
        let ns = namespace("tst-dev");
        assert_eq!(ns.metadata.name.as_deref(), Some("tst-dev"));
        assert!(ns.metadata.namespace.is_none());
    }

    #[test]
    fn test_add_secret_once() {
        let sa = service_account(&NamespacedName::new("tst-cicd", "pipeline"));
        let sa = add_secret_to_service_account(sa, "regcred");
        let sa = add_secret_to_service_account(sa, "regcred");
        let secrets = sa.secrets.unwrap();
        assert_eq!(secrets.len(), 1);
        assert_eq!(secrets[0].name.as_deref(), Some("regcred"));
    }

    #[test]
    fn test_service_selects_deployment() {
        let nn = NamespacedName::new("tst-dev", "http-api-svc");
        let dep = deployment(&nn, "http-api", "nginxinc/nginx-unprivileged:latest", 8080);
        let svc = service(&nn, "http-api", 8080);

        let selector = svc.spec.unwrap().selector.unwrap();
        let pod_labels = dep
            .spec
            .as_ref()
            .and_then(|s| s.template.metadata.as_ref())
            .and_then(|m| m.labels.clone())
            .unwrap();
        for (k, v) in &selector {
            assert_eq!(pod_labels.get(k), Some(v));
        }
        assert_eq!(selector.get(NAME_LABEL).map(String::as_str), Some("http-api-svc"));
    }

    #[test]
    fn test_deployment_container() {
        let nn = NamespacedName::new("tst-dev", "http-api-svc");
        let dep = deployment(&nn, "http-api", "example/image:1", 8080);
        let pod = dep.spec.unwrap().template.spec.unwrap();
        assert_eq!(pod.containers.len(), 1);
        assert_eq!(pod.containers[0].image.as_deref(), Some("example/image:1"));
        assert_eq!(pod.containers[0].ports.as_ref().unwrap()[0].container_port, 8080);
    }
}
