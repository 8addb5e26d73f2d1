//! OpenShift route exposing the event listener.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::core::TypeMeta;
use pipekit_core::NamespacedName;
use serde::{Deserialize, Serialize};

use crate::meta::{object_meta, type_meta};

pub const ROUTE_API_VERSION: &str = "route.openshift.io/v1";

/// Port the Tekton Triggers event listener service listens on.
pub const EVENT_LISTENER_PORT: i32 = 8080;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(flatten)]
    pub types: TypeMeta,
    pub metadata: ObjectMeta,
    pub spec: RouteSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    pub to: RouteTarget,
    pub port: RoutePort,
    pub wildcard_policy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteTarget {
    pub kind: String,
    pub name: String,
    pub weight: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    pub target_port: IntOrString,
}

impl Route {
    /// Name of the service the route sends traffic to.
    pub fn target_service(&self) -> &str {
        &self.spec.to.name
    }
}

pub fn route(name: &NamespacedName, service: &str, port: i32) -> Route {
    Route {
        types: type_meta(ROUTE_API_VERSION, "Route"),
        metadata: object_meta(name),
        spec: RouteSpec {
            to: RouteTarget {
                kind: "Service".to_string(),
                name: service.to_string(),
                weight: 100,
            },
            port: RoutePort {
                target_port: IntOrString::Int(port),
            },
            wildcard_policy: "None".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_to_listener_service() {
        let r = route(
            &NamespacedName::new("tst-cicd", "gitops-webhook-event-listener-route"),
            "el-cicd-event-listener",
            EVENT_LISTENER_PORT,
        );
        assert_eq!(r.target_service(), "el-cicd-event-listener");

        let yaml = serde_yaml::to_string(&r).unwrap();
        assert!(yaml.contains("kind: Route"));
        assert!(yaml.contains("targetPort: 8080"));
        assert!(yaml.contains("wildcardPolicy: None"));
    }
}
