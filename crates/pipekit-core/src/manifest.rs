//! The `pipelines.yaml` manifest descriptor.
//!
//! The descriptor records which environments exist, which applications and
//! services are deployed into them, and where each service's webhook secret
//! lives. It is written on every bootstrap and read back when services are
//! added later, so merging must update entries in place rather than append
//! duplicates.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Top-level descriptor of a bootstrapped GitOps repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gitops_url: Option<String>,
    #[serde(default)]
    pub environments: Vec<Environment>,
}

/// A deployment environment (one namespace).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    /// Hosts the pipelines, triggers and event listener.
    #[serde(default, skip_serializing_if = "is_false")]
    pub cicd: bool,
    /// Hosts the GitOps controller.
    #[serde(default, skip_serializing_if = "is_false")]
    pub argo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipelines: Option<Pipelines>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub apps: Vec<Application>,
}

/// Pipelines triggered for services in an environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipelines {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration: Option<TemplateBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateBinding {
    pub template: String,
    pub binding: String,
}

/// A group of services released together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Service>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<Webhook>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
    pub secret: SecretRef,
}

/// Location of a sealed secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    pub name: String,
    pub namespace: String,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Manifest {
    /// Parse a persisted descriptor.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::InvalidInput(format!("failed to parse manifest: {e}")))
    }

    pub fn environment(&self, name: &str) -> Option<&Environment> {
        self.environments.iter().find(|e| e.name == name)
    }

    pub fn environment_mut(&mut self, name: &str) -> Option<&mut Environment> {
        self.environments.iter_mut().find(|e| e.name == name)
    }

    /// The environment hosting the pipelines, if any.
    pub fn cicd_environment(&self) -> Option<&Environment> {
        self.environments.iter().find(|e| e.cicd)
    }

    /// Merge `other` into `self`.
    ///
    /// Environments, applications and services are matched by name; matches
    /// are updated in place and keep their position, new entries are appended.
    pub fn merge(&mut self, other: Manifest) {
        if other.gitops_url.is_some() {
            self.gitops_url = other.gitops_url;
        }
        for env in other.environments {
            match self.environment_mut(&env.name) {
                Some(existing) => existing.merge(env),
                None => self.environments.push(env),
            }
        }
    }
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn merge(&mut self, other: Environment) {
        self.cicd = other.cicd;
        self.argo = other.argo;
        if other.pipelines.is_some() {
            self.pipelines = other.pipelines;
        }
        for app in other.apps {
            for service in app.services {
                self.add_service(&app.name, service);
            }
            if self.app(&app.name).is_none() {
                self.apps.push(Application::new(app.name));
            }
        }
    }

    /// Every service of the environment with the name of its application.
    pub fn services(&self) -> impl Iterator<Item = (&str, &Service)> {
        self.apps
            .iter()
            .flat_map(|app| app.services.iter().map(move |s| (app.name.as_str(), s)))
    }

    pub fn app(&self, name: &str) -> Option<&Application> {
        self.apps.iter().find(|a| a.name == name)
    }

    /// Insert or replace a service inside the named application, creating the
    /// application when needed.
    pub fn add_service(&mut self, app_name: &str, service: Service) {
        let app = match self.apps.iter().position(|a| a.name == app_name) {
            Some(idx) => &mut self.apps[idx],
            None => {
                self.apps.push(Application::new(app_name));
                let last = self.apps.len() - 1;
                &mut self.apps[last]
            }
        };
        app.upsert_service(service);
    }
}

impl Application {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            services: Vec::new(),
        }
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }

    fn upsert_service(&mut self, service: Service) {
        match self.services.iter_mut().find(|s| s.name == service.name) {
            Some(existing) => *existing = service,
            None => self.services.push(service),
        }
    }
}
