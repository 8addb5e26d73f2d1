//! Bootstrap configuration parsing.
//!
//! ```kdl
//! vars {
//!     org "my-org"
//! }
//!
//! bootstrap {
//!     prefix "tst-"
//!     gitops-repo "https://github.com/${org}/gitops.git"
//!     gitops-webhook-secret "${env.GITOPS_WEBHOOK_SECRET}"
//!     image-repo "quay.io/${org}/http-api"
//!     dockercfgjson "~/.docker/config.json"
//! }
//!
//! service "https://github.com/${org}/http-api.git" webhook-secret="${env.APP_WEBHOOK_SECRET}"
//!
//! naming {
//!     service-account "pipeline"
//!     container-port 8080
//! }
//! ```
//!
//! Every field is optional here; command-line flags fill in or override
//! whatever the file leaves out.

use crate::{ConfigError, ConfigResult, VariableContext};
use kdl::{KdlDocument, KdlNode};
use pipekit_core::{Naming, Plaintext};
use std::path::Path;

/// Bootstrap parameters read from a configuration file.
#[derive(Debug, Clone, Default)]
pub struct BootstrapConfig {
    pub prefix: Option<String>,
    pub gitops_repo_url: Option<String>,
    pub gitops_webhook_secret: Option<Plaintext>,
    pub image_repo: Option<String>,
    pub internal_registry_hostname: Option<String>,
    /// Path of the dockerconfigjson file used for external registries.
    pub dockercfgjson: Option<String>,
    /// Path of the sealed-secrets controller certificate.
    pub sealed_secrets_cert: Option<String>,
    pub services: Vec<ServiceConfig>,
    pub naming: Naming,
}

/// A service declared in the configuration file.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub source_url: String,
    pub webhook_secret: Option<Plaintext>,
    pub app_name: Option<String>,
    pub service_name: Option<String>,
}

/// Parse a bootstrap configuration from KDL text.
pub fn parse_bootstrap(kdl: &str, env: &VariableContext) -> ConfigResult<BootstrapConfig> {
    let doc: KdlDocument = kdl.parse()?;
    let mut vars = env.clone();
    let mut config = BootstrapConfig::default();

    // vars must be known before any other node is interpolated
    for node in doc.nodes().iter().filter(|n| n.name().value() == "vars") {
        if let Some(children) = node.children() {
            for child in children.nodes() {
                let key = child.name().value().to_string();
                let value = get_first_string_arg(child)
                    .ok_or_else(|| ConfigError::MissingField(format!("value of var '{key}'")))?;
                let value = vars.interpolate(&value)?;
                vars.set(&key, value);
            }
        }
    }

    for node in doc.nodes() {
        match node.name().value() {
            "bootstrap" => parse_bootstrap_block(node, &vars, &mut config)?,
            "service" => {
                let service = parse_service(node, &vars)?;
                if config
                    .services
                    .iter()
                    .any(|s| s.source_url == service.source_url)
                {
                    return Err(ConfigError::Duplicate(format!(
                        "service '{}'",
                        service.source_url
                    )));
                }
                config.services.push(service);
            }
            "naming" => parse_naming(node, &vars, &mut config.naming)?,
            _ => {} // vars handled above, ignore unknown nodes
        }
    }

    Ok(config)
}

/// Read and parse a bootstrap configuration file.
pub fn load_bootstrap(path: &Path, env: &VariableContext) -> ConfigResult<BootstrapConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_bootstrap(&content, env)
}

fn parse_bootstrap_block(
    node: &KdlNode,
    vars: &VariableContext,
    config: &mut BootstrapConfig,
) -> ConfigResult<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };

    for child in children.nodes() {
        let field = child.name().value();
        let value = required_string(child, vars)?;
        match field {
            "prefix" => config.prefix = Some(value),
            "gitops-repo" => config.gitops_repo_url = Some(value),
            "gitops-webhook-secret" => config.gitops_webhook_secret = Some(Plaintext::new(value)),
            "image-repo" => config.image_repo = Some(value),
            "internal-registry" => config.internal_registry_hostname = Some(value),
            "dockercfgjson" => config.dockercfgjson = Some(value),
            "sealed-secrets-cert" => config.sealed_secrets_cert = Some(value),
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "bootstrap".to_string(),
                    message: format!("unknown setting: {other}"),
                });
            }
        }
    }
    Ok(())
}

fn parse_service(node: &KdlNode, vars: &VariableContext) -> ConfigResult<ServiceConfig> {
    let source_url = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("service source URL".to_string()))?;

    let interpolate_prop = |name: &str| -> ConfigResult<Option<String>> {
        get_string_prop(node, name)
            .map(|v| vars.interpolate(&v))
            .transpose()
    };

    Ok(ServiceConfig {
        source_url: vars.interpolate(&source_url)?,
        webhook_secret: interpolate_prop("webhook-secret")?.map(Plaintext::new),
        app_name: interpolate_prop("app")?,
        service_name: interpolate_prop("name")?,
    })
}

fn parse_naming(node: &KdlNode, vars: &VariableContext, naming: &mut Naming) -> ConfigResult<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };

    for child in children.nodes() {
        let field = child.name().value();
        if field == "container-port" {
            naming.container_port = get_first_int_arg(child)
                .ok_or_else(|| ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "expected a port number".to_string(),
                })?;
            continue;
        }

        let value = required_string(child, vars)?;
        let slot = match field {
            "service-account" => &mut naming.service_account,
            "docker-secret" => &mut naming.docker_secret,
            "role" => &mut naming.role,
            "role-binding" => &mut naming.role_binding,
            "cicd-edit-binding" => &mut naming.cicd_edit_binding,
            "dev-edit-binding" => &mut naming.dev_edit_binding,
            "stage-edit-binding" => &mut naming.stage_edit_binding,
            "internal-registry-binding" => &mut naming.internal_registry_binding,
            "gitops-webhook-secret" => &mut naming.gitops_webhook_secret,
            "webhook-secret-key" => &mut naming.webhook_secret_key,
            "event-listener" => &mut naming.event_listener,
            "route" => &mut naming.route,
            "bootstrap-image" => &mut naming.bootstrap_image,
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "naming".to_string(),
                    message: format!("unknown name: {other}"),
                });
            }
        };
        *slot = value;
    }
    Ok(())
}

// Helper functions for extracting values from KDL nodes

fn required_string(node: &KdlNode, vars: &VariableContext) -> ConfigResult<String> {
    let raw = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField(node.name().value().to_string()))?;
    vars.interpolate(&raw)
}

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_first_int_arg(node: &KdlNode) -> Option<i32> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
        .and_then(|i| i32::try_from(i).ok())
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VariableContextBuilder;

    fn env() -> VariableContext {
        VariableContextBuilder::new()
            .with_env("GITOPS_WEBHOOK_SECRET", "123")
            .with_env("APP_WEBHOOK_SECRET", "456")
            .build()
    }

    #[test]
    fn test_parse_full_config() {
        let kdl = r#"
            vars {
                org "my-org"
            }

            bootstrap {
                prefix "tst-"
                gitops-repo "https://github.com/${org}/gitops.git"
                gitops-webhook-secret "${env.GITOPS_WEBHOOK_SECRET}"
                image-repo "quay.io/${org}/http-api"
                dockercfgjson "~/.docker/config.json"
            }

            service "https://github.com/${org}/http-api.git" webhook-secret="${env.APP_WEBHOOK_SECRET}"
        "#;

        let config = parse_bootstrap(kdl, &env()).unwrap();
        assert_eq!(config.prefix.as_deref(), Some("tst-"));
        assert_eq!(
            config.gitops_repo_url.as_deref(),
            Some("https://github.com/my-org/gitops.git")
        );
        assert_eq!(config.gitops_webhook_secret.unwrap().expose(), "123");
        assert_eq!(config.image_repo.as_deref(), Some("quay.io/my-org/http-api"));
        assert_eq!(config.dockercfgjson.as_deref(), Some("~/.docker/config.json"));
        assert_eq!(config.services.len(), 1);
        assert_eq!(
            config.services[0].source_url,
            "https://github.com/my-org/http-api.git"
        );
        assert_eq!(
            config.services[0].webhook_secret.as_ref().unwrap().expose(),
            "456"
        );
        assert_eq!(config.naming, Naming::default());
    }

    #[test]
    fn test_parse_naming_overrides() {
        let kdl = r#"
            naming {
                service-account "builder"
                event-listener "webhooks"
                container-port 9090
            }
        "#;

        let config = parse_bootstrap(kdl, &env()).unwrap();
        assert_eq!(config.naming.service_account, "builder");
        assert_eq!(config.naming.event_listener, "webhooks");
        assert_eq!(config.naming.container_port, 9090);
        assert_eq!(config.naming.docker_secret, "regcred");
    }

    #[test]
    fn test_unknown_naming_key() {
        let kdl = r#"
            naming {
                flux-capacitor "on"
            }
        "#;

        let result = parse_bootstrap(kdl, &env());
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_duplicate_service() {
        let kdl = r#"
            service "https://github.com/o/a.git"
            service "https://github.com/o/a.git"
        "#;

        let result = parse_bootstrap(kdl, &env());
        assert!(matches!(result, Err(ConfigError::Duplicate(_))));
    }

    #[test]
    fn test_missing_secret_variable() {
        let kdl = r#"
            bootstrap {
                gitops-webhook-secret "${env.NOT_SET}"
            }
        "#;

        let result = parse_bootstrap(kdl, &VariableContext::new());
        assert!(matches!(result, Err(ConfigError::UndefinedVariable(_))));
    }

    #[test]
    fn test_service_name_overrides() {
        let kdl = r#"
            service "https://github.com/o/api.git" app="shop" name="shop-api"
        "#;

        let config = parse_bootstrap(kdl, &env()).unwrap();
        let svc = &config.services[0];
        assert_eq!(svc.app_name.as_deref(), Some("shop"));
        assert_eq!(svc.service_name.as_deref(), Some("shop-api"));
        assert!(svc.webhook_secret.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_bootstrap(Path::new("/nonexistent/pipekit.kdl"), &env());
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_invalid_kdl() {
        let result = parse_bootstrap("bootstrap {", &env());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
