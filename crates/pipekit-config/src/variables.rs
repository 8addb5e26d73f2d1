//! `${...}` interpolation in configuration values.
//!
//! `${env.NAME}` reads the process environment and `${name}` reads a value
//! declared in the `vars` block. Webhook secrets are normally passed as
//! `${env.NAME}` so they never sit in the file itself.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::{ConfigError, ConfigResult};

const ENV_SCOPE: &str = "env.";

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{((?:env\.)?[A-Za-z_][A-Za-z0-9_-]*)\}").unwrap()
});

/// Values available to `${...}` placeholders.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    env: HashMap<String, String>,
    vars: HashMap<String, String>,
}

impl VariableContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context seeded with every variable of the current process.
    pub fn from_process_env() -> Self {
        Self {
            env: std::env::vars().collect(),
            vars: HashMap::new(),
        }
    }

    /// Declare a `vars` entry, replacing any earlier value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.vars.insert(name.to_string(), value.into());
    }

    /// Look up a placeholder body such as `env.HOME` or `org`.
    pub fn resolve(&self, placeholder: &str) -> Option<&str> {
        match placeholder.strip_prefix(ENV_SCOPE) {
            Some(name) => self.env.get(name),
            None => self.vars.get(placeholder),
        }
        .map(String::as_str)
    }

    /// Replace every placeholder in `input`.
    ///
    /// An unresolved placeholder fails the whole value so a literal
    /// `${env.TOKEN}` is never sealed as if it were the secret.
    pub fn interpolate(&self, input: &str) -> ConfigResult<String> {
        let mut missing = None;
        let output = PLACEHOLDER.replace_all(input, |caps: &Captures| {
            let name = &caps[1];
            match self.resolve(name) {
                Some(value) => value.to_string(),
                None => {
                    missing.get_or_insert_with(|| name.to_string());
                    String::new()
                }
            }
        });

        match missing {
            Some(name) => Err(ConfigError::UndefinedVariable(name)),
            None => Ok(output.into_owned()),
        }
    }
}

/// Builds a context with fixed values, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct VariableContextBuilder {
    ctx: VariableContext,
}

impl VariableContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.env.insert(key.into(), value.into());
        self
    }

    pub fn with_var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.ctx.set(key, value);
        self
    }

    pub fn build(self) -> VariableContext {
        self.ctx
    }
}
