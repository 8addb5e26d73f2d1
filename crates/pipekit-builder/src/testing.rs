//! Fakes shared by the builder tests.

use pipekit_core::cluster::{InstallChecker, NamespaceQuery};
use pipekit_core::secret::{Encryptor, PublicKey, PublicKeySource};
use pipekit_core::{BootstrapOptions, NamespacedName, Plaintext, Result, ServiceSpec};
use pipekit_resources::SecretSealer;
use std::cell::Cell;
use std::rc::Rc;

#[derive(Clone, Default)]
pub struct Calls {
    pub key: Rc<Cell<usize>>,
    pub encrypt: Rc<Cell<usize>>,
}

struct FakeKeySource(Rc<Cell<usize>>);

impl PublicKeySource for FakeKeySource {
    fn public_key(&self) -> Result<PublicKey> {
        self.0.set(self.0.get() + 1);
        Ok(PublicKey::from_pem("test-cert"))
    }
}

/// Deterministic "encryption": the target followed by the reversed plaintext.
struct FakeEncryptor(Rc<Cell<usize>>);

impl Encryptor for FakeEncryptor {
    fn encrypt(&self, _key: &PublicKey, target: &NamespacedName, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.0.set(self.0.get() + 1);
        let mut out = format!("{target}:").into_bytes();
        out.extend(plaintext.iter().rev());
        Ok(out)
    }
}

pub fn sealer() -> (SecretSealer, Calls) {
    let calls = Calls::default();
    let sealer = SecretSealer::new(
        FakeKeySource(calls.key.clone()),
        FakeEncryptor(calls.encrypt.clone()),
    );
    (sealer, calls)
}

pub struct FakeInstall {
    pub installed: bool,
    pub calls: Rc<Cell<usize>>,
}

impl FakeInstall {
    pub fn new(installed: bool) -> Self {
        Self {
            installed,
            calls: Rc::new(Cell::new(0)),
        }
    }
}

impl InstallChecker for FakeInstall {
    fn check_install(&self) -> Result<bool> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.installed)
    }
}

/// Reports the listed namespaces as existing.
pub struct FakeNamespaces(pub Vec<&'static str>);

impl NamespaceQuery for FakeNamespaces {
    fn namespace_exists(&self, name: &str) -> Result<bool> {
        Ok(self.0.contains(&name))
    }
}

pub fn service(repo: &str) -> ServiceSpec {
    ServiceSpec::from_repo_url(&format!("https://github.com/my-org/{repo}.git"), "456")
        .expect("valid repo url")
}

/// Options for an internal-registry bootstrap with a `tst-` prefix.
pub fn options() -> BootstrapOptions {
    BootstrapOptions {
        prefix: "tst-".to_string(),
        gitops_repo_url: "https://github.com/my-org/gitops.git".to_string(),
        gitops_webhook_secret: Plaintext::new("123"),
        services: vec![service("http-api")],
        image_repo: "image/repo".to_string(),
        ..Default::default()
    }
}

/// Options pushing to an external registry.
pub fn external_options() -> BootstrapOptions {
    BootstrapOptions {
        image_repo: "quay.io/my-org/http-api".to_string(),
        docker_config: Some(Plaintext::new(r#"{"auths":{"quay.io":{"auth":"dXNlcjpwYXNz"}}}"#)),
        ..options()
    }
}
