//! Sealing backed by the `kubeseal` command line tool.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pipekit_core::secret::{Encryptor, PublicKey, PublicKeySource};
use pipekit_core::{Error, NamespacedName, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

const PEM_MARKER: &str = "-----BEGIN CERTIFICATE-----";

fn find_kubeseal() -> Result<PathBuf> {
    which::which("kubeseal")
        .map_err(|e| Error::Sealing(format!("kubeseal binary not found in PATH: {e}")))
}

fn parse_pem(pem: String, source: &str) -> Result<PublicKey> {
    if !pem.contains(PEM_MARKER) {
        return Err(Error::Sealing(format!("{source} is not a PEM certificate")));
    }
    Ok(PublicKey::from_pem(pem))
}

/// Reads the sealing certificate from a PEM file.
#[derive(Debug, Clone)]
pub struct CertFileKeySource {
    path: PathBuf,
}

impl CertFileKeySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PublicKeySource for CertFileKeySource {
    fn public_key(&self) -> Result<PublicKey> {
        let pem = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::Sealing(format!(
                "failed to read certificate {}: {e}",
                self.path.display()
            ))
        })?;
        parse_pem(pem, &self.path.display().to_string())
    }
}

/// Fetches the certificate from the sealed-secrets controller.
#[derive(Debug, Clone)]
pub struct KubesealCertSource {
    binary: PathBuf,
    controller_namespace: Option<String>,
    controller_name: Option<String>,
}

impl KubesealCertSource {
    pub fn new() -> Result<Self> {
        Ok(Self::with_binary(find_kubeseal()?))
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            controller_namespace: None,
            controller_name: None,
        }
    }

    pub fn controller(mut self, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        self.controller_namespace = Some(namespace.into());
        self.controller_name = Some(name.into());
        self
    }
}

impl KubesealCertSource {
    fn fetch_command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--fetch-cert");
        if let Some(ns) = &self.controller_namespace {
            cmd.args(["--controller-namespace", ns.as_str()]);
        }
        if let Some(name) = &self.controller_name {
            cmd.args(["--controller-name", name.as_str()]);
        }
        cmd
    }
}

impl PublicKeySource for KubesealCertSource {
    fn public_key(&self) -> Result<PublicKey> {
        let mut cmd = self.fetch_command();
        debug!(binary = %self.binary.display(), "Fetching sealing certificate");
        let stdout = run(&mut cmd, None)?;
        let pem = String::from_utf8(stdout)
            .map_err(|e| Error::Sealing(format!("certificate is not UTF-8: {e}")))?;
        parse_pem(pem, "fetched certificate")
    }
}

/// Encrypts single values with `kubeseal --raw` in strict scope.
#[derive(Debug, Clone)]
pub struct KubesealEncryptor {
    binary: PathBuf,
}

impl KubesealEncryptor {
    pub fn new() -> Result<Self> {
        Ok(Self::with_binary(find_kubeseal()?))
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Encryptor for KubesealEncryptor {
    fn encrypt(&self, key: &PublicKey, target: &NamespacedName, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut cert = tempfile::NamedTempFile::new()
            .map_err(|e| Error::Sealing(format!("failed to create certificate file: {e}")))?;
        cert.write_all(key.as_pem().as_bytes())
            .and_then(|_| cert.flush())
            .map_err(|e| Error::Sealing(format!("failed to write certificate file: {e}")))?;

        let mut cmd = seal_command(&self.binary, cert.path(), target);
        debug!(secret = %target, "Sealing value with kubeseal");
        let stdout = run(&mut cmd, Some(plaintext))?;

        let encoded = String::from_utf8_lossy(&stdout);
        STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Sealing(format!("kubeseal returned invalid base64: {e}")))
    }
}

fn seal_command(binary: &Path, cert: &Path, target: &NamespacedName) -> Command {
    let mut cmd = Command::new(binary);
    cmd.args(["--raw", "--scope", "strict", "--cert"])
        .arg(cert)
        .args([
            "--namespace",
            target.namespace.as_str(),
            "--name",
            target.name.as_str(),
        ])
        .arg("--from-file=/dev/stdin");
    cmd
}

/// Run `cmd`, feeding `input` on stdin, and return stdout on success.
fn run(cmd: &mut Command, input: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut child = cmd
        .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Sealing(format!("failed to run kubeseal: {e}")))?;

    if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
        stdin
            .write_all(input)
            .map_err(|e| Error::Sealing(format!("failed to pass value to kubeseal: {e}")))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| Error::Sealing(format!("kubeseal did not finish: {e}")))?;
    if !output.status.success() {
        return Err(Error::Sealing(format!(
            "kubeseal exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CERT: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";

    #[test]
    fn test_cert_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CERT.as_bytes()).unwrap();

        let key = CertFileKeySource::new(file.path()).public_key().unwrap();
        assert_eq!(key.as_pem(), CERT);
    }

    #[test]
    fn test_cert_file_not_pem() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();

        let err = CertFileKeySource::new(file.path()).public_key().unwrap_err();
        assert!(matches!(err, Error::Sealing(msg) if msg.contains("not a PEM")));
    }

    #[test]
    fn test_cert_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = CertFileKeySource::new(dir.path().join("cert.pem"))
            .public_key()
            .unwrap_err();
        assert!(matches!(err, Error::Sealing(_)));
    }

    #[test]
    fn test_seal_command_args() {
        let cmd = seal_command(
            Path::new("kubeseal"),
            Path::new("/tmp/cert.pem"),
            &NamespacedName::new("tst-cicd", "regcred"),
        );
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "--raw",
                "--scope",
                "strict",
                "--cert",
                "/tmp/cert.pem",
                "--namespace",
                "tst-cicd",
                "--name",
                "regcred",
                "--from-file=/dev/stdin",
            ]
        );
    }

    #[test]
    fn test_fetch_command_args() {
        let args = |source: &KubesealCertSource| -> Vec<String> {
            source
                .fetch_command()
                .get_args()
                .map(|a| a.to_string_lossy().into_owned())
                .collect()
        };
        let source = KubesealCertSource::with_binary("kubeseal");
        assert_eq!(args(&source), vec!["--fetch-cert"]);

        let source = source.controller("sealed-secrets", "sealed-secrets-controller");
        assert_eq!(
            args(&source),
            vec![
                "--fetch-cert",
                "--controller-namespace",
                "sealed-secrets",
                "--controller-name",
                "sealed-secrets-controller",
            ]
        );
    }

    #[test]
    fn test_missing_binary() {
        let encryptor = KubesealEncryptor::with_binary("/nonexistent/kubeseal");
        let err = encryptor
            .encrypt(
                &PublicKey::from_pem(CERT),
                &NamespacedName::new("ns", "name"),
                b"value",
            )
            .unwrap_err();
        assert!(matches!(err, Error::Sealing(msg) if msg.contains("failed to run kubeseal")));
    }
}
