//! Secret sealing.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pipekit_core::secret::{Encryptor, PublicKey, PublicKeySource};
use pipekit_core::{Error, NamespacedName, Plaintext, Result};
use std::cell::OnceCell;
use std::collections::BTreeMap;
use tracing::debug;

use crate::sealed::{DOCKER_CONFIG_KEY, SealedSecret, SecretType};

/// Seals plaintext secrets with an injected key source and encryptor.
///
/// The public key is fetched on first use and reused for every later secret.
pub struct SecretSealer {
    key_source: Box<dyn PublicKeySource>,
    encryptor: Box<dyn Encryptor>,
    key: OnceCell<PublicKey>,
}

impl SecretSealer {
    pub fn new(
        key_source: impl PublicKeySource + 'static,
        encryptor: impl Encryptor + 'static,
    ) -> Self {
        Self {
            key_source: Box::new(key_source),
            encryptor: Box::new(encryptor),
            key: OnceCell::new(),
        }
    }

    /// Seal an opaque secret holding `plaintext` under `data_key`.
    pub fn seal_opaque(
        &self,
        target: &NamespacedName,
        data_key: &str,
        plaintext: &Plaintext,
    ) -> Result<SealedSecret> {
        self.seal(target, data_key, plaintext, SecretType::Opaque)
    }

    /// Seal registry credentials in dockerconfigjson format.
    pub fn seal_docker_config(
        &self,
        target: &NamespacedName,
        plaintext: &Plaintext,
    ) -> Result<SealedSecret> {
        self.seal(target, DOCKER_CONFIG_KEY, plaintext, SecretType::DockerConfigJson)
    }

    fn seal(
        &self,
        target: &NamespacedName,
        data_key: &str,
        plaintext: &Plaintext,
        secret_type: SecretType,
    ) -> Result<SealedSecret> {
        if plaintext.is_empty() {
            return Err(Error::Sealing(format!(
                "refusing to seal an empty value for {target}"
            )));
        }

        let key = self.public_key()?;
        let ciphertext = self
            .encryptor
            .encrypt(key, target, plaintext.expose().as_bytes())
            .map_err(into_sealing)?;

        debug!(secret = %target, key = data_key, "Sealed secret");

        let encrypted = BTreeMap::from([(data_key.to_string(), STANDARD.encode(ciphertext))]);
        Ok(SealedSecret::new(target, secret_type, encrypted))
    }

    fn public_key(&self) -> Result<&PublicKey> {
        if self.key.get().is_none() {
            let key = self.key_source.public_key().map_err(into_sealing)?;
            let _ = self.key.set(key);
        }
        self.key
            .get()
            .ok_or_else(|| Error::Sealing("public key unavailable".to_string()))
    }
}

fn into_sealing(err: Error) -> Error {
    match err {
        Error::Sealing(_) => err,
        other => Error::Sealing(other.to_string()),
    }
}
