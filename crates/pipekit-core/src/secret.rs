//! Secret values and the sealing capabilities.
//!
//! Sealing is split into two injected capabilities: a [`PublicKeySource`] that
//! yields the cluster's sealing certificate, and an [`Encryptor`] that turns a
//! plaintext into ciphertext for a given namespaced target. Neither ever sees
//! anything but the single secret it is handed.

use std::fmt;
use zeroize::Zeroizing;

use crate::{NamespacedName, Result};

/// A secret value that is wiped from memory when dropped.
#[derive(Clone, Default)]
pub struct Plaintext(Zeroizing<String>);

impl Plaintext {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Plaintext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Plaintext(<redacted>)")
    }
}

impl From<String> for Plaintext {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Plaintext {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// PEM-encoded public certificate of the sealing controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(String);

impl PublicKey {
    pub fn from_pem(pem: impl Into<String>) -> Self {
        Self(pem.into())
    }

    pub fn as_pem(&self) -> &str {
        &self.0
    }
}

/// Source of the sealing public key.
pub trait PublicKeySource {
    fn public_key(&self) -> Result<PublicKey>;
}

/// Encrypts a single secret value for one namespaced target.
pub trait Encryptor {
    fn encrypt(&self, key: &PublicKey, target: &NamespacedName, plaintext: &[u8]) -> Result<Vec<u8>>;
}
