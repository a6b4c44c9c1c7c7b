// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Network identities.
//!
//! A [`Party`] is a display name bound to an ed25519 public key. Two parties are
//! the same party when their keys match; the display name is only a lookup handle.

use core::fmt;
use core::hash::{Hash, Hasher};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// Raw ed25519 public key bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartyKey(pub [u8; 32]);

impl PartyKey {
    pub fn verifying_key(&self) -> Result<VerifyingKey, KernelError> {
        VerifyingKey::from_bytes(&self.0).map_err(|_| KernelError::InvalidKey)
    }

    /// Verify `signature` over `message` with this key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), KernelError> {
        self.verifying_key()?
            .verify(message, signature)
            .map_err(|_| KernelError::BadSignature)
    }
}

impl fmt::Debug for PartyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartyKey(")?;
        for b in &self.0[..4] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, "..)")
    }
}

impl From<VerifyingKey> for PartyKey {
    fn from(key: VerifyingKey) -> Self {
        PartyKey(key.to_bytes())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub key: PartyKey,
}

impl Party {
    pub fn new(name: impl Into<String>, key: PartyKey) -> Self {
        Self {
            name: name.into(),
            key,
        }
    }
}

impl PartialEq for Party {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Party {}

impl Hash for Party {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A party together with its private signing key. Never leaves the node.
pub struct PartyKeys {
    party: Party,
    signing: SigningKey,
}

impl PartyKeys {
    /// Fresh key pair from the OS RNG.
    pub fn generate(name: impl Into<String>) -> Self {
        let signing = SigningKey::generate(&mut rand::rngs::OsRng);
        Self::from_signing_key(name, signing)
    }

    /// Deterministic key pair, for tests and fixtures.
    pub fn from_seed(name: impl Into<String>, seed: [u8; 32]) -> Self {
        Self::from_signing_key(name, SigningKey::from_bytes(&seed))
    }

    fn from_signing_key(name: impl Into<String>, signing: SigningKey) -> Self {
        let party = Party::new(name, PartyKey::from(signing.verifying_key()));
        Self { party, signing }
    }

    pub fn party(&self) -> &Party {
        &self.party
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }
}

impl fmt::Debug for PartyKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartyKeys").field("party", &self.party).finish_non_exhaustive()
    }
}
