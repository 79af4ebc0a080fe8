//! Crypto capability port (Qlock-shaped) and its sandbox implementation.

use std::collections::BTreeMap;

use ed25519_dalek::{Signer, Verifier};
use qinfinity_types::{IdentityRef, Signature};
use serde::{Deserialize, Serialize};

use crate::error::{PortError, PortResult};

/// Encryption strength requested by a pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionLevel {
    Standard,
    Quantum,
}

impl EncryptionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncryptionLevel::Standard => "standard",
            EncryptionLevel::Quantum => "quantum",
        }
    }
}

/// Metadata produced by `encrypt` and required by the later inverse step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionMeta {
    pub algorithm: String,
    pub level: EncryptionLevel,
    pub nonce: [u8; 32],
    /// Opaque fields carried for the decrypting side.
    pub extra: BTreeMap<String, String>,
}

/// Cryptographic operations the core delegates to the ecosystem.
pub trait CryptoPort: Send + Sync {
    fn hash(&self, bytes: &[u8]) -> [u8; 32];

    fn encrypt(
        &self,
        bytes: &[u8],
        level: EncryptionLevel,
        context: &str,
    ) -> PortResult<(Vec<u8>, EncryptionMeta)>;

    fn decrypt(&self, cipher: &[u8], meta: &EncryptionMeta, context: &str) -> PortResult<Vec<u8>>;

    fn sign(&self, payload: &[u8], identity: &IdentityRef) -> PortResult<Signature>;

    fn verify(&self, payload: &[u8], signature: &Signature, identity: &IdentityRef) -> bool;
}

/// Deterministic local crypto for tests and demos: blake3 digests, an XOR
/// keystream envelope keyed by (context, nonce), and Ed25519 signatures
/// with per-identity keys derived from a workspace seed.
///
/// Nonces are derived from (context, plaintext digest), so encrypting the
/// same payload under the same context is reproducible — replay comparison
/// depends on this.
pub struct SandboxCrypto {
    seed: [u8; 32],
}

impl SandboxCrypto {
    pub fn new(seed: [u8; 32]) -> Self {
        Self { seed }
    }

    fn signing_key(&self, identity: &IdentityRef) -> ed25519_dalek::SigningKey {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"qinfinity-sandbox-identity-key-v1:");
        hasher.update(&self.seed);
        hasher.update(identity.as_str().as_bytes());
        ed25519_dalek::SigningKey::from_bytes(hasher.finalize().as_bytes())
    }

    fn keystream(&self, meta_nonce: &[u8; 32], context: &str, len: usize) -> Vec<u8> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"qinfinity-sandbox-keystream-v1:");
        hasher.update(&self.seed);
        hasher.update(meta_nonce);
        hasher.update(context.as_bytes());
        let mut stream = vec![0u8; len];
        hasher.finalize_xof().fill(&mut stream);
        stream
    }

    fn derive_nonce(&self, bytes: &[u8], context: &str) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"qinfinity-sandbox-nonce-v1:");
        hasher.update(&self.seed);
        hasher.update(context.as_bytes());
        hasher.update(blake3::hash(bytes).as_bytes());
        *hasher.finalize().as_bytes()
    }
}

impl Default for SandboxCrypto {
    fn default() -> Self {
        Self::new([7u8; 32])
    }
}

impl CryptoPort for SandboxCrypto {
    fn hash(&self, bytes: &[u8]) -> [u8; 32] {
        *blake3::hash(bytes).as_bytes()
    }

    fn encrypt(
        &self,
        bytes: &[u8],
        level: EncryptionLevel,
        context: &str,
    ) -> PortResult<(Vec<u8>, EncryptionMeta)> {
        let nonce = self.derive_nonce(bytes, context);
        let stream = self.keystream(&nonce, context, bytes.len());
        let cipher: Vec<u8> = bytes.iter().zip(stream).map(|(b, k)| b ^ k).collect();

        let meta = EncryptionMeta {
            algorithm: "sandbox-xor-blake3".into(),
            level,
            nonce,
            extra: BTreeMap::new(),
        };
        Ok((cipher, meta))
    }

    fn decrypt(&self, cipher: &[u8], meta: &EncryptionMeta, context: &str) -> PortResult<Vec<u8>> {
        if meta.algorithm != "sandbox-xor-blake3" {
            return Err(PortError::Internal(format!(
                "unknown algorithm {}",
                meta.algorithm
            )));
        }
        let stream = self.keystream(&meta.nonce, context, cipher.len());
        Ok(cipher.iter().zip(stream).map(|(b, k)| b ^ k).collect())
    }

    fn sign(&self, payload: &[u8], identity: &IdentityRef) -> PortResult<Signature> {
        let signature = self.signing_key(identity).sign(payload);
        Ok(Signature::from_bytes(&signature.to_bytes()))
    }

    fn verify(&self, payload: &[u8], signature: &Signature, identity: &IdentityRef) -> bool {
        let Some(bytes) = signature.to_bytes() else {
            return false;
        };
        let Ok(sig) = ed25519_dalek::Signature::from_slice(&bytes) else {
            return false;
        };
        self.signing_key(identity)
            .verifying_key()
            .verify(payload, &sig)
            .is_ok()
    }
}
