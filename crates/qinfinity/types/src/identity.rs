//! Identity references, signatures, and content addresses as they cross
//! component boundaries. All three are opaque to the control-plane; the
//! external identity and storage modules own their semantics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Compact reference to an sQuid identity.
///
/// Ordered so that multi-identity lock acquisition can sort deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityRef(String);

impl IdentityRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "squid:{}", self.0)
    }
}

/// A detached signature over some payload, hex-encoded.
///
/// Sandbox environments use the fixed `sandbox_sig_` prefix instead of a
/// real signature; acceptance of that form is gated by configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(String);

pub const SANDBOX_SIGNATURE_PREFIX: &str = "sandbox_sig_";

impl Signature {
    pub fn new(sig: impl Into<String>) -> Self {
        Self(sig.into())
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut out = String::with_capacity(bytes.len() * 2);
        for byte in bytes {
            out.push_str(&format!("{byte:02x}"));
        }
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the hex form back to raw bytes. Returns `None` for sandbox or
    /// otherwise non-hex signatures.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        if self.0.len() % 2 != 0 {
            return None;
        }
        (0..self.0.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&self.0[i..i + 2], 16).ok())
            .collect()
    }

    pub fn is_sandbox(&self) -> bool {
        self.0.starts_with(SANDBOX_SIGNATURE_PREFIX)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hash-derived locator for an externally stored blob. Opaque here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentAddress(String);

impl ContentAddress {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
