//! Identity capability port (sQuid-shaped): group membership, compact
//! descriptors, and attributed signature verification.

use dashmap::DashMap;
use qinfinity_types::{IdentityRef, Signature};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::crypto::CryptoPort;
use crate::error::{PortError, PortResult};

/// Compact identity descriptor handed to audit trails and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityDescriptor {
    pub identity: IdentityRef,
    pub display_name: String,
    pub reputation_tier: u8,
}

pub trait IdentityPort: Send + Sync {
    /// Is `identity` a member of `group` (a DAO id, a module role, ...)?
    fn is_member(&self, identity: &IdentityRef, group: &str) -> PortResult<bool>;

    fn descriptor(&self, identity: &IdentityRef) -> PortResult<IdentityDescriptor>;

    /// Verify a signature attributed to `identity` over `payload`.
    fn verify_signature(&self, identity: &IdentityRef, payload: &[u8], signature: &Signature)
        -> bool;
}

/// In-memory identity directory backed by the sandbox crypto for signature
/// checks. Memberships are registered up front by tests and demos.
pub struct StaticIdentityDirectory {
    members: DashMap<String, HashSet<IdentityRef>>,
    descriptors: DashMap<IdentityRef, IdentityDescriptor>,
    crypto: std::sync::Arc<dyn CryptoPort>,
}

impl StaticIdentityDirectory {
    pub fn new(crypto: std::sync::Arc<dyn CryptoPort>) -> Self {
        Self {
            members: DashMap::new(),
            descriptors: DashMap::new(),
            crypto,
        }
    }

    pub fn register(&self, identity: IdentityRef, display_name: impl Into<String>) {
        self.descriptors.insert(
            identity.clone(),
            IdentityDescriptor {
                identity,
                display_name: display_name.into(),
                reputation_tier: 1,
            },
        );
    }

    pub fn add_member(&self, group: &str, identity: IdentityRef) {
        self.members
            .entry(group.to_string())
            .or_default()
            .insert(identity);
    }
}

impl IdentityPort for StaticIdentityDirectory {
    fn is_member(&self, identity: &IdentityRef, group: &str) -> PortResult<bool> {
        Ok(self
            .members
            .get(group)
            .map(|set| set.contains(identity))
            .unwrap_or(false))
    }

    fn descriptor(&self, identity: &IdentityRef) -> PortResult<IdentityDescriptor> {
        self.descriptors
            .get(identity)
            .map(|d| d.clone())
            .ok_or_else(|| PortError::NotFound(identity.to_string()))
    }

    fn verify_signature(
        &self,
        identity: &IdentityRef,
        payload: &[u8],
        signature: &Signature,
    ) -> bool {
        self.crypto.verify(payload, signature, identity)
    }
}
