//! Index (Qindex-shaped) and audit (Qerberos-shaped) capability ports.

use dashmap::DashMap;
use qinfinity_types::{ErrorKind, IdentityRef};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::error::{PortError, PortResult};

/// Descriptor registered with the index module for later discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub key: String,
    pub content_hash: String,
    pub size_bytes: u64,
    pub namespace: String,
}

pub trait IndexPort: Send + Sync {
    fn register(&self, entry: IndexEntry) -> PortResult<()>;

    fn lookup(&self, key: &str) -> PortResult<Option<IndexEntry>>;
}

/// One immutable audit trail entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: String,
    pub actor: IdentityRef,
    pub resource: String,
    pub outcome: String,
    pub error_kind: Option<ErrorKind>,
    pub correlation_id: Option<String>,
    pub timestamp_ms: u64,
}

pub trait AuditPort: Send + Sync {
    fn record(&self, event: AuditEvent) -> PortResult<()>;
}

/// In-memory index double.
#[derive(Default)]
pub struct MemoryIndex {
    entries: DashMap<String, IndexEntry>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IndexPort for MemoryIndex {
    fn register(&self, entry: IndexEntry) -> PortResult<()> {
        self.entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    fn lookup(&self, key: &str) -> PortResult<Option<IndexEntry>> {
        Ok(self.entries.get(key).map(|e| e.clone()))
    }
}

/// In-memory audit trail double; tests assert against `events()`.
#[derive(Default)]
pub struct MemoryAuditTrail {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl AuditPort for MemoryAuditTrail {
    fn record(&self, event: AuditEvent) -> PortResult<()> {
        self.events
            .lock()
            .map_err(|_| PortError::Internal("audit trail poisoned".into()))?
            .push(event);
        Ok(())
    }
}
