//! Content-addressed storage port (IPFS-shaped) and an in-memory double
//! with failure injection for publication-retry tests.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use qinfinity_types::ContentAddress;
use serde::{Deserialize, Serialize};

use crate::error::{PortError, PortResult};

/// What `stat` reports about a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentDescriptor {
    pub address: ContentAddress,
    pub name: String,
    pub namespace: String,
    pub size_bytes: u64,
    pub stored_at_ms: u64,
}

/// Timeout-bounded content storage. Failures are reported to the caller,
/// never thrown through a background task.
#[async_trait]
pub trait ContentStoragePort: Send + Sync {
    async fn put(&self, bytes: &[u8], name: &str, namespace: &str) -> PortResult<ContentAddress>;

    async fn get(&self, address: &ContentAddress) -> PortResult<Vec<u8>>;

    async fn stat(&self, address: &ContentAddress) -> PortResult<ContentDescriptor>;
}

struct StoredBlob {
    bytes: Vec<u8>,
    descriptor: ContentDescriptor,
}

/// In-memory content store. Addresses are blake3-derived, so identical
/// content maps to the identical address, like a real CID.
pub struct MemoryContentStore {
    blobs: DashMap<String, StoredBlob>,
    put_count: AtomicU64,
    /// When non-zero, the next N put calls fail with `Unavailable`.
    fail_next_puts: AtomicU32,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self {
            blobs: DashMap::new(),
            put_count: AtomicU64::new(0),
            fail_next_puts: AtomicU32::new(0),
        }
    }

    /// Make the next `count` put calls fail, for retry/backoff tests.
    pub fn fail_next_puts(&self, count: u32) {
        self.fail_next_puts.store(count, Ordering::SeqCst);
    }

    pub fn put_count(&self) -> u64 {
        self.put_count.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    fn derive_address(bytes: &[u8], namespace: &str) -> ContentAddress {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"qinfinity-content-address-v1:");
        hasher.update(namespace.as_bytes());
        hasher.update(bytes);
        ContentAddress::new(format!("bafy{}", hasher.finalize().to_hex()))
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStoragePort for MemoryContentStore {
    async fn put(&self, bytes: &[u8], name: &str, namespace: &str) -> PortResult<ContentAddress> {
        self.put_count.fetch_add(1, Ordering::SeqCst);

        let pending_failures = self.fail_next_puts.load(Ordering::SeqCst);
        if pending_failures > 0 {
            self.fail_next_puts.store(pending_failures - 1, Ordering::SeqCst);
            return Err(PortError::Unavailable("content store injected failure".into()));
        }

        let address = Self::derive_address(bytes, namespace);
        let descriptor = ContentDescriptor {
            address: address.clone(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            size_bytes: bytes.len() as u64,
            stored_at_ms: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
        };
        self.blobs.insert(
            address.as_str().to_string(),
            StoredBlob {
                bytes: bytes.to_vec(),
                descriptor,
            },
        );
        Ok(address)
    }

    async fn get(&self, address: &ContentAddress) -> PortResult<Vec<u8>> {
        self.blobs
            .get(address.as_str())
            .map(|blob| blob.bytes.clone())
            .ok_or_else(|| PortError::NotFound(address.to_string()))
    }

    async fn stat(&self, address: &ContentAddress) -> PortResult<ContentDescriptor> {
        self.blobs
            .get(address.as_str())
            .map(|blob| blob.descriptor.clone())
            .ok_or_else(|| PortError::NotFound(address.to_string()))
    }
}
