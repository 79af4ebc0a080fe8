//! Eventual publication of ledger records to content-addressed storage.
//!
//! Publication never fails an append: each attempt is raced against a
//! bounded timeout, retried with exponential backoff, and on exhaustion a
//! mock fallback address derived from the record hash is assigned with
//! `published = false`.

use std::sync::Arc;
use std::time::Duration;

use qinfinity_ports::ContentStoragePort;
use qinfinity_types::ContentAddress;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct PublicationPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub attempt_timeout: Duration,
    pub namespace: String,
}

impl Default for PublicationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(50),
            attempt_timeout: Duration::from_secs(2),
            namespace: "ledger".into(),
        }
    }
}

/// Fallback address when the external store stays unavailable.
pub(crate) fn mock_address(record_hash: &[u8; 32]) -> ContentAddress {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"qinfinity-ledger-mock-cid-v1:");
    hasher.update(record_hash);
    ContentAddress::new(format!("mock-bafy{}", hasher.finalize().to_hex()))
}

/// Returns `(address, published)`; `published` is false when every attempt
/// failed and the address is the mock fallback.
pub(crate) async fn publish_with_retry(
    storage: Arc<dyn ContentStoragePort>,
    bytes: Vec<u8>,
    name: String,
    record_hash: [u8; 32],
    policy: PublicationPolicy,
) -> (ContentAddress, bool) {
    let mut delay = policy.base_delay;

    for attempt in 1..=policy.max_attempts.max(1) {
        let outcome = tokio::time::timeout(
            policy.attempt_timeout,
            storage.put(&bytes, &name, &policy.namespace),
        )
        .await;

        match outcome {
            Ok(Ok(address)) => {
                debug!(name = %name, attempt, address = %address, "ledger record published");
                return (address, true);
            }
            Ok(Err(error)) => {
                warn!(name = %name, attempt, %error, "ledger publication attempt failed");
            }
            Err(_) => {
                warn!(name = %name, attempt, "ledger publication attempt timed out");
            }
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }

    warn!(name = %name, "ledger publication exhausted retries, assigning mock address");
    (mock_address(&record_hash), false)
}
