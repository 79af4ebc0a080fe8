//! Sandbox step runner backed by the capability ports. Compression is a
//! local run-length codec; everything else delegates to crypto, content
//! storage, index, and audit ports.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use qinfinity_ports::{
    AuditEvent, AuditPort, ClockPort, ContentStoragePort, CryptoPort, EncryptionLevel,
    EncryptionMeta, IndexEntry, IndexPort,
};
use qinfinity_types::ContentAddress;

use crate::error::{PipelineError, PipelineResult};
use crate::step::{StepContext, StepKind, StepOutput, StepRunner};

const META_ALGORITHM: &str = "encryption.algorithm";
const META_NONCE: &str = "encryption.nonce";
const META_LEVEL: &str = "encryption.level";
const META_CIPHER_HASH: &str = "cipher.hash";
const META_STORE_ADDRESS: &str = "store.address";

pub struct SandboxStepRunner {
    crypto: Arc<dyn CryptoPort>,
    content: Arc<dyn ContentStoragePort>,
    index: Arc<dyn IndexPort>,
    audit: Arc<dyn AuditPort>,
    clock: Arc<dyn ClockPort>,
}

impl SandboxStepRunner {
    pub fn new(
        crypto: Arc<dyn CryptoPort>,
        content: Arc<dyn ContentStoragePort>,
        index: Arc<dyn IndexPort>,
        audit: Arc<dyn AuditPort>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            crypto,
            content,
            index,
            audit,
            clock,
        }
    }

    fn carried<'a>(
        context: &'a StepContext,
        step: StepKind,
        key: &str,
    ) -> PipelineResult<&'a str> {
        context
            .carried
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| PipelineError::MissingContext {
                step: step.as_str().into(),
                key: key.into(),
            })
    }

    fn encryption_level(context: &StepContext) -> EncryptionLevel {
        match context.options.get(META_LEVEL).map(String::as_str) {
            Some("standard") => EncryptionLevel::Standard,
            _ => EncryptionLevel::Quantum,
        }
    }

    async fn encrypt(&self, input: &[u8], context: &StepContext) -> PipelineResult<StepOutput> {
        let level = Self::encryption_level(context);
        let (cipher, meta) = self
            .crypto
            .encrypt(input, level, context.execution_id.as_str())
            .map_err(|e| PipelineError::StepFailed {
                step: "encrypt".into(),
                reason: e.to_string(),
            })?;

        let mut metadata = BTreeMap::new();
        metadata.insert(META_ALGORITHM.into(), meta.algorithm.clone());
        metadata.insert(META_NONCE.into(), hex(&meta.nonce));
        metadata.insert(META_LEVEL.into(), meta.level.as_str().into());
        metadata.insert(META_CIPHER_HASH.into(), hex(&self.crypto.hash(&cipher)));

        Ok(StepOutput {
            output: cipher,
            metadata,
        })
    }

    async fn decrypt(&self, input: &[u8], context: &StepContext) -> PipelineResult<StepOutput> {
        let algorithm = Self::carried(context, StepKind::Decrypt, META_ALGORITHM)?.to_string();
        let nonce_hex = Self::carried(context, StepKind::Decrypt, META_NONCE)?;
        let nonce = unhex32(nonce_hex).ok_or_else(|| PipelineError::StepFailed {
            step: "decrypt".into(),
            reason: "malformed nonce in carried metadata".into(),
        })?;
        let level = match Self::carried(context, StepKind::Decrypt, META_LEVEL)? {
            "standard" => EncryptionLevel::Standard,
            _ => EncryptionLevel::Quantum,
        };

        let meta = EncryptionMeta {
            algorithm,
            level,
            nonce,
            extra: BTreeMap::new(),
        };
        let plain = self
            .crypto
            .decrypt(input, &meta, context.execution_id.as_str())
            .map_err(|e| PipelineError::StepFailed {
                step: "decrypt".into(),
                reason: e.to_string(),
            })?;

        Ok(StepOutput {
            output: plain,
            metadata: BTreeMap::new(),
        })
    }

    async fn store(&self, input: &[u8], context: &StepContext) -> PipelineResult<StepOutput> {
        let address = self
            .content
            .put(input, context.execution_id.as_str(), "dataflow")
            .await
            .map_err(|e| PipelineError::StepFailed {
                step: "store".into(),
                reason: e.to_string(),
            })?;

        let mut metadata = BTreeMap::new();
        metadata.insert(META_STORE_ADDRESS.into(), address.as_str().into());

        Ok(StepOutput {
            output: address.as_str().as_bytes().to_vec(),
            metadata,
        })
    }

    async fn retrieve(&self, context: &StepContext) -> PipelineResult<StepOutput> {
        let address = Self::carried(context, StepKind::Retrieve, META_STORE_ADDRESS)?;
        let bytes = self
            .content
            .get(&ContentAddress::new(address))
            .await
            .map_err(|e| PipelineError::StepFailed {
                step: "retrieve".into(),
                reason: e.to_string(),
            })?;

        Ok(StepOutput {
            output: bytes,
            metadata: BTreeMap::new(),
        })
    }

    fn verify(&self, input: &[u8], context: &StepContext) -> PipelineResult<StepOutput> {
        let expected = Self::carried(context, StepKind::Verify, META_CIPHER_HASH)?;
        let actual = hex(&self.crypto.hash(input));
        if actual != expected {
            return Err(PipelineError::StepFailed {
                step: "verify".into(),
                reason: format!("retrieved content hash {actual} does not match recorded {expected}"),
            });
        }
        Ok(StepOutput::passthrough(input))
    }

    fn register_index(&self, input: &[u8], context: &StepContext) -> PipelineResult<StepOutput> {
        self.index
            .register(IndexEntry {
                key: format!("{}/cipher", context.execution_id.as_str()),
                content_hash: hex(&self.crypto.hash(input)),
                size_bytes: input.len() as u64,
                namespace: "dataflow".into(),
            })
            .map_err(|e| PipelineError::StepFailed {
                step: "index".into(),
                reason: e.to_string(),
            })?;
        Ok(StepOutput::passthrough(input))
    }

    fn record_audit(&self, input: &[u8], context: &StepContext) -> PipelineResult<StepOutput> {
        self.audit
            .record(AuditEvent {
                action: "dataflow.step".into(),
                actor: context.actor.clone(),
                resource: context.execution_id.to_string(),
                outcome: "ok".into(),
                error_kind: None,
                correlation_id: Some(context.execution_id.to_string()),
                timestamp_ms: self.clock.now_ms(),
            })
            .map_err(|e| PipelineError::StepFailed {
                step: "audit".into(),
                reason: e.to_string(),
            })?;
        Ok(StepOutput::passthrough(input))
    }
}

#[async_trait]
impl StepRunner for SandboxStepRunner {
    async fn run(
        &self,
        kind: StepKind,
        input: &[u8],
        context: &StepContext,
    ) -> PipelineResult<StepOutput> {
        match kind {
            StepKind::Compress => Ok(StepOutput {
                output: rle_encode(input),
                metadata: BTreeMap::new(),
            }),
            StepKind::Decompress => rle_decode(input)
                .map(|plain| StepOutput {
                    output: plain,
                    metadata: BTreeMap::new(),
                })
                .ok_or_else(|| PipelineError::StepFailed {
                    step: "decompress".into(),
                    reason: "malformed run-length stream".into(),
                }),
            StepKind::Encrypt => self.encrypt(input, context).await,
            StepKind::Decrypt => self.decrypt(input, context).await,
            StepKind::Index => self.register_index(input, context),
            StepKind::Audit => self.record_audit(input, context),
            StepKind::Store => self.store(input, context).await,
            StepKind::Retrieve => self.retrieve(context).await,
            StepKind::Verify => self.verify(input, context),
        }
    }
}

/// Run-length coding: pairs of (count, byte). Worst case doubles the
/// input, which is fine for a sandbox transformation that must be exactly
/// invertible.
fn rle_encode(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut iter = input.iter().peekable();
    while let Some(&byte) = iter.next() {
        let mut count: u8 = 1;
        while count < u8::MAX {
            match iter.peek() {
                Some(&&next) if next == byte => {
                    iter.next();
                    count += 1;
                }
                _ => break,
            }
        }
        out.push(count);
        out.push(byte);
    }
    out
}

fn rle_decode(input: &[u8]) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(input.len());
    for pair in input.chunks_exact(2) {
        if pair[0] == 0 {
            return None;
        }
        out.extend(std::iter::repeat(pair[1]).take(pair[0] as usize));
    }
    Some(out)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn unhex32(text: &str) -> Option<[u8; 32]> {
    if text.len() != 64 {
        return None;
    }
    let mut out = [0u8; 32];
    for (i, chunk) in out.iter_mut().enumerate() {
        *chunk = u8::from_str_radix(&text[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qinfinity_ports::{
        MemoryAuditTrail, MemoryContentStore, MemoryIndex, SandboxCrypto, SystemClock,
    };
    use qinfinity_types::{ExecutionId, IdentityRef};

    fn runner() -> SandboxStepRunner {
        SandboxStepRunner::new(
            Arc::new(SandboxCrypto::default()),
            Arc::new(MemoryContentStore::new()),
            Arc::new(MemoryIndex::new()),
            Arc::new(MemoryAuditTrail::new()),
            Arc::new(SystemClock),
        )
    }

    fn context() -> StepContext {
        StepContext::new(ExecutionId::new("flow-1"), IdentityRef::new("alice"))
    }

    #[test]
    fn rle_round_trips() {
        for payload in [
            b"".to_vec(),
            b"a".to_vec(),
            b"aaaabbbccd".to_vec(),
            vec![0u8; 1000],
            (0..=255u8).collect::<Vec<u8>>(),
        ] {
            assert_eq!(rle_decode(&rle_encode(&payload)).unwrap(), payload);
        }
    }

    #[test]
    fn rle_rejects_malformed_streams() {
        assert!(rle_decode(&[1]).is_none());
        assert!(rle_decode(&[0, 7]).is_none());
    }

    #[tokio::test]
    async fn encrypt_then_decrypt_through_carried_metadata() {
        let runner = runner();
        let mut context = context();

        let encrypted = runner
            .run(StepKind::Encrypt, b"payload", &context)
            .await
            .unwrap();
        context.carried.extend(encrypted.metadata.clone());

        let decrypted = runner
            .run(StepKind::Decrypt, &encrypted.output, &context)
            .await
            .unwrap();
        assert_eq!(decrypted.output, b"payload".to_vec());
    }

    #[tokio::test]
    async fn store_then_retrieve_through_carried_metadata() {
        let runner = runner();
        let mut context = context();

        let stored = runner.run(StepKind::Store, b"cipher", &context).await.unwrap();
        context.carried.extend(stored.metadata.clone());

        let retrieved = runner.run(StepKind::Retrieve, &[], &context).await.unwrap();
        assert_eq!(retrieved.output, b"cipher".to_vec());
    }

    #[tokio::test]
    async fn verify_detects_content_mismatch() {
        let runner = runner();
        let mut context = context();

        let encrypted = runner
            .run(StepKind::Encrypt, b"payload", &context)
            .await
            .unwrap();
        context.carried.extend(encrypted.metadata.clone());

        assert!(runner
            .run(StepKind::Verify, &encrypted.output, &context)
            .await
            .is_ok());
        assert!(runner
            .run(StepKind::Verify, b"tampered", &context)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn inverse_steps_without_carried_metadata_fail_validation() {
        let runner = runner();
        let context = context();

        let error = runner.run(StepKind::Retrieve, &[], &context).await.unwrap_err();
        assert!(matches!(error, PipelineError::MissingContext { .. }));
        assert_eq!(error.kind(), qinfinity_types::ErrorKind::Validation);
    }
}
