//! JSON artifact persistence under a stable `artifacts/` namespace
//! subdivided by domain (attestation, consensus, performance, stress).

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{PortError, PortResult};

pub struct ArtifactStore {
    base: PathBuf,
}

impl ArtifactStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Store under `./artifacts` relative to the working directory.
    pub fn default_root() -> Self {
        Self::new("artifacts")
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn path_for(&self, domain: &str, name: &str) -> PathBuf {
        self.base.join(domain).join(format!("{name}.json"))
    }

    pub fn save<T: Serialize>(&self, domain: &str, name: &str, value: &T) -> PortResult<PathBuf> {
        let dir = self.base.join(domain);
        std::fs::create_dir_all(&dir).map_err(|e| PortError::Io(e.to_string()))?;

        let path = self.path_for(domain, name);
        let json =
            serde_json::to_vec_pretty(value).map_err(|e| PortError::Serialization(e.to_string()))?;
        std::fs::write(&path, json).map_err(|e| PortError::Io(e.to_string()))?;

        debug!(path = %path.display(), "artifact saved");
        Ok(path)
    }

    pub fn load<T: DeserializeOwned>(&self, domain: &str, name: &str) -> PortResult<T> {
        let path = self.path_for(domain, name);
        let bytes = std::fs::read(&path)
            .map_err(|_| PortError::NotFound(path.display().to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| PortError::Serialization(e.to_string()))
    }

    pub fn exists(&self, domain: &str, name: &str) -> bool {
        self.path_for(domain, name).exists()
    }
}
