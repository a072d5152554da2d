//! Network state checkpoints over `evm_snapshot` / `evm_revert`.
//!
//! A checkpoint captures the chain state before a deployment run so it can be
//! rolled back in one step. Snapshot tokens are only meaningful on
//! development networks (Anvil, Hardhat, Ganache); the manager refuses to run
//! against anything else rather than failing obscurely later.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::provider::NetworkProvider;
use crate::registry::write_atomic;

/// Filename of the persisted checkpoint token.
pub const CHECKPOINT_FILENAME: &str = "checkpoint.json";

/// Client-version substrings identifying networks with snapshot support.
const DEV_NETWORK_MARKERS: &[&str] = &["anvil", "hardhat", "ganache"];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CheckpointFile {
    checkpoint: String,
}

/// Persists snapshot tokens and drives snapshot/revert against the node.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(CHECKPOINT_FILENAME)
    }

    /// Fail unless the node identifies as a development network.
    pub async fn ensure_supported<P: NetworkProvider>(provider: &P) -> Result<()> {
        let version = provider
            .client_version()
            .await
            .context("Failed to identify the target node")?;
        let lowered = version.to_lowercase();

        if !DEV_NETWORK_MARKERS.iter().any(|m| lowered.contains(m)) {
            anyhow::bail!(
                "Node '{}' does not support state snapshots; checkpoints require a development network (anvil, hardhat or ganache)",
                version
            );
        }
        Ok(())
    }

    /// Take a snapshot and persist its token, replacing any previous one.
    pub async fn snapshot<P: NetworkProvider>(&self, provider: &P) -> Result<String> {
        Self::ensure_supported(provider).await?;

        let token = provider.snapshot().await?;
        let file = CheckpointFile {
            checkpoint: token.clone(),
        };

        std::fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create checkpoint directory {}", self.dir.display())
        })?;
        let contents =
            serde_json::to_string_pretty(&file).context("Failed to serialize checkpoint")?;
        write_atomic(&self.path(), &contents)?;

        tracing::info!(token = %token, "Network checkpoint saved");
        Ok(token)
    }

    /// Revert the network to the persisted checkpoint.
    ///
    /// Snapshot tokens are single-use: on success the stored token is
    /// consumed and the file removed.
    pub async fn revert<P: NetworkProvider>(&self, provider: &P) -> Result<String> {
        Self::ensure_supported(provider).await?;

        let token = self
            .load_token()?
            .with_context(|| format!("No checkpoint found at {}", self.path().display()))?;

        let reverted = provider.revert(&token).await?;
        if !reverted {
            anyhow::bail!(
                "Node rejected snapshot token '{}'; it may already have been consumed",
                token
            );
        }

        std::fs::remove_file(self.path())
            .with_context(|| format!("Failed to remove {}", self.path().display()))?;

        tracing::info!(token = %token, "Network reverted to checkpoint");
        Ok(token)
    }

    /// Read the persisted token, if any.
    pub fn load_token(&self) -> Result<Option<String>> {
        load_token_from(&self.path())
    }
}

fn load_token_from(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read checkpoint from {}", path.display()))?;
    let file: CheckpointFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse checkpoint file {}", path.display()))?;
    Ok(Some(file.checkpoint))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_token_absent() {
        let dir = tempdir::TempDir::new("checkpoint").unwrap();
        let manager = CheckpointManager::new(dir.path().to_path_buf());
        assert_eq!(manager.load_token().unwrap(), None);
    }

    #[test]
    fn test_token_round_trip() {
        let dir = tempdir::TempDir::new("checkpoint").unwrap();
        let path = dir.path().join(CHECKPOINT_FILENAME);
        std::fs::write(&path, r#"{"checkpoint": "0x1"}"#).unwrap();

        let manager = CheckpointManager::new(dir.path().to_path_buf());
        assert_eq!(manager.load_token().unwrap(), Some("0x1".to_string()));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempdir::TempDir::new("checkpoint").unwrap();
        std::fs::write(dir.path().join(CHECKPOINT_FILENAME), "not json").unwrap();

        let manager = CheckpointManager::new(dir.path().to_path_buf());
        assert!(manager.load_token().is_err());
    }
}
