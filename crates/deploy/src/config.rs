//! Persistent configuration for a deployment target.
//!
//! Saved as `Chainplan.toml` next to the output data, so a target can be
//! initialized once and every later command picks up the same endpoint,
//! sender and directories.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::registry::checksum_addr;
use crate::verify::VerifierConfig;

/// Default configuration filename.
pub const CONF_FILENAME: &str = "Chainplan.toml";

fn default_confirmation_timeout_secs() -> u64 {
    60
}

/// Configuration of one deployment target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// JSON-RPC endpoint of the target node.
    pub rpc_url: Url,
    /// Account submitting transactions; the node must be able to sign for it.
    #[serde(with = "checksum_addr")]
    pub sender: Address,
    /// Directory holding compiled contract artifacts (`<name>.json`).
    pub artifacts_dir: PathBuf,
    /// Directory for registry output, checkpoints and mock token records.
    pub outdata: PathBuf,
    /// How long to wait for a transaction to be confirmed.
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    /// Optional source-verification endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier: Option<VerifierConfig>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            rpc_url: Url::parse("http://127.0.0.1:8545").expect("valid default url"),
            // Anvil/Hardhat development account 0.
            sender: Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
                .expect("valid default sender"),
            artifacts_dir: PathBuf::from("artifacts"),
            outdata: PathBuf::from("out"),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            verifier: None,
        }
    }
}

impl DeployConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    /// Save the configuration as TOML.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration to {}", path.display()))?;
        Ok(())
    }

    /// Load the configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Configuration file does not exist: {}; run `init` first",
                path.display()
            );
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file {}", path.display()))
    }
}
