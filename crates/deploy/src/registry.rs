//! Durable artifact registry: component name to deployed address.
//!
//! The registry is the local record of irreversible on-chain deployments, so
//! every write goes through an atomic write-temp-then-rename and the
//! orchestrator flushes it after each successful unit. Three documents are
//! kept under the output directory: `libraries.json`, `contracts.json` and
//! the merged `all.json` view consumed by verification and downstream flows.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::plan::UnitKind;

/// Serde helpers serializing addresses checksum-cased.
pub mod checksum_addr {
    use super::*;
    use serde::{Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&address.to_checksum(None))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// One recorded deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    #[serde(with = "checksum_addr")]
    pub address: Address,
    /// Constructor arguments as recorded at deploy time, with address
    /// references already resolved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
    /// Unix timestamp of the deployment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_at: Option<u64>,
}

/// Append-mostly mapping of deployed libraries and contracts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRegistry {
    #[serde(default)]
    pub libraries: BTreeMap<String, RegistryEntry>,
    #[serde(default)]
    pub contracts: BTreeMap<String, RegistryEntry>,
}

/// The flattened `{contracts, libraries}` view persisted as `all.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombinedView {
    pub contracts: BTreeMap<String, String>,
    pub libraries: BTreeMap<String, String>,
}

impl ArtifactRegistry {
    fn partition(&self, kind: UnitKind) -> &BTreeMap<String, RegistryEntry> {
        match kind {
            UnitKind::Library => &self.libraries,
            UnitKind::Contract => &self.contracts,
        }
    }

    /// Record a deployment. Re-recording the same name with the same address
    /// is a no-op (returns false); a different address is an error, since
    /// addresses are immutable once assigned.
    pub fn record(
        &mut self,
        kind: UnitKind,
        name: &str,
        address: Address,
        args: Vec<Value>,
    ) -> Result<bool> {
        let partition = match kind {
            UnitKind::Library => &mut self.libraries,
            UnitKind::Contract => &mut self.contracts,
        };

        if let Some(existing) = partition.get(name) {
            if existing.address == address {
                return Ok(false);
            }
            anyhow::bail!(
                "{} {} is already recorded at {}; refusing to overwrite with {}",
                kind,
                name,
                existing.address.to_checksum(None),
                address.to_checksum(None)
            );
        }

        let deployed_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs());

        partition.insert(
            name.to_string(),
            RegistryEntry {
                address,
                args,
                deployed_at,
            },
        );
        Ok(true)
    }

    /// Whether a unit of the given kind is already recorded.
    pub fn is_deployed(&self, kind: UnitKind, name: &str) -> bool {
        self.partition(kind).contains_key(name)
    }

    pub fn address_of(&self, kind: UnitKind, name: &str) -> Option<Address> {
        self.partition(kind).get(name).map(|e| e.address)
    }

    /// Resolve a name to a deployed address, checking contracts first and
    /// libraries second.
    pub fn lookup(&self, name: &str) -> Option<Address> {
        self.contracts
            .get(name)
            .or_else(|| self.libraries.get(name))
            .map(|e| e.address)
    }

    /// The flattened combined view of all recorded addresses.
    pub fn merged(&self) -> CombinedView {
        let flatten = |m: &BTreeMap<String, RegistryEntry>| {
            m.iter()
                .map(|(name, entry)| (name.clone(), entry.address.to_checksum(None)))
                .collect()
        };
        CombinedView {
            contracts: flatten(&self.contracts),
            libraries: flatten(&self.libraries),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty() && self.contracts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.libraries.len() + self.contracts.len()
    }
}

/// Filename of the libraries document.
pub const LIBRARIES_FILENAME: &str = "libraries.json";
/// Filename of the contracts document.
pub const CONTRACTS_FILENAME: &str = "contracts.json";
/// Filename of the merged document.
pub const MERGED_FILENAME: &str = "all.json";

/// Write a file atomically: write to a temp sibling, then rename over the
/// target so a crash mid-write never corrupts the previous good snapshot.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, contents)
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}

/// Durable storage for an [`ArtifactRegistry`] under one output directory.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    dir: PathBuf,
}

impl RegistryStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Load the registry from disk, or return an empty one when no prior
    /// snapshot exists.
    pub fn load(&self) -> Result<ArtifactRegistry> {
        let mut registry = ArtifactRegistry::default();
        registry.libraries = self.load_partition(LIBRARIES_FILENAME)?;
        registry.contracts = self.load_partition(CONTRACTS_FILENAME)?;
        Ok(registry)
    }

    fn load_partition(&self, filename: &str) -> Result<BTreeMap<String, RegistryEntry>> {
        let path = self.path(filename);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read registry from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse registry file {}", path.display()))
    }

    /// Persist the full registry: both partitions plus the merged view, each
    /// written atomically.
    pub fn save(&self, registry: &ArtifactRegistry) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create registry directory {}", self.dir.display()))?;

        let libraries = serde_json::to_string_pretty(&registry.libraries)
            .context("Failed to serialize libraries")?;
        let contracts = serde_json::to_string_pretty(&registry.contracts)
            .context("Failed to serialize contracts")?;
        let merged = serde_json::to_string_pretty(&registry.merged())
            .context("Failed to serialize merged registry view")?;

        write_atomic(&self.path(LIBRARIES_FILENAME), &libraries)?;
        write_atomic(&self.path(CONTRACTS_FILENAME), &contracts)?;
        write_atomic(&self.path(MERGED_FILENAME), &merged)?;

        tracing::debug!(dir = %self.dir.display(), entries = registry.len(), "Registry persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn addr(n: u8) -> Address {
        Address::with_last_byte(n)
    }

    #[test]
    fn test_record_and_lookup() {
        let mut registry = ArtifactRegistry::default();
        assert!(registry
            .record(UnitKind::Library, "Errors", addr(1), vec![])
            .unwrap());
        assert!(registry
            .record(UnitKind::Contract, "Registry", addr(2), vec![])
            .unwrap());

        assert!(registry.is_deployed(UnitKind::Library, "Errors"));
        assert!(!registry.is_deployed(UnitKind::Contract, "Errors"));
        assert_eq!(registry.lookup("Errors"), Some(addr(1)));
        assert_eq!(registry.lookup("Registry"), Some(addr(2)));
        assert_eq!(registry.lookup("Missing"), None);
    }

    #[test]
    fn test_record_idempotent_same_address() {
        let mut registry = ArtifactRegistry::default();
        registry
            .record(UnitKind::Library, "Errors", addr(1), vec![])
            .unwrap();
        // Same name, same address: a no-op.
        assert!(!registry
            .record(UnitKind::Library, "Errors", addr(1), vec![])
            .unwrap());
        assert_eq!(registry.libraries.len(), 1);
    }

    #[test]
    fn test_record_conflicting_address_is_error() {
        let mut registry = ArtifactRegistry::default();
        registry
            .record(UnitKind::Library, "Errors", addr(1), vec![])
            .unwrap();
        let err = registry
            .record(UnitKind::Library, "Errors", addr(2), vec![])
            .unwrap_err();
        assert!(err.to_string().contains("already recorded"));
    }

    #[test]
    fn test_merged_view_checksummed() {
        let mut registry = ArtifactRegistry::default();
        let address =
            Address::from_str("0x5fbdb2315678afecb367f032d93f642f64180aa3").unwrap();
        registry
            .record(UnitKind::Contract, "Registry", address, vec![])
            .unwrap();

        let merged = registry.merged();
        assert_eq!(
            merged.contracts["Registry"],
            "0x5FbDB2315678afecb367f032d93F642f64180aa3"
        );
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir::TempDir::new("registry").unwrap();
        let store = RegistryStore::new(dir.path().to_path_buf());

        let mut registry = store.load().unwrap();
        assert!(registry.is_empty());

        registry
            .record(
                UnitKind::Library,
                "Errors",
                addr(1),
                vec![],
            )
            .unwrap();
        registry
            .record(
                UnitKind::Contract,
                "LicenseRegistry",
                addr(2),
                vec![serde_json::json!("https://example.com/{id}.json")],
            )
            .unwrap();
        store.save(&registry).unwrap();

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded, registry);

        // Saving the reloaded registry is the identity on the stored data.
        store.save(&reloaded).unwrap();
        assert_eq!(store.load().unwrap(), registry);
    }

    #[test]
    fn test_merged_file_shape() {
        let dir = tempdir::TempDir::new("registry").unwrap();
        let store = RegistryStore::new(dir.path().to_path_buf());

        let mut registry = ArtifactRegistry::default();
        registry
            .record(UnitKind::Library, "Errors", addr(1), vec![])
            .unwrap();
        store.save(&registry).unwrap();

        let merged: Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join(MERGED_FILENAME)).unwrap(),
        )
        .unwrap();
        assert!(merged["libraries"]["Errors"].is_string());
        assert!(merged["contracts"].as_object().unwrap().is_empty());
    }
}
