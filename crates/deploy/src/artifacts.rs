//! Compiled contract artifacts: ABI, deployment bytecode and library linking.

use std::collections::BTreeMap;
use std::path::PathBuf;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// A single library placeholder location in the bytecode, in bytes.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LinkOffset {
    pub start: usize,
    pub length: usize,
}

/// A compiler output artifact for one library or contract.
///
/// The shape matches the standard Hardhat/solc artifact JSON: `abi`,
/// 0x-prefixed `bytecode`, and `linkReferences` mapping source file to
/// library name to byte offsets of the 20-byte address placeholders.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    pub abi: Vec<Value>,
    pub bytecode: String,
    #[serde(default)]
    pub link_references: BTreeMap<String, BTreeMap<String, Vec<LinkOffset>>>,
}

impl ContractArtifact {
    /// The parameter types of the constructor, in declaration order.
    ///
    /// Empty when the contract has no explicit constructor.
    pub fn constructor_inputs(&self) -> Vec<String> {
        self.abi
            .iter()
            .find(|entry| entry.get("type").and_then(Value::as_str) == Some("constructor"))
            .and_then(|ctor| ctor.get("inputs"))
            .and_then(Value::as_array)
            .map(|inputs| {
                inputs
                    .iter()
                    .filter_map(|input| input.get("type").and_then(Value::as_str))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the bytecode references any libraries that must be linked.
    pub fn needs_linking(&self) -> bool {
        self.link_references.values().any(|libs| !libs.is_empty())
    }

    /// Bind the bytecode to the addresses of already-deployed libraries.
    ///
    /// Every `linkReferences` entry must resolve to an address in
    /// `libraries`; a missing one is an error naming the library. Returns the
    /// fully linked 0x-prefixed bytecode.
    pub fn link(&self, libraries: &BTreeMap<String, Address>) -> Result<String> {
        let mut bytecode = self.bytecode.trim_start_matches("0x").to_string();

        for (file, libs) in &self.link_references {
            for (lib_name, offsets) in libs {
                let address = libraries.get(lib_name).with_context(|| {
                    format!(
                        "Cannot link {}: library {} (from {}) is not deployed",
                        self.contract_name, lib_name, file
                    )
                })?;
                let address_hex = hex::encode(address.as_slice());

                for offset in offsets {
                    let start = offset.start * 2;
                    let end = start + offset.length * 2;
                    if offset.length != 20 || end > bytecode.len() {
                        anyhow::bail!(
                            "Invalid link reference for {} in {}: start={} length={}",
                            lib_name,
                            self.contract_name,
                            offset.start,
                            offset.length
                        );
                    }
                    bytecode.replace_range(start..end, &address_hex);
                }
            }
        }

        // Solc placeholders look like __$<hash>$__; any survivor means the
        // artifact declares a library the plan did not.
        if bytecode.contains("__") {
            anyhow::bail!(
                "Bytecode for {} still contains unlinked library placeholders",
                self.contract_name
            );
        }

        Ok(format!("0x{}", bytecode))
    }
}

/// Loads artifacts by component name from a build output directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Load the artifact for a named component (`<dir>/<name>.json`).
    pub fn load(&self, name: &str) -> Result<ContractArtifact> {
        let path = self.dir.join(format!("{}.json", name));
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn artifact(bytecode: &str, link_refs: Value) -> ContractArtifact {
        serde_json::from_value(serde_json::json!({
            "contractName": "Sample",
            "abi": [
                {
                    "type": "constructor",
                    "inputs": [
                        {"name": "registry", "type": "address"},
                        {"name": "uri", "type": "string"}
                    ]
                }
            ],
            "bytecode": bytecode,
            "linkReferences": link_refs,
        }))
        .unwrap()
    }

    #[test]
    fn test_constructor_inputs() {
        let a = artifact("0x00", serde_json::json!({}));
        assert_eq!(a.constructor_inputs(), vec!["address", "string"]);
    }

    #[test]
    fn test_constructor_inputs_absent() {
        let a: ContractArtifact = serde_json::from_value(serde_json::json!({
            "contractName": "NoCtor",
            "abi": [],
            "bytecode": "0x6080",
        }))
        .unwrap();
        assert!(a.constructor_inputs().is_empty());
        assert!(!a.needs_linking());
    }

    #[test]
    fn test_link_replaces_placeholder() {
        // 2 bytes of prefix, a 20-byte placeholder region, 2 bytes of suffix.
        let bytecode = format!("0x6080{}6081", "00".repeat(20));
        let a = artifact(
            &bytecode,
            serde_json::json!({
                "contracts/Errors.sol": {
                    "Errors": [{"start": 2, "length": 20}]
                }
            }),
        );

        let lib = Address::from_str("0x5FbDB2315678afecb367f032d93F642f64180aa3").unwrap();
        let mut libraries = BTreeMap::new();
        libraries.insert("Errors".to_string(), lib);

        let linked = a.link(&libraries).unwrap();
        assert_eq!(
            linked,
            format!("0x6080{}6081", "5fbdb2315678afecb367f032d93f642f64180aa3")
        );
    }

    #[test]
    fn test_link_missing_library() {
        let bytecode = format!("0x6080{}6081", "00".repeat(20));
        let a = artifact(
            &bytecode,
            serde_json::json!({
                "contracts/Errors.sol": {
                    "Errors": [{"start": 2, "length": 20}]
                }
            }),
        );

        let err = a.link(&BTreeMap::new()).unwrap_err();
        assert!(err.to_string().contains("Errors"));
        assert!(err.to_string().contains("not deployed"));
    }

    #[test]
    fn test_link_rejects_leftover_placeholder() {
        let a = artifact(
            "0x6080__$f00dbabef00dbabef00dbabef00dbabef0$__",
            serde_json::json!({}),
        );
        let err = a.link(&BTreeMap::new()).unwrap_err();
        assert!(err.to_string().contains("unlinked"));
    }

    #[test]
    fn test_artifact_store_load() {
        let dir = tempdir::TempDir::new("artifacts").unwrap();
        let path = dir.path().join("Errors.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "contractName": "Errors",
                "abi": [],
                "bytecode": "0x6080",
            })
            .to_string(),
        )
        .unwrap();

        let store = ArtifactStore::new(dir.path().to_path_buf());
        let artifact = store.load("Errors").unwrap();
        assert_eq!(artifact.contract_name, "Errors");
        assert!(store.load("Missing").is_err());
    }
}
