//! Deployment plans: the ordered declaration of libraries and contracts.
//!
//! A plan is authored externally (TOML) and lists every deployable unit in
//! the order it must be submitted. The orchestrator does not reorder units;
//! it validates at deploy time that every dependency is already deployed and
//! fails fast otherwise.

use std::collections::BTreeSet;
use std::path::Path;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Whether a unit is a shared library or a contract.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Library,
    Contract,
}

/// Lifecycle state of a unit within a single orchestrator run.
///
/// Pending -> Deployed exactly once, or Pending -> Failed; never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitStatus {
    #[default]
    Pending,
    Deployed,
    Failed,
}

/// One constructor argument: either a literal value or a reference that
/// resolves to another unit's deployed address at deploy time.
///
/// In TOML a reference is written as an inline table: `{ ref = "Errors" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstructorArg {
    Ref {
        #[serde(rename = "ref")]
        target: String,
    },
    Literal(serde_json::Value),
}

/// One library or contract to be deployed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentUnit {
    /// Unique identifier, also the artifact name and cross-reference key.
    pub name: String,
    pub kind: UnitKind,
    /// Names of library units this unit links against.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<String>,
    /// Constructor arguments, in ABI order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<ConstructorArg>,

    #[serde(skip)]
    pub status: UnitStatus,
    #[serde(skip)]
    pub address: Option<Address>,
}

impl DeploymentUnit {
    pub fn library(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: UnitKind::Library,
            libraries: Vec::new(),
            args: Vec::new(),
            status: UnitStatus::default(),
            address: None,
        }
    }

    pub fn contract(name: impl Into<String>) -> Self {
        Self {
            kind: UnitKind::Contract,
            ..Self::library(name)
        }
    }

    pub fn with_libraries(mut self, libraries: &[&str]) -> Self {
        self.libraries = libraries.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_args(mut self, args: Vec<ConstructorArg>) -> Self {
        self.args = args;
        self
    }

    /// Record the deployed address. The transition is one-shot: a unit that
    /// already left Pending cannot be deployed again.
    pub fn mark_deployed(&mut self, address: Address) -> Result<()> {
        if self.status != UnitStatus::Pending {
            anyhow::bail!(
                "Unit {} already transitioned out of Pending ({:?})",
                self.name,
                self.status
            );
        }
        self.status = UnitStatus::Deployed;
        self.address = Some(address);
        Ok(())
    }

    pub fn mark_failed(&mut self) {
        self.status = UnitStatus::Failed;
    }
}

/// A fixed, ordered declaration of deployment units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentPlan {
    #[serde(rename = "unit")]
    pub units: Vec<DeploymentUnit>,
}

impl DeploymentPlan {
    pub fn new(units: Vec<DeploymentUnit>) -> Self {
        Self { units }
    }

    /// Load a plan from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read deployment plan from {}", path.display()))?;
        let plan: Self =
            toml::from_str(&content).context("Failed to parse deployment plan as TOML")?;
        plan.validate()?;
        Ok(plan)
    }

    /// Structural validation: unique names, no self-references.
    ///
    /// Dependency ordering is deliberately not checked here; the orchestrator
    /// validates it against the registry as each unit comes up, so that a
    /// resumed run can satisfy dependencies from prior deployments.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for unit in &self.units {
            if !seen.insert(unit.name.as_str()) {
                anyhow::bail!("Duplicate unit name '{}' in deployment plan", unit.name);
            }
            if unit.libraries.iter().any(|l| l == &unit.name) {
                anyhow::bail!("Unit '{}' lists itself as a library dependency", unit.name);
            }
            if unit.args.iter().any(
                |a| matches!(a, ConstructorArg::Ref { target } if target == &unit.name),
            ) {
                anyhow::bail!("Unit '{}' references its own address", unit.name);
            }
            if unit.kind == UnitKind::Library && !unit.args.is_empty() {
                anyhow::bail!(
                    "Library '{}' declares constructor arguments; libraries take none",
                    unit.name
                );
            }
        }
        Ok(())
    }

    pub fn libraries(&self) -> impl Iterator<Item = &DeploymentUnit> {
        self.units.iter().filter(|u| u.kind == UnitKind::Library)
    }

    pub fn contracts(&self) -> impl Iterator<Item = &DeploymentUnit> {
        self.units.iter().filter(|u| u.kind == UnitKind::Contract)
    }
}
