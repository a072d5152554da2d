//! chainplan-deploy - Contract suite deployment orchestration.
//!
//! This crate drives a declarative deployment plan (libraries and contracts,
//! with cross-references between them) onto a development network, keeping a
//! durable registry of deployed addresses so runs are resumable and
//! idempotent.

pub mod abi;
pub mod artifacts;
pub mod checkpoint;
pub mod config;
pub mod mock;
pub mod orchestrator;
pub mod plan;
pub mod provider;
pub mod registry;
pub mod rpc;
pub mod verify;

pub use artifacts::{ArtifactStore, ContractArtifact};
pub use checkpoint::CheckpointManager;
pub use config::DeployConfig;
pub use mock::{MockAssets, MockTokens};
pub use orchestrator::Orchestrator;
pub use plan::{ConstructorArg, DeploymentPlan, DeploymentUnit, UnitKind, UnitStatus};
pub use provider::{HttpProvider, NetworkProvider, TransactionReceipt, TransactionRequest};
pub use registry::{ArtifactRegistry, RegistryEntry, RegistryStore};
pub use verify::{VerificationOutcome, VerificationRecord, VerificationService, VerifierConfig};
