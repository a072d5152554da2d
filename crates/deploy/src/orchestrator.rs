//! Deployment orchestration: drive a plan onto the network, one unit at a
//! time.
//!
//! Units are submitted strictly sequentially in declaration order, libraries
//! first, so the sender's nonce advances deterministically and every address
//! a later unit references is already final. Each successful deployment is
//! recorded in the registry and flushed to disk before the next unit starts,
//! which makes an interrupted run resumable: re-running the same plan skips
//! anything already recorded without submitting a transaction.

use std::collections::BTreeMap;
use std::time::Duration;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use crate::abi::{self, ResolvedArg};
use crate::artifacts::{ArtifactStore, ContractArtifact};
use crate::plan::{ConstructorArg, DeploymentPlan, DeploymentUnit, UnitKind};
use crate::provider::{NetworkProvider, TransactionRequest, wait_for_receipt};
use crate::registry::{ArtifactRegistry, RegistryStore};

/// Submit deployment bytecode and wait for the created contract's address.
pub async fn deploy_bytecode<P: NetworkProvider>(
    provider: &P,
    sender: Address,
    data: String,
    timeout: Duration,
) -> Result<Address> {
    let tx = TransactionRequest::deployment(sender, data);
    let tx_hash = provider.send_transaction(&tx).await?;
    let receipt = wait_for_receipt(provider, &tx_hash, timeout).await?;

    receipt
        .contract_address
        .with_context(|| format!("Receipt for {} carries no contract address", tx_hash))
}

/// Drives a [`DeploymentPlan`] against a network, recording results in the
/// artifact registry.
pub struct Orchestrator<'a, P> {
    provider: &'a P,
    artifacts: ArtifactStore,
    store: RegistryStore,
    sender: Address,
    confirmation_timeout: Duration,
}

impl<'a, P: NetworkProvider> Orchestrator<'a, P> {
    pub fn new(
        provider: &'a P,
        artifacts: ArtifactStore,
        store: RegistryStore,
        sender: Address,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            artifacts,
            store,
            sender,
            confirmation_timeout,
        }
    }

    /// Execute the plan. Libraries deploy before contracts; within each
    /// phase, declaration order is preserved. The first failure aborts the
    /// run, leaving everything recorded so far on disk.
    pub async fn run(&self, plan: &mut DeploymentPlan) -> Result<ArtifactRegistry> {
        plan.validate()?;

        let mut registry = self.store.load()?;

        for kind in [UnitKind::Library, UnitKind::Contract] {
            for unit in plan.units.iter_mut().filter(|u| u.kind == kind) {
                if let Err(err) = self.deploy_unit(unit, &mut registry).await {
                    unit.mark_failed();
                    return Err(err.context(format!("Deployment of {} {} failed", kind, unit.name)));
                }
            }
        }

        info!(
            libraries = registry.libraries.len(),
            contracts = registry.contracts.len(),
            "Deployment plan complete"
        );
        Ok(registry)
    }

    async fn deploy_unit(
        &self,
        unit: &mut DeploymentUnit,
        registry: &mut ArtifactRegistry,
    ) -> Result<()> {
        if let Some(address) = registry.address_of(unit.kind, &unit.name) {
            info!(
                name = %unit.name,
                address = %address.to_checksum(None),
                "Already deployed, skipping"
            );
            return unit.mark_deployed(address);
        }

        let artifact = self.artifacts.load(&unit.name)?;

        // Resolve every dependency before submitting anything, so a broken
        // plan fails without burning a nonce.
        let libraries = self.resolve_libraries(unit, registry)?;
        let args = self.resolve_args(unit, &artifact, registry)?;

        let mut data = artifact.link(&libraries)?;
        if !args.is_empty() {
            let encoded = abi::encode_args(&artifact.constructor_inputs(), &args)
                .with_context(|| format!("Failed to encode constructor arguments for {}", unit.name))?;
            data.push_str(&hex::encode(encoded));
        }

        info!(name = %unit.name, kind = %unit.kind, "Deploying");
        let address =
            deploy_bytecode(self.provider, self.sender, data, self.confirmation_timeout).await?;

        let recorded_args: Vec<Value> = args.iter().map(ResolvedArg::to_json).collect();
        registry.record(unit.kind, &unit.name, address, recorded_args)?;
        self.store.save(registry)?;
        unit.mark_deployed(address)?;

        info!(
            name = %unit.name,
            address = %address.to_checksum(None),
            "Deployed"
        );
        Ok(())
    }

    /// Map the unit's declared libraries to their deployed addresses.
    fn resolve_libraries(
        &self,
        unit: &DeploymentUnit,
        registry: &ArtifactRegistry,
    ) -> Result<BTreeMap<String, Address>> {
        let mut resolved = BTreeMap::new();
        for lib_name in &unit.libraries {
            let address = registry
                .address_of(UnitKind::Library, lib_name)
                .with_context(|| {
                    format!(
                        "{} depends on library {}, which is not deployed; \
                         declare it earlier in the plan",
                        unit.name, lib_name
                    )
                })?;
            resolved.insert(lib_name.clone(), address);
        }
        Ok(resolved)
    }

    /// Resolve the unit's constructor arguments against the artifact's
    /// constructor signature and the registry.
    fn resolve_args(
        &self,
        unit: &DeploymentUnit,
        artifact: &ContractArtifact,
        registry: &ArtifactRegistry,
    ) -> Result<Vec<ResolvedArg>> {
        let param_types = artifact.constructor_inputs();
        if param_types.len() != unit.args.len() {
            anyhow::bail!(
                "{} constructor expects {} argument(s), plan provides {}",
                unit.name,
                param_types.len(),
                unit.args.len()
            );
        }

        unit.args
            .iter()
            .zip(&param_types)
            .map(|(arg, param_type)| match arg {
                ConstructorArg::Ref { target } => {
                    let address = registry.lookup(target).with_context(|| {
                        format!(
                            "{} references {}, which is not deployed; \
                             declare it earlier in the plan",
                            unit.name, target
                        )
                    })?;
                    if param_type != "address" {
                        anyhow::bail!(
                            "{} passes a reference to {} for parameter type '{}'",
                            unit.name,
                            target,
                            param_type
                        );
                    }
                    Ok(ResolvedArg::Address(address))
                }
                ConstructorArg::Literal(value) => abi::resolve_literal(param_type, value)
                    .with_context(|| format!("Invalid constructor argument for {}", unit.name)),
            })
            .collect()
    }
}
