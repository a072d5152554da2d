//! chainplan is a CLI tool to deploy and manage a contract suite on a
//! development network.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;

use chainplan_deploy::provider::{eth_to_wei, format_ether};
use chainplan_deploy::verify::summary_table;
use chainplan_deploy::{
    ArtifactRegistry, ArtifactStore, CheckpointManager, DeployConfig, DeploymentPlan,
    HttpProvider, MockAssets, NetworkProvider, Orchestrator, RegistryStore, VerificationService,
};
use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    if let Command::Init = cli.command {
        let config = DeployConfig::default();
        config.save_to_file(&cli.config)?;
        tracing::info!(path = %cli.config.display(), "Wrote default configuration");
        return Ok(());
    }

    let config = DeployConfig::load_from_file(&cli.config)?;
    let provider = HttpProvider::new(config.rpc_url.clone())?;

    // Every remaining command talks to the node; fail early if it is down.
    chainplan_deploy::rpc::wait_until_ready(
        "JSON-RPC endpoint",
        std::time::Duration::from_secs(30),
        || async { provider.client_version().await.map(|_| ()) },
    )
    .await?;

    match cli.command {
        Command::Init => unreachable!("handled above"),

        Command::Fund {
            accounts,
            amount_eth,
        } => {
            let wei = eth_to_wei(amount_eth)?;
            let mut table = comfy_table::Table::new();
            table.set_header(vec!["Account", "Balance (ETH)"]);

            for account in accounts {
                provider.set_balance(account, wei).await?;
                let balance = provider.balance(account).await?;
                table.add_row(vec![account.to_checksum(None), format_ether(balance)]);
            }
            println!("{table}");
        }

        Command::Deploy {
            plan,
            snapshot,
            skip_verify,
        } => {
            if snapshot {
                let manager = CheckpointManager::new(config.outdata.clone());
                manager.snapshot(&provider).await?;
            }

            let mut plan = DeploymentPlan::load_from_file(&plan)?;
            let orchestrator = Orchestrator::new(
                &provider,
                ArtifactStore::new(config.artifacts_dir.clone()),
                RegistryStore::new(config.outdata.clone()),
                config.sender,
                config.confirmation_timeout(),
            );
            let registry = orchestrator.run(&mut plan).await?;
            println!("{}", registry_table(&registry));

            if !skip_verify {
                if let Some(verifier) = config.verifier.clone() {
                    let service = VerificationService::new(verifier)?;
                    let records = service.verify_all(&registry).await;
                    println!("{}", summary_table(&records));
                }
            }
        }

        Command::Verify => {
            let verifier = config
                .verifier
                .clone()
                .context("No [verifier] section in the configuration")?;
            let registry = RegistryStore::new(config.outdata.clone()).load()?;
            if registry.is_empty() {
                anyhow::bail!("Nothing to verify: the registry is empty");
            }

            let service = VerificationService::new(verifier)?;
            let records = service.verify_all(&registry).await;
            println!("{}", summary_table(&records));
        }

        Command::Snapshot => {
            let manager = CheckpointManager::new(config.outdata.clone());
            let token = manager.snapshot(&provider).await?;
            println!("Checkpoint saved: {token}");
        }

        Command::Revert => {
            let manager = CheckpointManager::new(config.outdata.clone());
            let token = manager.revert(&provider).await?;
            println!("Reverted to checkpoint: {token}");
        }

        Command::DeployMocks => {
            let mocks = mock_assets(&provider, &config);
            let tokens = mocks.deploy().await?;
            println!("MockToken: {}", tokens.token.to_checksum(None));
            println!("MockNFT:   {}", tokens.nft.to_checksum(None));
        }

        Command::MintMocks { recipient, amount } => {
            let mocks = mock_assets(&provider, &config);
            let tokens = mocks.load_tokens()?;

            let balance = mocks.mint_erc20(&tokens, recipient, amount).await?;
            let token_id = mocks.mint_erc721(&tokens, recipient).await?;

            println!("ERC20 balance of {}: {balance}", recipient.to_checksum(None));
            println!("Minted NFT token id: {token_id}");
        }
    }

    Ok(())
}

fn mock_assets<'a>(provider: &'a HttpProvider, config: &DeployConfig) -> MockAssets<'a, HttpProvider> {
    MockAssets::new(
        provider,
        ArtifactStore::new(config.artifacts_dir.clone()),
        config.sender,
        config.confirmation_timeout(),
        config.outdata.clone(),
    )
}

fn registry_table(registry: &ArtifactRegistry) -> comfy_table::Table {
    let mut table = comfy_table::Table::new();
    table.set_header(vec!["Kind", "Name", "Address"]);
    for (name, entry) in &registry.libraries {
        table.add_row(vec![
            "library".to_string(),
            name.clone(),
            entry.address.to_checksum(None),
        ]);
    }
    for (name, entry) in &registry.contracts {
        table.add_row(vec![
            "contract".to_string(),
            name.clone(),
            entry.address.to_checksum(None),
        ]);
    }
    table
}
