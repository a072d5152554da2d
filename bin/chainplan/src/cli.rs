use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "chainplan")]
#[command(
    author,
    version,
    about = "Deploy and manage a contract suite on a development network"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "CHAINPLAN_VERBOSITY", default_value_t = LevelFilter::INFO, global = true)]
    pub verbosity: LevelFilter,

    /// Path to the Chainplan.toml configuration file.
    #[arg(long, alias = "conf", env = "CHAINPLAN_CONFIG", default_value = "Chainplan.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a default Chainplan.toml to the configured path.
    Init,

    /// Fund development accounts with ETH via the node's balance override.
    Fund {
        /// Accounts to fund.
        #[arg(required = true)]
        accounts: Vec<Address>,

        /// Amount of ETH to set each account's balance to.
        #[arg(long, default_value_t = 10_000.0)]
        amount_eth: f64,
    },

    /// Deploy a plan of libraries and contracts.
    Deploy {
        /// Path to the deployment plan (TOML).
        #[arg(long, default_value = "plan.toml")]
        plan: PathBuf,

        /// Take a network checkpoint before deploying.
        #[arg(long)]
        snapshot: bool,

        /// Skip the post-deployment verification phase.
        #[arg(long)]
        skip_verify: bool,
    },

    /// Verify already-deployed contracts against the configured verifier.
    Verify,

    /// Take a network checkpoint and persist its token.
    Snapshot,

    /// Revert the network to the persisted checkpoint.
    Revert,

    /// Deploy the mock ERC20/ERC721 asset pair.
    DeployMocks,

    /// Mint mock assets to a recipient.
    MintMocks {
        /// Recipient of the minted assets.
        #[arg(long)]
        recipient: Address,

        /// Amount of mock ERC20 tokens to mint (whole tokens).
        #[arg(long, default_value_t = 100)]
        amount: u64,
    },
}
