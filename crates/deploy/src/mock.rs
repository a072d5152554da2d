//! Mock asset provisioning for development networks.
//!
//! Deploys a mock ERC20 and ERC721 pair and exposes mint helpers so local
//! integration flows have assets to work with. Token addresses are persisted
//! to `mock/tokens.json` under the output directory.

use std::path::PathBuf;
use std::time::Duration;

use alloy_core::primitives::{Address, U256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::abi::{self, ResolvedArg};
use crate::artifacts::ArtifactStore;
use crate::orchestrator::deploy_bytecode;
use crate::provider::{NetworkProvider, TransactionRequest, wait_for_receipt};
use crate::registry::{checksum_addr, write_atomic};
use crate::rpc;

/// Artifact name of the mock fungible token.
pub const MOCK_ERC20: &str = "MockERC20";
/// Artifact name of the mock NFT.
pub const MOCK_ERC721: &str = "MockERC721";

/// Filename of the persisted token addresses, under the `mock/` subdirectory.
pub const TOKENS_FILENAME: &str = "tokens.json";

// Function selectors: first four bytes of keccak256 of the signature.
const SELECTOR_DECIMALS: &str = "313ce567"; // decimals()
const SELECTOR_MINT_ERC20: &str = "40c10f19"; // mint(address,uint256)
const SELECTOR_MINT_ERC721: &str = "6a627842"; // mint(address)
const SELECTOR_BALANCE_OF: &str = "70a08231"; // balanceOf(address)

/// Deployed mock token addresses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MockTokens {
    #[serde(rename = "MockToken", with = "checksum_addr")]
    pub token: Address,
    #[serde(rename = "MockNFT", with = "checksum_addr")]
    pub nft: Address,
}

/// Deploys and operates the mock asset pair.
pub struct MockAssets<'a, P> {
    provider: &'a P,
    artifacts: ArtifactStore,
    sender: Address,
    confirmation_timeout: Duration,
    outdata: PathBuf,
}

impl<'a, P: NetworkProvider> MockAssets<'a, P> {
    pub fn new(
        provider: &'a P,
        artifacts: ArtifactStore,
        sender: Address,
        confirmation_timeout: Duration,
        outdata: PathBuf,
    ) -> Self {
        Self {
            provider,
            artifacts,
            sender,
            confirmation_timeout,
            outdata,
        }
    }

    fn tokens_path(&self) -> PathBuf {
        self.outdata.join("mock").join(TOKENS_FILENAME)
    }

    /// Deploy both mock tokens and persist their addresses.
    pub async fn deploy(&self) -> Result<MockTokens> {
        let token = self.deploy_one(MOCK_ERC20).await?;
        let nft = self.deploy_one(MOCK_ERC721).await?;

        let tokens = MockTokens { token, nft };
        let path = self.tokens_path();
        let parent = path.parent().context("Token record path has no parent")?;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
        let contents =
            serde_json::to_string_pretty(&tokens).context("Failed to serialize token addresses")?;
        write_atomic(&path, &contents)?;

        info!(
            token = %token.to_checksum(None),
            nft = %nft.to_checksum(None),
            "Mock assets deployed"
        );
        Ok(tokens)
    }

    async fn deploy_one(&self, name: &str) -> Result<Address> {
        let artifact = self.artifacts.load(name)?;
        let data = artifact.link(&Default::default())?;
        deploy_bytecode(self.provider, self.sender, data, self.confirmation_timeout).await
    }

    /// Load previously persisted token addresses.
    pub fn load_tokens(&self) -> Result<MockTokens> {
        let path = self.tokens_path();
        let content = std::fs::read_to_string(&path).with_context(|| {
            format!(
                "No mock tokens found at {}; deploy the mocks first",
                path.display()
            )
        })?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Mint `amount` whole tokens (scaled by the token's decimals) to the
    /// recipient. Returns the recipient's resulting balance in base units.
    pub async fn mint_erc20(
        &self,
        tokens: &MockTokens,
        recipient: Address,
        amount: u64,
    ) -> Result<U256> {
        let decimals = self.decimals(tokens.token).await?;
        let scaled = U256::from(amount)
            .checked_mul(U256::from(10u64).pow(U256::from(decimals)))
            .context("Mint amount overflows")?;

        let calldata = abi::encode_call(
            SELECTOR_MINT_ERC20,
            &["address".to_string(), "uint256".to_string()],
            &[ResolvedArg::Address(recipient), ResolvedArg::Uint(scaled)],
        )?;
        self.submit(tokens.token, calldata).await?;

        let balance = self.balance_of(tokens.token, recipient).await?;
        info!(
            recipient = %recipient.to_checksum(None),
            amount,
            balance = %balance,
            "Minted mock ERC20"
        );
        Ok(balance)
    }

    /// Mint one NFT to the recipient, returning the minted token id.
    ///
    /// The id is read from the Transfer event of the mint transaction: the
    /// fourth topic of the first log.
    pub async fn mint_erc721(&self, tokens: &MockTokens, recipient: Address) -> Result<U256> {
        let calldata = abi::encode_call(
            SELECTOR_MINT_ERC721,
            &["address".to_string()],
            &[ResolvedArg::Address(recipient)],
        )?;
        let receipt = self.submit(tokens.nft, calldata).await?;

        let topic = receipt
            .logs
            .first()
            .and_then(|log| log.topics.get(3))
            .context("Mint transaction emitted no Transfer event with a token id")?;
        let token_id = rpc::parse_hex_u256(topic)?;

        info!(
            recipient = %recipient.to_checksum(None),
            token_id = %token_id,
            "Minted mock NFT"
        );
        Ok(token_id)
    }

    /// Query a token balance via `balanceOf(address)`.
    pub async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        let calldata = abi::encode_call(
            SELECTOR_BALANCE_OF,
            &["address".to_string()],
            &[ResolvedArg::Address(owner)],
        )?;
        let returned = self.provider.call(token, &calldata).await?;
        rpc::parse_hex_u256(&returned)
    }

    async fn decimals(&self, token: Address) -> Result<u8> {
        let returned = self
            .provider
            .call(token, &format!("0x{}", SELECTOR_DECIMALS))
            .await?;
        let decimals = rpc::parse_hex_u256(&returned)?;
        if decimals > U256::from(u8::MAX) {
            anyhow::bail!("Token reports nonsensical decimals: {}", decimals);
        }
        Ok(decimals.to::<u64>() as u8)
    }

    async fn submit(
        &self,
        to: Address,
        calldata: String,
    ) -> Result<crate::provider::TransactionReceipt> {
        let tx = TransactionRequest::call(self.sender, to, calldata);
        let tx_hash = self.provider.send_transaction(&tx).await?;
        wait_for_receipt(self.provider, &tx_hash, self.confirmation_timeout).await
    }
}
