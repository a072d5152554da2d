//! Network provider abstraction over an Ethereum JSON-RPC endpoint.
//!
//! Deployment, checkpointing and the mock-asset flows all talk to the chain
//! through the [`NetworkProvider`] trait so that the orchestration logic can
//! be exercised against an in-memory provider in tests. [`HttpProvider`] is
//! the production implementation backed by a JSON-RPC HTTP endpoint.

use std::time::Duration;

use alloy_core::primitives::{Address, U256};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::rpc;

/// Interval between receipt polling attempts.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A transaction to be submitted via `eth_sendTransaction`.
///
/// The sender must be an account the target node can sign for (unlocked
/// development accounts on Anvil/Hardhat forks); key custody stays outside
/// this crate.
#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub from: Address,
    /// None for contract creation.
    pub to: Option<Address>,
    /// 0x-prefixed calldata (or deployment bytecode).
    pub data: String,
    pub value: Option<U256>,
    pub gas: Option<u64>,
}

impl TransactionRequest {
    /// A contract-creation transaction carrying deployment bytecode.
    pub fn deployment(from: Address, data: String) -> Self {
        Self {
            from,
            to: None,
            data,
            value: None,
            gas: None,
        }
    }

    /// A plain contract call transaction.
    pub fn call(from: Address, to: Address, data: String) -> Self {
        Self {
            from,
            to: Some(to),
            data,
            value: None,
            gas: None,
        }
    }

    fn to_rpc_value(&self) -> Value {
        let mut tx = serde_json::json!({
            "from": format!("{:#x}", self.from),
            "data": self.data,
        });
        if let Some(to) = self.to {
            tx["to"] = Value::String(format!("{:#x}", to));
        }
        if let Some(value) = self.value {
            tx["value"] = Value::String(format!("0x{:x}", value));
        }
        if let Some(gas) = self.gas {
            tx["gas"] = Value::String(format!("0x{:x}", gas));
        }
        tx
    }
}

/// A single log entry from a transaction receipt.
#[derive(Debug, Clone, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
}

/// The subset of `eth_getTransactionReceipt` this crate acts on.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    /// Populated for contract-creation transactions.
    pub contract_address: Option<Address>,
    /// "0x1" for success, "0x0" for a reverted transaction.
    pub status: Option<String>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

impl TransactionReceipt {
    /// Whether the transaction was included without reverting. A receipt
    /// missing its status field is not treated as a success.
    pub fn succeeded(&self) -> bool {
        self.status.as_deref() == Some("0x1")
    }
}

/// Capability interface onto the target network.
///
/// `snapshot`, `revert` and `set_balance` are development/fork-network
/// primitives; implementations for production networks should return errors
/// for them rather than pretending to succeed.
#[allow(async_fn_in_trait)]
pub trait NetworkProvider {
    /// Submit a transaction, returning its hash.
    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String>;

    /// Fetch the receipt for a transaction, or None if not yet included.
    async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<TransactionReceipt>>;

    /// Execute a read-only call, returning the 0x-prefixed return data.
    async fn call(&self, to: Address, data: &str) -> Result<String>;

    /// Query an account balance in wei.
    async fn balance(&self, address: Address) -> Result<U256>;

    /// Set an account balance in wei (development networks only).
    async fn set_balance(&self, address: Address, wei: U256) -> Result<()>;

    /// Take a network-state snapshot, returning an opaque token.
    async fn snapshot(&self) -> Result<String>;

    /// Revert to a previously taken snapshot. Returns false if the token is
    /// unknown or already consumed.
    async fn revert(&self, token: &str) -> Result<bool>;

    /// The node's client version string (`web3_clientVersion`).
    async fn client_version(&self) -> Result<String>;
}

/// Poll for a transaction receipt until it appears or the timeout elapses.
///
/// A receipt with a revert status is returned as an error: the caller must
/// never treat a reverted deployment as confirmed.
pub async fn wait_for_receipt<P: NetworkProvider>(
    provider: &P,
    tx_hash: &str,
    timeout: Duration,
) -> Result<TransactionReceipt> {
    let start = std::time::Instant::now();

    loop {
        if let Some(receipt) = provider.transaction_receipt(tx_hash).await? {
            if !receipt.succeeded() {
                anyhow::bail!("Transaction {} reverted", tx_hash);
            }
            return Ok(receipt);
        }

        if start.elapsed() > timeout {
            anyhow::bail!(
                "Timeout waiting for confirmation of transaction {} after {:?}",
                tx_hash,
                timeout
            );
        }

        tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
    }
}

/// JSON-RPC HTTP implementation of [`NetworkProvider`].
pub struct HttpProvider {
    client: reqwest::Client,
    url: Url,
}

impl HttpProvider {
    pub fn new(url: Url) -> Result<Self> {
        Ok(Self {
            client: rpc::create_client()?,
            url,
        })
    }

    fn endpoint(&self) -> &str {
        self.url.as_str()
    }
}

impl NetworkProvider for HttpProvider {
    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String> {
        rpc::json_rpc_call(
            &self.client,
            self.endpoint(),
            "eth_sendTransaction",
            vec![tx.to_rpc_value()],
        )
        .await
        .context("Failed to send transaction")
    }

    async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<TransactionReceipt>> {
        rpc::json_rpc_call(
            &self.client,
            self.endpoint(),
            "eth_getTransactionReceipt",
            vec![serde_json::json!(tx_hash)],
        )
        .await
        .context("Failed to fetch transaction receipt")
    }

    async fn call(&self, to: Address, data: &str) -> Result<String> {
        rpc::json_rpc_call(
            &self.client,
            self.endpoint(),
            "eth_call",
            vec![
                serde_json::json!({
                    "to": format!("{:#x}", to),
                    "data": data,
                }),
                serde_json::json!("latest"),
            ],
        )
        .await
        .context("Failed to execute eth_call")
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        let hex: String = rpc::json_rpc_call(
            &self.client,
            self.endpoint(),
            "eth_getBalance",
            vec![
                serde_json::json!(format!("{:#x}", address)),
                serde_json::json!("latest"),
            ],
        )
        .await
        .context("Failed to query balance")?;

        rpc::parse_hex_u256(&hex)
    }

    async fn set_balance(&self, address: Address, wei: U256) -> Result<()> {
        let _: Value = rpc::json_rpc_call(
            &self.client,
            self.endpoint(),
            "anvil_setBalance",
            vec![
                serde_json::json!(format!("{:#x}", address)),
                serde_json::json!(format!("0x{:x}", wei)),
            ],
        )
        .await
        .context("Failed to set balance (only development networks support this)")?;
        Ok(())
    }

    async fn snapshot(&self) -> Result<String> {
        rpc::json_rpc_call(&self.client, self.endpoint(), "evm_snapshot", vec![])
            .await
            .context("Failed to take network snapshot")
    }

    async fn revert(&self, token: &str) -> Result<bool> {
        rpc::json_rpc_call(
            &self.client,
            self.endpoint(),
            "evm_revert",
            vec![serde_json::json!(token)],
        )
        .await
        .context("Failed to revert network snapshot")
    }

    async fn client_version(&self) -> Result<String> {
        rpc::json_rpc_call(&self.client, self.endpoint(), "web3_clientVersion", vec![])
            .await
            .context("Failed to query client version")
    }
}

/// Convert ETH amount (f64) to wei.
///
/// Rounds to gwei precision (9 decimal places) to avoid floating-point noise,
/// then scales to wei. Gwei precision is more than sufficient for funding
/// development accounts. Negative and non-finite amounts are rejected rather
/// than silently saturating to zero.
pub fn eth_to_wei(eth: f64) -> Result<U256> {
    if !eth.is_finite() || eth < 0.0 {
        anyhow::bail!("Invalid ETH amount: {}", eth);
    }
    let gwei = (eth * 1e9).round() as u128;
    Ok(U256::from(gwei) * U256::from(1_000_000_000u64))
}

/// Format a wei amount as a decimal ETH string.
pub fn format_ether(wei: U256) -> String {
    let base = U256::from(1_000_000_000_000_000_000u64);
    let whole = wei / base;
    let frac = (wei % base).to::<u64>();

    if frac == 0 {
        return whole.to_string();
    }

    let frac = format!("{:018}", frac);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_eth_to_wei() {
        assert_eq!(
            eth_to_wei(1.0).unwrap(),
            U256::from(1_000_000_000_000_000_000u64)
        );
        assert_eq!(
            eth_to_wei(0.1).unwrap(),
            U256::from(100_000_000_000_000_000u64)
        );
        assert_eq!(
            eth_to_wei(0.7).unwrap(),
            U256::from(700_000_000_000_000_000u64)
        );
        assert_eq!(
            eth_to_wei(10_000.0).unwrap(),
            U256::from(10_000u64) * U256::from(1_000_000_000_000_000_000u64)
        );
    }

    #[test]
    fn test_eth_to_wei_rejects_bad_amounts() {
        // A negative amount must not quietly become a zero balance.
        assert!(eth_to_wei(-1.0).is_err());
        assert!(eth_to_wei(f64::NAN).is_err());
        assert!(eth_to_wei(f64::INFINITY).is_err());
        assert_eq!(eth_to_wei(0.0).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_format_ether() {
        assert_eq!(format_ether(U256::from(1_000_000_000_000_000_000u64)), "1");
        assert_eq!(format_ether(U256::from(1_500_000_000_000_000_000u64)), "1.5");
        assert_eq!(format_ether(U256::ZERO), "0");
        assert_eq!(format_ether(U256::from(1u64)), "0.000000000000000001");
    }

    #[test]
    fn test_receipt_succeeded() {
        let receipt = TransactionReceipt {
            transaction_hash: "0x1".to_string(),
            contract_address: None,
            status: Some("0x1".to_string()),
            logs: vec![],
        };
        assert!(receipt.succeeded());

        let reverted = TransactionReceipt {
            status: Some("0x0".to_string()),
            ..receipt.clone()
        };
        assert!(!reverted.succeeded());

        // A malformed receipt with no status must never confirm a deployment.
        let missing_status = TransactionReceipt {
            status: None,
            ..receipt.clone()
        };
        assert!(!missing_status.succeeded());
    }

    #[test]
    fn test_transaction_request_rpc_value() {
        let from = Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap();
        let tx = TransactionRequest::deployment(from, "0x6080".to_string());
        let value = tx.to_rpc_value();

        assert_eq!(value["data"], "0x6080");
        assert!(value.get("to").is_none());
        assert_eq!(
            value["from"],
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_receipt_deserialization() {
        let json = serde_json::json!({
            "transactionHash": "0xabc",
            "contractAddress": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
            "status": "0x1",
            "logs": [{"topics": ["0x1"], "data": "0x"}]
        });
        let receipt: TransactionReceipt = serde_json::from_value(json).unwrap();
        assert!(receipt.contract_address.is_some());
        assert_eq!(receipt.logs.len(), 1);
    }
}
