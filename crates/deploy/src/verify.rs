//! Source verification against an explorer-style verification API.
//!
//! Verification is a best-effort phase run after deployment: individual
//! failures are recorded per contract and never abort the run, since the
//! deployments themselves are already final. Requests run concurrently up to
//! a configured bound, each under its own timeout.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use crate::registry::{ArtifactRegistry, RegistryEntry};

fn default_concurrency() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    30
}

/// Configuration of the verification endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Verification API endpoint.
    pub url: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Maximum in-flight verification requests.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compiler_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimizer_runs: Option<u64>,
}

/// Outcome of one verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    /// The explorer already holds verified sources for this address.
    AlreadyVerified,
    Failed(String),
}

impl std::fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationOutcome::Verified => write!(f, "VERIFIED"),
            VerificationOutcome::AlreadyVerified => write!(f, "ALREADY_VERIFIED"),
            VerificationOutcome::Failed(reason) => write!(f, "FAILED ({})", reason),
        }
    }
}

impl VerificationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, VerificationOutcome::Failed(_))
    }
}

/// Per-contract verification result.
#[derive(Debug, Clone)]
pub struct VerificationRecord {
    pub name: String,
    pub address: String,
    pub outcome: VerificationOutcome,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    result: String,
}

/// Classify an API response into an outcome.
fn classify(status: &str, result: &str) -> VerificationOutcome {
    if status == "1" {
        return VerificationOutcome::Verified;
    }
    if result.to_lowercase().contains("already verified") {
        return VerificationOutcome::AlreadyVerified;
    }
    VerificationOutcome::Failed(result.to_string())
}

/// Submits verification requests for deployed units.
pub struct VerificationService {
    client: reqwest::Client,
    config: VerifierConfig,
}

impl VerificationService {
    pub fn new(config: VerifierConfig) -> Result<Self> {
        // No transport-level timeout: the per-call budget in `verify_one` is
        // the configured `timeout_secs`, which would otherwise be capped by
        // the client's own deadline.
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create verification HTTP client")?;
        Ok(Self { client, config })
    }

    /// Verify every recorded unit, libraries and contracts alike.
    ///
    /// Returns a record per unit; failures are captured in the records, not
    /// propagated, so one bad contract never blocks the rest.
    pub async fn verify_all(&self, registry: &ArtifactRegistry) -> Vec<VerificationRecord> {
        let entries: Vec<(&String, &RegistryEntry)> = registry
            .libraries
            .iter()
            .chain(registry.contracts.iter())
            .collect();

        info!(count = entries.len(), "Starting source verification");

        let mut records: Vec<VerificationRecord> = futures::stream::iter(entries)
            .map(|(name, entry)| self.verify_one(name, entry))
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;
        records.sort_by(|a, b| a.name.cmp(&b.name));

        for record in records.iter().filter(|r| r.outcome.is_failure()) {
            warn!(name = %record.name, outcome = %record.outcome, "Verification failed");
        }
        records
    }

    async fn verify_one(&self, name: &str, entry: &RegistryEntry) -> VerificationRecord {
        let address = entry.address.to_checksum(None);
        let timeout = Duration::from_secs(self.config.timeout_secs);

        let outcome = match tokio::time::timeout(timeout, self.submit(name, entry)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => VerificationOutcome::Failed(format!("{:#}", err)),
            Err(_) => VerificationOutcome::Failed(format!(
                "Timed out after {}s",
                self.config.timeout_secs
            )),
        };

        info!(name = %name, outcome = %outcome, "Verification result");
        VerificationRecord {
            name: name.to_string(),
            address,
            outcome,
        }
    }

    async fn submit(&self, name: &str, entry: &RegistryEntry) -> Result<VerificationOutcome> {
        let mut body = serde_json::json!({
            "address": entry.address.to_checksum(None),
            "contract_name": name,
            "constructor_args": entry.args,
        });
        if let Some(compiler) = &self.config.compiler_version {
            body["compiler_version"] = Value::String(compiler.clone());
        }
        if let Some(runs) = self.config.optimizer_runs {
            body["optimizer_runs"] = serde_json::json!(runs);
        }

        let mut request = self.client.post(self.config.url.clone()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.header("x-api-key", key);
        }

        let response: ApiResponse = request
            .send()
            .await
            .context("Verification request failed")?
            .json()
            .await
            .context("Failed to parse verification response")?;

        Ok(classify(&response.status, &response.result))
    }
}

/// Render verification results as a table for the CLI.
pub fn summary_table(records: &[VerificationRecord]) -> comfy_table::Table {
    let mut table = comfy_table::Table::new();
    table.set_header(vec!["Contract", "Address", "Status"]);
    for record in records {
        table.add_row(vec![
            record.name.clone(),
            record.address.clone(),
            record.outcome.to_string(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_verified() {
        assert_eq!(classify("1", "OK"), VerificationOutcome::Verified);
    }

    #[test]
    fn test_classify_already_verified() {
        // Re-running verification on the same suite must classify the same
        // way every time.
        for _ in 0..2 {
            assert_eq!(
                classify("0", "Contract source code already verified"),
                VerificationOutcome::AlreadyVerified
            );
        }
        assert_eq!(
            classify("0", "ALREADY VERIFIED"),
            VerificationOutcome::AlreadyVerified
        );
    }

    #[test]
    fn test_classify_failure_keeps_reason() {
        let outcome = classify("0", "Compilation mismatch");
        assert_eq!(
            outcome,
            VerificationOutcome::Failed("Compilation mismatch".to_string())
        );
        assert!(outcome.is_failure());
        assert_eq!(outcome.to_string(), "FAILED (Compilation mismatch)");
    }

    #[tokio::test]
    async fn test_slow_verifier_hits_configured_timeout() {
        use crate::plan::UnitKind;
        use alloy_core::primitives::Address;

        // A server that accepts connections but never answers. The outcome
        // must be the configured per-call timeout, not a transport error
        // from a shorter client-level deadline.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut open = Vec::new();
            loop {
                if let Ok((socket, _)) = listener.accept().await {
                    open.push(socket);
                }
            }
        });

        let config = VerifierConfig {
            url: Url::parse(&format!("http://127.0.0.1:{port}/verify")).unwrap(),
            api_key: None,
            concurrency: default_concurrency(),
            timeout_secs: 1,
            compiler_version: None,
            optimizer_runs: None,
        };
        let service = VerificationService::new(config).unwrap();

        let mut registry = ArtifactRegistry::default();
        registry
            .record(
                UnitKind::Contract,
                "Registry",
                Address::with_last_byte(1),
                vec![],
            )
            .unwrap();

        let records = service.verify_all(&registry).await;
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].outcome,
            VerificationOutcome::Failed("Timed out after 1s".to_string())
        );
    }

    #[test]
    fn test_config_defaults() {
        let config: VerifierConfig =
            toml::from_str("url = \"http://localhost:4000/verify\"").unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.timeout_secs, 30);
        assert!(config.api_key.is_none());
    }
}
