use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::explorer::gate::CallGate;
use crate::explorer::{ReceiptStatusSource, TxOutcome};

/// Etherscan-style explorer API client. All calls pass through the shared
/// gate to stay inside the free-tier rate limit.
pub struct ExplorerClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    gate: Arc<CallGate>,
}

// ── Explorer API response types ─────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ExplorerEnvelope {
    status: String,
    result: Option<ReceiptStatusResult>,
}

#[derive(Debug, Deserialize)]
struct ReceiptStatusResult {
    status: Option<String>,
}

// ── Implementation ──────────────────────────────────────────────────

impl ExplorerClient {
    pub fn new(api_url: String, api_key: Option<String>, gate: Arc<CallGate>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            api_url,
            api_key,
            gate,
        }
    }
}

#[async_trait]
impl ReceiptStatusSource for ExplorerClient {
    async fn receipt_status(&self, tx_hash: &str) -> Result<TxOutcome> {
        self.gate.admit().await;

        let mut query = vec![
            ("module", "transaction".to_string()),
            ("action", "gettxreceiptstatus".to_string()),
            ("txhash", tx_hash.to_string()),
        ];
        if let Some(key) = &self.api_key {
            query.push(("apikey", key.clone()));
        }

        let response = self
            .client
            .get(&self.api_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::Explorer(format!("Explorer request failed: {}", e)))?;

        let envelope: ExplorerEnvelope = response
            .json()
            .await
            .map_err(|e| AppError::Explorer(format!("Failed to parse explorer response: {}", e)))?;

        // An unindexed or pending tx comes back with an empty result status
        let outcome = match (
            envelope.status.as_str(),
            envelope.result.and_then(|r| r.status).as_deref(),
        ) {
            ("1", Some("1")) => TxOutcome::Confirmed,
            ("1", Some("0")) => TxOutcome::Reverted,
            _ => TxOutcome::Unknown,
        };

        Ok(outcome)
    }
}
