use std::str::FromStr;

use async_trait::async_trait;
use ethers::types::U256;
use serde::Deserialize;
use tracing::warn;

use crate::error::{AppError, Result};

/// One ERC-20 position as the node reports it: contract address plus the
/// raw balance word.
#[derive(Debug, Clone)]
pub struct RawTokenBalance {
    pub contract_address: String,
    pub balance: U256,
}

/// Enumerates the ERC-20 balances an address holds. The node answers with
/// every contract it has seen the address touch; zero and errored rows are
/// dropped before they reach the caller.
#[async_trait]
pub trait TokenBalanceSource: Send + Sync {
    async fn erc20_balances(&self, owner: &str) -> Result<Vec<RawTokenBalance>>;
}

// ── JSON-RPC response types ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct TokenBalancesResult {
    #[serde(rename = "tokenBalances")]
    token_balances: Vec<TokenBalanceRow>,
}

#[derive(Debug, Deserialize)]
struct TokenBalanceRow {
    #[serde(rename = "contractAddress")]
    contract_address: String,
    #[serde(rename = "tokenBalance")]
    token_balance: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

// ── Client ──────────────────────────────────────────────────────────

/// `alchemy_getTokenBalances` over plain JSON-RPC. Works against any node
/// that carries the Alchemy enhanced-API extension.
pub struct AlchemyBalanceClient {
    client: reqwest::Client,
    rpc_url: String,
}

impl AlchemyBalanceClient {
    pub fn new(rpc_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            rpc_url: rpc_url.to_string(),
        }
    }
}

#[async_trait]
impl TokenBalanceSource for AlchemyBalanceClient {
    async fn erc20_balances(&self, owner: &str) -> Result<Vec<RawTokenBalance>> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "alchemy_getTokenBalances",
            "params": [owner, "erc20"]
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Rpc(format!("Balance enumeration failed: {}", e)))?;

        let envelope: RpcEnvelope<TokenBalancesResult> = response
            .json()
            .await
            .map_err(|e| AppError::Rpc(format!("Malformed balance response: {}", e)))?;

        if let Some(err) = envelope.error {
            return Err(AppError::Rpc(format!("Node error: {}", err.message)));
        }

        Ok(match envelope.result {
            Some(result) => collect_balances(result),
            None => Vec::new(),
        })
    }
}

fn collect_balances(result: TokenBalancesResult) -> Vec<RawTokenBalance> {
    let mut balances = Vec::new();
    for row in result.token_balances {
        if row.error.is_some() {
            continue;
        }
        let hex = match row.token_balance {
            Some(h) => h,
            None => continue,
        };
        let balance = match U256::from_str(&hex) {
            Ok(b) => b,
            Err(_) => {
                warn!(
                    "Unparsable balance {} for {}, skipping",
                    hex, row.contract_address
                );
                continue;
            }
        };
        if balance.is_zero() {
            continue;
        }
        balances.push(RawTokenBalance {
            contract_address: row.contract_address,
            balance,
        });
    }
    balances
}
