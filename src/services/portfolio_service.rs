use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::U256;
use ethers::utils::format_units;
use serde::Serialize;

use crate::chain::tokens;
use crate::db::entity::token;
use crate::error::Result;
use crate::providers::chain_client::ChainClient;
use crate::providers::token_balances::{RawTokenBalance, TokenBalanceSource};

/// Read access to the cached catalog, as much of it as the portfolio needs.
#[async_trait]
pub trait TokenReader: Send + Sync {
    /// Case-insensitive metadata lookup.
    async fn token_by_address(&self, address: &str) -> Result<Option<token::Model>>;
}

/// Assembles the holdings view for an address: native balance from the
/// chain, ERC-20 positions from the node's enumeration RPC, metadata
/// joined from the token cache.
pub struct PortfolioService {
    chain: Arc<dyn ChainClient>,
    balances: Arc<dyn TokenBalanceSource>,
    catalog: Arc<dyn TokenReader>,
}

impl PortfolioService {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        balances: Arc<dyn TokenBalanceSource>,
        catalog: Arc<dyn TokenReader>,
    ) -> Self {
        Self {
            chain,
            balances,
            catalog,
        }
    }

    pub async fn get_portfolio(&self, address: &str) -> Result<Portfolio> {
        let owner = tokens::parse_address(address)?;

        let native_wei = self.chain.native_balance(owner).await?;
        let native = PortfolioEntry {
            address: tokens::NATIVE_PLACEHOLDER.to_string(),
            symbol: "ETH".to_string(),
            name: "Ether".to_string(),
            decimals: 18,
            balance_raw: native_wei.to_string(),
            balance: format_amount(native_wei, 18),
            logo_url: None,
            verified: true,
            rank: None,
        };

        let held = self.balances.erc20_balances(address).await?;
        let mut entries = Vec::with_capacity(held.len());
        for raw in held {
            entries.push(self.describe(raw).await?);
        }

        // Catalog-ranked tokens first, unknowns after
        entries.sort_by(|a, b| match (a.rank, b.rank) {
            (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.address.cmp(&b.address)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.address.cmp(&b.address),
        });

        Ok(Portfolio {
            wallet_address: address.to_string(),
            native,
            tokens: entries,
        })
    }

    async fn describe(&self, raw: RawTokenBalance) -> Result<PortfolioEntry> {
        if let Some(meta) = self.catalog.token_by_address(&raw.contract_address).await? {
            let decimals = meta.decimals as u8;
            return Ok(PortfolioEntry {
                address: meta.address,
                symbol: meta.symbol,
                name: meta.name,
                decimals,
                balance_raw: raw.balance.to_string(),
                balance: format_amount(raw.balance, decimals),
                logo_url: meta.logo_url,
                verified: meta.is_verified,
                rank: meta.rank,
            });
        }

        // Not in the catalog: the well-known table, then a bare fallback
        let entry = match tokens::get_token_by_address(&raw.contract_address) {
            Some(known) => PortfolioEntry {
                address: known.address.clone(),
                symbol: known.symbol.clone(),
                name: known.symbol.clone(),
                decimals: known.decimals,
                balance_raw: raw.balance.to_string(),
                balance: format_amount(raw.balance, known.decimals),
                logo_url: None,
                verified: true,
                rank: None,
            },
            None => PortfolioEntry {
                address: raw.contract_address,
                symbol: "UNKNOWN".to_string(),
                name: "Unknown Token".to_string(),
                decimals: 18,
                balance_raw: raw.balance.to_string(),
                balance: format_amount(raw.balance, 18),
                logo_url: None,
                verified: false,
                rank: None,
            },
        };
        Ok(entry)
    }
}

/// `format_units` with the trailing fractional zeros dropped, the way a
/// balance reads on screen.
fn format_amount(value: U256, decimals: u8) -> String {
    match format_units(value, decimals as u32) {
        Ok(s) => {
            if s.contains('.') {
                let trimmed = s.trim_end_matches('0').trim_end_matches('.');
                if trimmed.is_empty() {
                    "0".to_string()
                } else {
                    trimmed.to_string()
                }
            } else {
                s
            }
        }
        Err(_) => value.to_string(),
    }
}

// ── Response payloads ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioEntry {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    /// Base units, decimal string.
    pub balance_raw: String,
    /// Human form with the token's decimals applied.
    pub balance: String,
    pub logo_url: Option<String>,
    pub verified: bool,
    pub rank: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Portfolio {
    pub wallet_address: String,
    pub native: PortfolioEntry,
    pub tokens: Vec<PortfolioEntry>,
}
