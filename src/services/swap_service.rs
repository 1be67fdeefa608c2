use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use ethers::types::U256;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::chain::tokens;
use crate::config::TradingSettings;
use crate::db::entity::purchase;
use crate::dex::{EncodedSwap, Quote, SwapRouteSource};
use crate::error::{AppError, Result};
use crate::providers::chain_client::{ChainClient, WalletSigner};
use crate::services::purchase_service::{NewPurchase, PurchaseStore};
use crate::swap::{
    decoded_call, Approval, ApprovalStep, PreValidationStep, QuoteCountdown, SimulationStep,
};

/// Transaction validity window passed to the aggregator build.
const SWAP_DEADLINE_SECS: u64 = 20 * 60;

/// Runs the swap pipeline end to end and records buys of non-stable
/// tokens as purchases for the auto-sell lifecycle.
pub struct SwapService {
    settings: TradingSettings,
    chain: Arc<dyn ChainClient>,
    router: Arc<dyn SwapRouteSource>,
    signer: Arc<dyn WalletSigner>,
    purchases: Arc<dyn PurchaseStore>,
    prevalidation: PreValidationStep,
    approval: ApprovalStep,
    simulation: SimulationStep,
    countdown: QuoteCountdown,
    quotes: Arc<Mutex<HashMap<String, Quote>>>,
}

impl SwapService {
    pub fn new(
        settings: TradingSettings,
        chain: Arc<dyn ChainClient>,
        router: Arc<dyn SwapRouteSource>,
        signer: Arc<dyn WalletSigner>,
        purchases: Arc<dyn PurchaseStore>,
    ) -> Self {
        Self {
            prevalidation: PreValidationStep::new(chain.clone(), router.clone()),
            approval: ApprovalStep::new(chain.clone(), signer.clone()),
            simulation: SimulationStep::new(chain.clone()),
            countdown: QuoteCountdown::new(),
            quotes: Arc::new(Mutex::new(HashMap::new())),
            settings,
            chain,
            router,
            signer,
            purchases,
        }
    }

    /// Prices the pair, caches the quote and (re)starts its expiry timer.
    pub async fn get_quote(&self, request: QuoteRequest) -> Result<QuoteResponse> {
        let amount_in = parse_amount(&request.amount_in)?;
        validate_pair(&request.token_in, &request.token_out)?;

        let summary = self
            .router
            .find_route(&request.token_in, &request.token_out, amount_in)
            .await?;
        let quote = Quote::from_summary(summary)?;

        let ttl = Duration::from_secs(self.settings.quote_ttl_secs);
        let key = pair_key(&request.token_in, &request.token_out);
        {
            let mut quotes = self.quotes.lock().await;
            quotes.retain(|_, q| !q.is_expired(ttl));
            quotes.insert(key.clone(), quote.clone());
        }

        let quotes = self.quotes.clone();
        self.countdown
            .start(ttl, async move {
                if quotes.lock().await.remove(&key).is_some() {
                    debug!("cached quote for {} expired", key);
                }
            })
            .await;

        Ok(QuoteResponse {
            token_in: request.token_in,
            token_out: request.token_out,
            amount_in: quote.amount_in.to_string(),
            amount_out: quote.amount_out.to_string(),
            gas: quote.gas,
            route_id: quote.route_id,
            router_address: quote.router_address,
            expires_in_secs: self.settings.quote_ttl_secs,
        })
    }

    /// Executes a swap the caller has just been quoted. Refuses to run
    /// without a fresh matching quote, so the caller never trades on a
    /// price it has not seen.
    pub async fn execute_swap(&self, request: SwapRequest) -> Result<SwapReceipt> {
        let amount_in = parse_amount(&request.amount_in)?;
        validate_pair(&request.token_in, &request.token_out)?;

        let key = pair_key(&request.token_in, &request.token_out);
        let ttl = Duration::from_secs(self.settings.quote_ttl_secs);
        let quoted = {
            let quotes = self.quotes.lock().await;
            quotes
                .get(&key)
                .map(|q| !q.is_expired(ttl) && q.amount_in == amount_in)
                .unwrap_or(false)
        };
        if !quoted {
            return Err(AppError::QuoteExpired);
        }

        let (encoded, tx_hash) = self
            .swap_once(&request.token_in, &request.token_out, amount_in)
            .await?;

        // The quote is consumed
        self.quotes.lock().await.remove(&key);
        self.countdown.cancel().await;

        let purchase_recorded = if self.is_stable(&request.token_in)
            && !self.is_stable(&request.token_out)
        {
            self.record_purchase(&request, amount_in, &encoded, &tx_hash)
                .await
        } else {
            false
        };

        info!("swap sent: {}", tx_hash);
        Ok(SwapReceipt {
            tx_hash,
            amount_out: encoded.amount_out,
            purchase_recorded,
        })
    }

    /// Prevalidation, approval, build, simulation and send, in that order.
    /// The first failing step aborts with its own error.
    async fn swap_once(
        &self,
        token_in: &str,
        token_out: &str,
        amount_in: U256,
    ) -> Result<(EncodedSwap, String)> {
        let owner = self.signer.address();
        let validated = self
            .prevalidation
            .run(owner, token_in, token_out, amount_in)
            .await?;

        let approval = self
            .approval
            .run(token_in, &validated.route.router_address, amount_in)
            .await?;
        let permit = match approval {
            Approval::Permit { calldata, .. } => Some(calldata),
            Approval::ApprovalSent { tx_hash } => {
                info!("approval transaction sent: {}", tx_hash);
                None
            }
            Approval::NotRequired | Approval::AlreadyApproved => None,
        };

        let sender = format!("{:?}", owner);
        let deadline = Utc::now().timestamp() as u64 + SWAP_DEADLINE_SECS;
        let encoded = self
            .router
            .build_swap(
                &validated.route,
                &sender,
                &sender,
                self.settings.slippage_bps,
                deadline,
                permit,
            )
            .await?;

        self.simulation.run(&encoded).await?;

        let (to, data, value) = decoded_call(&encoded)?;
        let tx_hash = self.chain.send_transaction(to, data, value).await?;
        Ok((encoded, tx_hash))
    }

    async fn record_purchase(
        &self,
        request: &SwapRequest,
        amount_in: U256,
        encoded: &EncodedSwap,
        tx_hash: &str,
    ) -> bool {
        let now = Utc::now();
        let purchase = NewPurchase {
            tx_hash: tx_hash.to_string(),
            wallet_address: format!("{:?}", self.signer.address()),
            token_address: request.token_out.clone(),
            token_symbol: self.token_symbol(&request.token_out, request.token_symbol.as_deref()),
            stable_address: request.token_in.clone(),
            stable_symbol: self.stable_symbol(&request.token_in),
            amount_in: amount_in.to_string(),
            amount_out: encoded.amount_out.clone(),
            chain_id: self.chain.chain_id() as i64,
            purchase_time: now,
            auto_sell_time: now + chrono::Duration::seconds(self.settings.hold_secs),
        };

        match self.purchases.insert(purchase).await {
            Ok(row) => {
                info!(
                    "purchase {} recorded, auto-sell due at {}",
                    tx_hash, row.auto_sell_time
                );
                true
            }
            Err(e) => {
                // The buy is already on-chain; losing the row only loses
                // the auto-sell, so the swap still reports as sent
                error!("swap {} sent but the purchase row failed: {}", tx_hash, e);
                false
            }
        }
    }

    fn is_stable(&self, address: &str) -> bool {
        self.settings
            .stables
            .iter()
            .any(|s| s.address.eq_ignore_ascii_case(address))
    }

    fn stable_symbol(&self, address: &str) -> String {
        self.settings
            .stables
            .iter()
            .find(|s| s.address.eq_ignore_ascii_case(address))
            .map(|s| s.symbol.clone())
            .unwrap_or_else(|| self.token_symbol(address, None))
    }

    fn token_symbol(&self, address: &str, hint: Option<&str>) -> String {
        if let Some(symbol) = hint {
            if !symbol.trim().is_empty() {
                return symbol.trim().to_string();
            }
        }
        tokens::get_token_by_address(address)
            .map(|t| t.symbol.clone())
            .unwrap_or_else(|| short_address(address))
    }
}

/// Sells a held purchase back into a stablecoin. The auto-sell worker
/// depends on this capability, not on the whole service.
#[async_trait]
pub trait SellExecutor: Send + Sync {
    async fn execute_sell(&self, purchase: &purchase::Model) -> Result<String>;
}

#[async_trait]
impl SellExecutor for SwapService {
    /// Tries the purchase's own stablecoin first, then the configured list
    /// in order. A routing failure moves on to the next candidate; any
    /// other failure aborts.
    async fn execute_sell(&self, purchase: &purchase::Model) -> Result<String> {
        let amount = U256::from_dec_str(purchase.amount_out.trim()).map_err(|_| {
            AppError::InvalidInput(format!(
                "Purchase {} has a malformed amount_out",
                purchase.tx_hash
            ))
        })?;

        let mut candidates: Vec<String> = vec![purchase.stable_address.clone()];
        for stable in &self.settings.stables {
            if !candidates
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&stable.address))
            {
                candidates.push(stable.address.clone());
            }
        }

        let mut last_routing_error = None;
        for stable in &candidates {
            match self
                .swap_once(&purchase.token_address, stable, amount)
                .await
            {
                Ok((_, tx_hash)) => return Ok(tx_hash),
                Err(AppError::Router(message)) => {
                    debug!(
                        "no sell route {} -> {} for {}: {}",
                        purchase.token_symbol, stable, purchase.tx_hash, message
                    );
                    last_routing_error = Some(AppError::Router(message));
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_routing_error.unwrap_or_else(|| {
            AppError::Router("No stablecoin configured to sell into".to_string())
        }))
    }
}

fn pair_key(token_in: &str, token_out: &str) -> String {
    format!("{}->{}", token_in.to_lowercase(), token_out.to_lowercase())
}

fn parse_amount(raw: &str) -> Result<U256> {
    let amount = U256::from_dec_str(raw.trim())
        .map_err(|_| AppError::InvalidInput(format!("Invalid amount: {}", raw)))?;
    if amount.is_zero() {
        return Err(AppError::InvalidInput(
            "Amount must be positive".to_string(),
        ));
    }
    Ok(amount)
}

fn validate_pair(token_in: &str, token_out: &str) -> Result<()> {
    for token in [token_in, token_out] {
        if !tokens::is_native(token) {
            tokens::parse_address(token)?;
        }
    }
    if token_in.eq_ignore_ascii_case(token_out) {
        return Err(AppError::InvalidInput(
            "token_in and token_out must differ".to_string(),
        ));
    }
    Ok(())
}

fn short_address(address: &str) -> String {
    if address.len() > 10 {
        format!("{}..{}", &address[..6], &address[address.len() - 4..])
    } else {
        address.to_string()
    }
}

// ── Request/response payloads ───────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub token_in: String,
    pub token_out: String,
    /// Base units, decimal string.
    pub amount_in: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuoteResponse {
    pub token_in: String,
    pub token_out: String,
    pub amount_in: String,
    pub amount_out: String,
    pub gas: String,
    pub route_id: String,
    pub router_address: String,
    pub expires_in_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwapRequest {
    pub token_in: String,
    pub token_out: String,
    pub amount_in: String,
    /// Display symbol for the bought token, stamped on the purchase row.
    #[serde(default)]
    pub token_symbol: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwapReceipt {
    pub tx_hash: String,
    pub amount_out: String,
    pub purchase_recorded: bool,
}

#[cfg(test)]
mod tests {
    use crate::config::StableToken;
    use crate::dex::testing::ScriptedRouter;
    use crate::enums::PurchaseStatus;
    use crate::providers::chain_client::testing::{FakeChainClient, FakeWallet, PermitProbe};
    use crate::services::purchase_service::memory::{sample_purchase, MemoryPurchaseStore};

    use super::*;

    const USDT: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";
    const USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
    const WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";

    fn settings() -> TradingSettings {
        TradingSettings {
            router_api_url: "http://router.test".to_string(),
            router_address: "0x6131B5fae19EA4f9D964eAc0408E4408b66337b5".to_string(),
            slippage_bps: 50,
            quote_ttl_secs: 30,
            hold_secs: 24 * 3600,
            stables: vec![
                StableToken {
                    symbol: "USDT".to_string(),
                    address: USDT.to_string(),
                },
                StableToken {
                    symbol: "USDC".to_string(),
                    address: USDC.to_string(),
                },
            ],
            auto_sell_poll_secs: 60,
            confirmation_poll_secs: 15,
        }
    }

    struct Fixture {
        chain: Arc<FakeChainClient>,
        router: Arc<ScriptedRouter>,
        purchases: Arc<MemoryPurchaseStore>,
        service: SwapService,
    }

    fn fixture(settings: TradingSettings) -> Fixture {
        let chain = Arc::new(FakeChainClient::new(1));
        let router = Arc::new(ScriptedRouter::new());
        let wallet = Arc::new(FakeWallet::new());
        let purchases = Arc::new(MemoryPurchaseStore::new());
        let service = SwapService::new(
            settings,
            chain.clone(),
            router.clone(),
            wallet,
            purchases.clone(),
        );
        Fixture {
            chain,
            router,
            purchases,
            service,
        }
    }

    fn buy_request(amount: &str) -> SwapRequest {
        SwapRequest {
            token_in: USDT.to_string(),
            token_out: WETH.to_string(),
            amount_in: amount.to_string(),
            token_symbol: None,
        }
    }

    async fn quote_pair(f: &Fixture, token_in: &str, token_out: &str, amount: &str) {
        f.service
            .get_quote(QuoteRequest {
                token_in: token_in.to_string(),
                token_out: token_out.to_string(),
                amount_in: amount.to_string(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_quote_prices_the_pair() {
        let f = fixture(settings());

        let quote = f
            .service
            .get_quote(QuoteRequest {
                token_in: USDT.to_string(),
                token_out: WETH.to_string(),
                amount_in: "1000000".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(quote.amount_in, "1000000");
        assert_eq!(quote.expires_in_secs, 30);
        assert_eq!(f.router.find_calls(), 1);
    }

    #[tokio::test]
    async fn test_get_quote_rejects_bad_input() {
        let f = fixture(settings());

        let zero = f
            .service
            .get_quote(QuoteRequest {
                token_in: USDT.to_string(),
                token_out: WETH.to_string(),
                amount_in: "0".to_string(),
            })
            .await;
        assert!(matches!(zero, Err(AppError::InvalidInput(_))));

        let same_pair = f
            .service
            .get_quote(QuoteRequest {
                token_in: USDT.to_string(),
                token_out: USDT.to_lowercase(),
                amount_in: "1000000".to_string(),
            })
            .await;
        assert!(matches!(same_pair, Err(AppError::InvalidInput(_))));

        let bad_address = f
            .service
            .get_quote(QuoteRequest {
                token_in: "0xnotanaddress".to_string(),
                token_out: WETH.to_string(),
                amount_in: "1000000".to_string(),
            })
            .await;
        assert!(matches!(bad_address, Err(AppError::InvalidAddress)));

        assert_eq!(f.router.find_calls(), 0);
    }

    #[tokio::test]
    async fn test_execute_without_a_fresh_quote_is_refused() {
        let f = fixture(settings());
        f.chain
            .set_token_balance(USDT.parse().unwrap(), U256::from(10_000_000u64));

        let err = f
            .service
            .execute_swap(buy_request("1000000"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::QuoteExpired));
        assert!(f.chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_quoted_amount_mismatch_is_refused() {
        let f = fixture(settings());
        f.chain
            .set_token_balance(USDT.parse().unwrap(), U256::from(10_000_000u64));
        quote_pair(&f, USDT, WETH, "1000000").await;

        let err = f
            .service
            .execute_swap(buy_request("2000000"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::QuoteExpired));
        assert!(f.chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_stable_buy_records_a_pending_purchase() {
        let f = fixture(settings());
        f.chain
            .set_token_balance(USDT.parse().unwrap(), U256::from(10_000_000u64));
        quote_pair(&f, USDT, WETH, "1000000").await;

        let before = Utc::now();
        let receipt = f
            .service
            .execute_swap(buy_request("1000000"))
            .await
            .unwrap();

        assert!(receipt.purchase_recorded);
        assert_eq!(f.chain.sent().len(), 1);

        let rows = f.purchases.snapshot();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.tx_hash, receipt.tx_hash);
        assert_eq!(row.status, PurchaseStatus::Pending.as_str());
        assert_eq!(row.token_symbol, "WETH");
        assert_eq!(row.stable_symbol, "USDT");
        assert_eq!(row.amount_in, "1000000");
        assert!(row.auto_sell_time >= before + chrono::Duration::hours(24));
    }

    #[tokio::test]
    async fn test_executing_the_same_quote_twice_is_refused() {
        let f = fixture(settings());
        f.chain
            .set_token_balance(USDT.parse().unwrap(), U256::from(10_000_000u64));
        quote_pair(&f, USDT, WETH, "1000000").await;

        f.service
            .execute_swap(buy_request("1000000"))
            .await
            .unwrap();
        let err = f
            .service
            .execute_swap(buy_request("1000000"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::QuoteExpired));
        assert_eq!(f.chain.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_non_stable_input_records_nothing() {
        let f = fixture(settings());
        f.chain
            .set_token_balance(WETH.parse().unwrap(), U256::exp10(19));
        quote_pair(&f, WETH, USDT, "1000000000000000000").await;

        let receipt = f
            .service
            .execute_swap(SwapRequest {
                token_in: WETH.to_string(),
                token_out: USDT.to_string(),
                amount_in: "1000000000000000000".to_string(),
                token_symbol: None,
            })
            .await
            .unwrap();

        assert!(!receipt.purchase_recorded);
        assert!(f.purchases.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_permit_calldata_is_threaded_into_the_build() {
        let f = fixture(settings());
        f.chain
            .set_token_balance(USDT.parse().unwrap(), U256::from(10_000_000u64));
        f.chain
            .set_permit_probe(USDT.parse().unwrap(), PermitProbe::Supported);
        quote_pair(&f, USDT, WETH, "1000000").await;

        f.service
            .execute_swap(buy_request("1000000"))
            .await
            .unwrap();

        let permits = f.router.permits_passed();
        assert_eq!(permits.len(), 1);
        assert!(permits[0].as_deref().unwrap().starts_with("0xd505accf"));
        assert_eq!(f.chain.approve_calls(), 0);
    }

    #[tokio::test]
    async fn test_simulation_revert_blocks_the_send() {
        let f = fixture(settings());
        f.chain
            .set_token_balance(USDT.parse().unwrap(), U256::from(10_000_000u64));
        f.chain
            .script_call(Err(AppError::SimulationReverted("UniswapV2: K".to_string())));
        quote_pair(&f, USDT, WETH, "1000000").await;

        let err = f
            .service
            .execute_swap(buy_request("1000000"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::SimulationReverted(_)));
        assert!(f.chain.sent().is_empty());
        assert!(f.purchases.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_purchase_insert_failure_still_reports_the_swap() {
        let f = fixture(settings());
        f.chain
            .set_token_balance(USDT.parse().unwrap(), U256::from(10_000_000u64));
        quote_pair(&f, USDT, WETH, "1000000").await;
        f.purchases.fail_inserts("connection reset");

        let receipt = f
            .service
            .execute_swap(buy_request("1000000"))
            .await
            .unwrap();

        assert!(!receipt.purchase_recorded);
        assert_eq!(f.chain.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_execute_sell_swaps_back_into_the_stable() {
        let f = fixture(settings());
        let purchase = f
            .purchases
            .insert(sample_purchase("0xbuy", Utc::now()))
            .await
            .unwrap();
        f.chain.set_token_balance(
            purchase.token_address.parse().unwrap(),
            U256::from_dec_str(&purchase.amount_out).unwrap(),
        );

        let sell_tx = f.service.execute_sell(&purchase).await.unwrap();

        assert!(sell_tx.starts_with("0xsent"));
        assert_eq!(f.chain.sent().len(), 1);
        assert_eq!(f.router.find_calls(), 1);
    }

    #[tokio::test]
    async fn test_execute_sell_insufficient_balance_aborts() {
        let f = fixture(settings());
        let purchase = f
            .purchases
            .insert(sample_purchase("0xbuy", Utc::now()))
            .await
            .unwrap();

        let err = f.service.execute_sell(&purchase).await.unwrap_err();

        assert!(matches!(err, AppError::InsufficientBalance { .. }));
        assert!(f.chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_execute_sell_no_route_anywhere_reports_router_error() {
        let f = fixture(settings());
        let purchase = f
            .purchases
            .insert(sample_purchase("0xbuy", Utc::now()))
            .await
            .unwrap();
        f.chain.set_token_balance(
            purchase.token_address.parse().unwrap(),
            U256::from_dec_str(&purchase.amount_out).unwrap(),
        );
        f.router.fail_route("no route found");

        let err = f.service.execute_sell(&purchase).await.unwrap_err();

        assert!(matches!(err, AppError::Router(_)));
        // The purchase's own stable plus the second configured one
        assert_eq!(f.router.find_calls(), 2);
        assert!(f.chain.sent().is_empty());
    }
}
