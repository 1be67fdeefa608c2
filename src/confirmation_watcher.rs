use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::config::TradingSettings;
use crate::error::Result;
use crate::explorer::{ReceiptStatusSource, TxOutcome};
use crate::services::purchase_service::PurchaseStore;

/// Watches pending purchases until the explorer settles their buy
/// transaction: confirmed buys start the hold, reverted buys are
/// cancelled, unindexed ones wait for the next pass.
pub struct ConfirmationWatcher {
    settings: TradingSettings,
    purchases: Arc<dyn PurchaseStore>,
    explorer: Arc<dyn ReceiptStatusSource>,
}

impl ConfirmationWatcher {
    pub fn new(
        settings: TradingSettings,
        purchases: Arc<dyn PurchaseStore>,
        explorer: Arc<dyn ReceiptStatusSource>,
    ) -> Self {
        Self {
            settings,
            purchases,
            explorer,
        }
    }

    pub async fn start(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_secs(self.settings.confirmation_poll_secs));
        info!(
            "confirmation watcher started, polling every {}s",
            self.settings.confirmation_poll_secs
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.check_pending().await {
                        Ok(settled) if settled > 0 => {
                            debug!("confirmation pass settled {} purchases", settled);
                        }
                        Ok(_) => {}
                        Err(e) => error!("confirmation pass failed: {}", e),
                    }
                }
                _ = shutdown.changed() => {
                    info!("confirmation watcher stopping");
                    break;
                }
            }
        }
    }

    /// One pass over every unconfirmed purchase. Explorer failures skip
    /// the row and leave it for the next pass.
    pub async fn check_pending(&self) -> Result<usize> {
        let pending = self.purchases.pending_confirmations().await?;
        let mut settled = 0;

        for row in pending {
            match self.explorer.receipt_status(&row.tx_hash).await {
                Ok(TxOutcome::Confirmed) => {
                    if self.purchases.mark_held(&row.tx_hash, None).await? {
                        info!(
                            "purchase {} confirmed, held until {}",
                            row.tx_hash, row.auto_sell_time
                        );
                        settled += 1;
                    }
                }
                Ok(TxOutcome::Reverted) => {
                    if self
                        .purchases
                        .cancel(&row.tx_hash, "Buy transaction reverted")
                        .await?
                    {
                        warn!("purchase {} reverted on-chain, cancelled", row.tx_hash);
                        settled += 1;
                    }
                }
                Ok(TxOutcome::Unknown) => {
                    debug!("purchase {} not indexed yet", row.tx_hash);
                }
                Err(e) => {
                    warn!("receipt check for {} failed: {}", row.tx_hash, e);
                }
            }
        }

        Ok(settled)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::config::StableToken;
    use crate::enums::PurchaseStatus;
    use crate::explorer::testing::ScriptedReceiptSource;
    use crate::services::purchase_service::memory::{sample_purchase, MemoryPurchaseStore};

    use super::*;

    fn settings() -> TradingSettings {
        TradingSettings {
            router_api_url: "http://router.test".to_string(),
            router_address: "0x6131B5fae19EA4f9D964eAc0408E4408b66337b5".to_string(),
            slippage_bps: 50,
            quote_ttl_secs: 30,
            hold_secs: 24 * 3600,
            stables: vec![StableToken {
                symbol: "USDT".to_string(),
                address: "0xdAC17F958D2ee523a2206206994597C13D831ec7".to_string(),
            }],
            auto_sell_poll_secs: 60,
            confirmation_poll_secs: 15,
        }
    }

    fn watcher(
        purchases: Arc<MemoryPurchaseStore>,
        explorer: Arc<ScriptedReceiptSource>,
    ) -> ConfirmationWatcher {
        ConfirmationWatcher::new(settings(), purchases, explorer)
    }

    #[tokio::test]
    async fn test_outcomes_drive_the_lifecycle() {
        let purchases = Arc::new(MemoryPurchaseStore::new());
        let explorer = Arc::new(ScriptedReceiptSource::new());
        let now = Utc::now();

        purchases.insert(sample_purchase("0xok", now)).await.unwrap();
        purchases.insert(sample_purchase("0xbad", now)).await.unwrap();
        purchases.insert(sample_purchase("0xlater", now)).await.unwrap();
        explorer.set_outcome("0xok", TxOutcome::Confirmed);
        explorer.set_outcome("0xbad", TxOutcome::Reverted);

        let settled = watcher(purchases.clone(), explorer)
            .check_pending()
            .await
            .unwrap();

        assert_eq!(settled, 2);
        let ok = purchases.find("0xok").await.unwrap().unwrap();
        assert_eq!(ok.status, PurchaseStatus::Held.as_str());
        let bad = purchases.find("0xbad").await.unwrap().unwrap();
        assert_eq!(bad.status, PurchaseStatus::Cancelled.as_str());
        assert_eq!(bad.error_message.as_deref(), Some("Buy transaction reverted"));
        let later = purchases.find("0xlater").await.unwrap().unwrap();
        assert_eq!(later.status, PurchaseStatus::Pending.as_str());
    }

    #[tokio::test]
    async fn test_explorer_failure_skips_only_that_row() {
        let purchases = Arc::new(MemoryPurchaseStore::new());
        let explorer = Arc::new(ScriptedReceiptSource::new());
        let now = Utc::now();

        purchases.insert(sample_purchase("0xflaky", now)).await.unwrap();
        purchases.insert(sample_purchase("0xok", now)).await.unwrap();
        explorer.fail_for("0xflaky", "rate limited");
        explorer.set_outcome("0xok", TxOutcome::Confirmed);

        let settled = watcher(purchases.clone(), explorer.clone())
            .check_pending()
            .await
            .unwrap();

        assert_eq!(settled, 1);
        let flaky = purchases.find("0xflaky").await.unwrap().unwrap();
        assert_eq!(flaky.status, PurchaseStatus::Pending.as_str());
        let ok = purchases.find("0xok").await.unwrap().unwrap();
        assert_eq!(ok.status, PurchaseStatus::Held.as_str());
        assert_eq!(explorer.queried().len(), 2);
    }

    #[tokio::test]
    async fn test_quiet_pass_checks_nothing() {
        let purchases = Arc::new(MemoryPurchaseStore::new());
        let explorer = Arc::new(ScriptedReceiptSource::new());

        let settled = watcher(purchases, explorer.clone())
            .check_pending()
            .await
            .unwrap();

        assert_eq!(settled, 0);
        assert!(explorer.queried().is_empty());
    }
}
