use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::config::TradingSettings;
use crate::error::Result;
use crate::services::purchase_service::PurchaseStore;
use crate::services::swap_service::SellExecutor;

/// Sells held purchases once their hold window runs out. Every row is
/// claimed under a fresh worker id before the sell, so a second process
/// polling the same table never sells it twice.
pub struct AutoSeller {
    settings: TradingSettings,
    purchases: Arc<dyn PurchaseStore>,
    executor: Arc<dyn SellExecutor>,
}

impl AutoSeller {
    pub fn new(
        settings: TradingSettings,
        purchases: Arc<dyn PurchaseStore>,
        executor: Arc<dyn SellExecutor>,
    ) -> Self {
        Self {
            settings,
            purchases,
            executor,
        }
    }

    pub async fn start(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_secs(self.settings.auto_sell_poll_secs));
        info!(
            "auto seller started, polling every {}s",
            self.settings.auto_sell_poll_secs
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sell_due().await {
                        Ok(sold) if sold > 0 => {
                            info!("auto-sell pass sold {} purchases", sold);
                        }
                        Ok(_) => {}
                        Err(e) => error!("auto-sell pass failed: {}", e),
                    }
                }
                _ = shutdown.changed() => {
                    info!("auto seller stopping");
                    break;
                }
            }
        }
    }

    /// One pass over the due rows. A failed sell releases the claim with
    /// the error recorded, so the next pass picks the row up again.
    pub async fn sell_due(&self) -> Result<usize> {
        let due = self.purchases.due_auto_sells(Utc::now()).await?;
        let mut sold = 0;

        for row in due {
            let worker_id = uuid::Uuid::new_v4();
            if !self.purchases.claim_for_sell(&row.tx_hash, worker_id).await? {
                debug!("purchase {} claimed elsewhere, skipping", row.tx_hash);
                continue;
            }

            match self.executor.execute_sell(&row).await {
                Ok(sell_tx) => {
                    if self.purchases.mark_sold(&row.tx_hash, &sell_tx).await? {
                        info!("purchase {} sold in {}", row.tx_hash, sell_tx);
                        sold += 1;
                    }
                }
                Err(e) => {
                    warn!("auto-sell of {} failed: {}", row.tx_hash, e);
                    if !self
                        .purchases
                        .release_claim(&row.tx_hash, &e.to_string())
                        .await?
                    {
                        error!("could not release the claim on {}", row.tx_hash);
                    }
                }
            }
        }

        Ok(sold)
    }
}
