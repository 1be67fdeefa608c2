use std::sync::Arc;

pub mod portfolio;
pub mod purchases;
pub mod swap;
pub mod sync;
pub mod tokens;

use crate::db::TokenRepository;
use crate::services::{PortfolioService, PurchaseService, SwapService};
use crate::sync::{TokenRemoteMediator, TokenSyncManager};

#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenRepository>,
    pub sync_manager: Arc<TokenSyncManager>,
    pub mediator: Arc<TokenRemoteMediator>,
    pub swap_service: Arc<SwapService>,
    pub purchase_service: Arc<PurchaseService>,
    pub portfolio_service: Arc<PortfolioService>,
}

impl AppState {
    pub fn new(
        tokens: Arc<TokenRepository>,
        sync_manager: Arc<TokenSyncManager>,
        mediator: Arc<TokenRemoteMediator>,
        swap_service: Arc<SwapService>,
        purchase_service: Arc<PurchaseService>,
        portfolio_service: Arc<PortfolioService>,
    ) -> Self {
        Self {
            tokens,
            sync_manager,
            mediator,
            swap_service,
            purchase_service,
            portfolio_service,
        }
    }
}
