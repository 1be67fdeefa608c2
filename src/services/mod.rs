pub mod portfolio_service;
pub mod purchase_service;
pub mod swap_service;

pub use portfolio_service::{PortfolioService, TokenReader};
pub use purchase_service::{PurchaseService, PurchaseStore};
pub use swap_service::{SellExecutor, SwapService};
