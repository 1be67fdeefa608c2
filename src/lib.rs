pub mod config;
pub mod enums;
pub mod error;
pub mod db;
pub mod providers;
pub mod chain;
pub mod catalog;
pub mod dex;
pub mod explorer;
pub mod swap;
pub mod sync;
pub mod services;
pub mod api;
pub mod auto_seller;
pub mod confirmation_watcher;

pub use config::Config;
pub use enums::{PurchaseStatus, SyncJobKind, SyncJobStatus};
pub use error::{AppError, Result};
