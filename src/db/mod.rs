pub mod entity;
pub use entity::*;

mod token_repository;
pub use token_repository::TokenRepository;

mod purchase_repository;
pub use purchase_repository::PurchaseRepository;

mod sync_job_repository;
pub use sync_job_repository::SyncJobRepository;

mod sync_state_repository;
pub use sync_state_repository::SyncStateRepository;
