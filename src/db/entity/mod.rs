pub mod token;
pub mod token_remote_key;
pub mod purchase;
pub mod sync_job;
pub mod sync_state;

pub use token::Entity as Token;
pub use token_remote_key::Entity as TokenRemoteKey;
pub use purchase::Entity as Purchase;
pub use sync_job::Entity as SyncJob;
pub use sync_state::Entity as SyncState;
