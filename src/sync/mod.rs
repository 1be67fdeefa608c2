pub mod batches;
pub mod checkpoint;
pub mod job_runner;
pub mod manager;
pub mod mediator;
pub mod store;

pub use batches::{ChainProgress, JobQueue, PageRange, WorkerChainBuilder, CATALOG_CHAIN};
pub use checkpoint::{CheckpointStore, SyncCheckpoint};
pub use job_runner::SyncJobRunner;
pub use manager::{SyncPhase, SyncProgress, TokenSyncManager};
pub use mediator::{InitializeAction, LoadType, MediatorResult, TokenRemoteMediator};
pub use store::{PageKey, TokenStore};
