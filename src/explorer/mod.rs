use async_trait::async_trait;

use crate::error::Result;

pub mod client;
pub mod gate;

pub use client::ExplorerClient;
pub use gate::CallGate;

/// What the explorer knows about a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Confirmed,
    Reverted,
    /// Not yet indexed; ask again later.
    Unknown,
}

/// Receipt status lookups, fakeable for tests.
#[async_trait]
pub trait ReceiptStatusSource: Send + Sync {
    async fn receipt_status(&self, tx_hash: &str) -> Result<TxOutcome>;
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::error::AppError;

    use super::*;

    /// Scripted `ReceiptStatusSource`. Unscripted hashes answer `Unknown`,
    /// like an explorer that has not indexed the transaction yet.
    #[derive(Default)]
    pub struct ScriptedReceiptSource {
        outcomes: Mutex<HashMap<String, TxOutcome>>,
        errors: Mutex<HashMap<String, String>>,
        queried: Mutex<Vec<String>>,
    }

    impl ScriptedReceiptSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_outcome(&self, tx_hash: &str, outcome: TxOutcome) {
            self.outcomes.lock().unwrap().insert(tx_hash.to_string(), outcome);
        }

        pub fn fail_for(&self, tx_hash: &str, message: &str) {
            self.errors
                .lock()
                .unwrap()
                .insert(tx_hash.to_string(), message.to_string());
        }

        pub fn queried(&self) -> Vec<String> {
            self.queried.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReceiptStatusSource for ScriptedReceiptSource {
        async fn receipt_status(&self, tx_hash: &str) -> Result<TxOutcome> {
            self.queried.lock().unwrap().push(tx_hash.to_string());
            if let Some(message) = self.errors.lock().unwrap().get(tx_hash) {
                return Err(AppError::Explorer(message.clone()));
            }
            Ok(self
                .outcomes
                .lock()
                .unwrap()
                .get(tx_hash)
                .copied()
                .unwrap_or(TxOutcome::Unknown))
        }
    }
}
