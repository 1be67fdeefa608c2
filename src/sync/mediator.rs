use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::catalog::{CatalogToken, TokenSource};
use crate::config::SyncSettings;
use crate::error::{AppError, Result};
use crate::sync::checkpoint::CheckpointStore;
use crate::sync::store::TokenStore;

/// Which edge of the cached list a caller wants extended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadType {
    Refresh { anchor: Option<String> },
    Prepend,
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializeAction {
    LaunchInitialRefresh,
    SkipInitialRefresh,
}

/// Terminal outcome of a mediator load. Failures travel as values so a
/// paging caller can render them instead of unwinding.
#[derive(Debug)]
pub enum MediatorResult {
    Success { end_of_pagination: bool },
    Error(AppError),
}

/// Page-at-a-time gateway between the catalog and the local cache. Keeps
/// per-row remote keys so prepend/append loads know which page sits beyond
/// either edge without refetching.
pub struct TokenRemoteMediator {
    settings: SyncSettings,
    source: Arc<dyn TokenSource>,
    store: Arc<dyn TokenStore>,
    checkpoints: Arc<dyn CheckpointStore>,
}

impl TokenRemoteMediator {
    pub fn new(
        settings: SyncSettings,
        source: Arc<dyn TokenSource>,
        store: Arc<dyn TokenStore>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self { settings, source, store, checkpoints }
    }

    /// Skips the initial refresh while the cached keys are younger than
    /// the mediator TTL. An empty cache always refreshes.
    pub async fn initialize(&self) -> Result<InitializeAction> {
        let Some(oldest) = self.store.oldest_key_created_at().await? else {
            return Ok(InitializeAction::LaunchInitialRefresh);
        };
        let age = Utc::now() - oldest;
        if age > chrono::Duration::seconds(self.settings.mediator_ttl_secs) {
            Ok(InitializeAction::LaunchInitialRefresh)
        } else {
            Ok(InitializeAction::SkipInitialRefresh)
        }
    }

    pub async fn load(&self, load_type: LoadType) -> MediatorResult {
        match self.try_load(load_type).await {
            Ok(result) => result,
            Err(e) => MediatorResult::Error(e),
        }
    }

    async fn try_load(&self, load_type: LoadType) -> Result<MediatorResult> {
        let page = match &load_type {
            LoadType::Refresh { anchor } => match anchor {
                Some(address) => self
                    .store
                    .key_for(address)
                    .await?
                    .and_then(|key| key.next_page)
                    .map_or(1, |next| next.saturating_sub(1).max(1)),
                None => 1,
            },
            LoadType::Prepend => {
                match self.store.first_page_key().await? {
                    // No cached rows yet: nothing to prepend before, but
                    // the list is not known to be exhausted either
                    None => return Ok(MediatorResult::Success { end_of_pagination: false }),
                    Some(key) => match key.prev_page {
                        None => return Ok(MediatorResult::Success { end_of_pagination: true }),
                        Some(prev) => prev,
                    },
                }
            }
            LoadType::Append => match self.store.last_page_key().await? {
                None => return Ok(MediatorResult::Success { end_of_pagination: false }),
                Some(key) => match key.next_page {
                    None => return Ok(MediatorResult::Success { end_of_pagination: true }),
                    Some(next) => next,
                },
            },
        };

        let fetched = self.source.fetch_page(page, self.settings.page_size).await?;
        let total_pages = fetched.total_pages.unwrap_or(self.settings.total_pages);
        let end_of_pagination = fetched.tokens.is_empty() || page >= total_pages;

        let usable: Vec<CatalogToken> =
            fetched.tokens.into_iter().filter(CatalogToken::is_usable).collect();
        let prev_page = (page > 1).then(|| page - 1);
        let next_page = (!end_of_pagination).then(|| page + 1);
        let generation = self.checkpoints.load().await?.sync_generation;

        match load_type {
            LoadType::Refresh { .. } => {
                self.store
                    .replace_all(&usable, prev_page, next_page, generation)
                    .await?;
            }
            LoadType::Prepend | LoadType::Append => {
                self.store
                    .insert_page(&usable, prev_page, next_page, generation)
                    .await?;
            }
        }

        debug!(
            "mediator loaded page {} ({} rows, end_of_pagination={})",
            page,
            usable.len(),
            end_of_pagination
        );
        Ok(MediatorResult::Success { end_of_pagination })
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::testing::{sample_token, ScriptedSource};
    use crate::sync::checkpoint::memory::MemoryCheckpointStore;
    use crate::sync::store::memory::MemoryTokenStore;
    use crate::sync::store::PageKey;

    use super::*;

    fn test_settings() -> SyncSettings {
        SyncSettings {
            catalog_api_url: "http://catalog.test".to_string(),
            total_pages: 3218,
            page_size: 10,
            foreground_pages: 3,
            background_max_page: 7,
            pages_per_batch: 2,
            page_delay_ms: 0,
            foreground_timeout_secs: 30,
            ttl_secs: 3600,
            mediator_ttl_secs: 300,
            max_attempts: 3,
            retry_base_secs: 10,
            job_poll_secs: 1,
        }
    }

    struct Fixture {
        source: Arc<ScriptedSource>,
        store: Arc<MemoryTokenStore>,
        mediator: TokenRemoteMediator,
    }

    fn fixture(source: ScriptedSource) -> Fixture {
        let source = Arc::new(source);
        let store = Arc::new(MemoryTokenStore::new());
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let mediator =
            TokenRemoteMediator::new(test_settings(), source.clone(), store.clone(), checkpoints);
        Fixture { source, store, mediator }
    }

    fn page_tokens(page: u32, count: u32) -> Vec<CatalogToken> {
        (0..count)
            .map(|i| {
                let rank = (page * 100 + i) as i32;
                sample_token(&format!("0x{:040x}", rank), rank)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_initialize_skips_while_keys_are_fresh() {
        let f = fixture(ScriptedSource::new(None));
        assert_eq!(
            f.mediator.initialize().await.unwrap(),
            InitializeAction::LaunchInitialRefresh
        );

        f.store
            .seed_page(&page_tokens(1, 2), None, Some(2), Utc::now());
        assert_eq!(
            f.mediator.initialize().await.unwrap(),
            InitializeAction::SkipInitialRefresh
        );
    }

    #[tokio::test]
    async fn test_initialize_refreshes_when_keys_expired() {
        let f = fixture(ScriptedSource::new(None));
        f.store.seed_page(
            &page_tokens(1, 2),
            None,
            Some(2),
            Utc::now() - chrono::Duration::minutes(10),
        );
        assert_eq!(
            f.mediator.initialize().await.unwrap(),
            InitializeAction::LaunchInitialRefresh
        );
    }

    #[tokio::test]
    async fn test_refresh_replaces_the_whole_cache() {
        let f = fixture(ScriptedSource::new(None).page(1, page_tokens(1, 3)));
        f.store.seed_page(
            &page_tokens(9, 2),
            Some(8),
            Some(10),
            Utc::now() - chrono::Duration::hours(1),
        );

        let result = f.mediator.load(LoadType::Refresh { anchor: None }).await;

        assert!(matches!(
            result,
            MediatorResult::Success { end_of_pagination: false }
        ));
        assert_eq!(f.source.fetched(), vec![1]);
        assert_eq!(f.store.count().await.unwrap(), 3);
        assert_eq!(f.store.key_count(), 3);
        assert_eq!(
            f.store.first_page_key().await.unwrap(),
            Some(PageKey { prev_page: None, next_page: Some(2) })
        );
    }

    #[tokio::test]
    async fn test_refresh_starts_from_the_anchor_page() {
        let f = fixture(ScriptedSource::new(None).page(5, page_tokens(5, 2)));
        let anchored = page_tokens(5, 1);
        f.store
            .seed_page(&anchored, Some(4), Some(6), Utc::now());

        let result = f
            .mediator
            .load(LoadType::Refresh { anchor: Some(anchored[0].address.clone()) })
            .await;

        assert!(matches!(result, MediatorResult::Success { .. }));
        assert_eq!(f.source.fetched(), vec![5]);
    }

    #[tokio::test]
    async fn test_prepend_at_the_first_page_makes_no_network_call() {
        let f = fixture(ScriptedSource::new(None));
        f.store
            .seed_page(&page_tokens(1, 2), None, Some(2), Utc::now());

        let result = f.mediator.load(LoadType::Prepend).await;

        assert!(matches!(
            result,
            MediatorResult::Success { end_of_pagination: true }
        ));
        assert!(f.source.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_append_fetches_the_page_after_the_last_key() {
        let f = fixture(ScriptedSource::new(None).page(2, page_tokens(2, 2)));
        f.store
            .seed_page(&page_tokens(1, 2), None, Some(2), Utc::now());

        let result = f.mediator.load(LoadType::Append).await;

        assert!(matches!(
            result,
            MediatorResult::Success { end_of_pagination: false }
        ));
        assert_eq!(f.source.fetched(), vec![2]);
        assert_eq!(f.store.count().await.unwrap(), 4);
        assert_eq!(
            f.store.last_page_key().await.unwrap(),
            Some(PageKey { prev_page: Some(1), next_page: Some(3) })
        );
    }

    #[tokio::test]
    async fn test_append_on_the_final_page_ends_pagination() {
        let f = fixture(ScriptedSource::new(Some(2)).page(2, page_tokens(2, 2)));
        f.store
            .seed_page(&page_tokens(1, 2), None, Some(2), Utc::now());

        let result = f.mediator.load(LoadType::Append).await;

        assert!(matches!(
            result,
            MediatorResult::Success { end_of_pagination: true }
        ));
        assert_eq!(
            f.store.last_page_key().await.unwrap(),
            Some(PageKey { prev_page: Some(1), next_page: None })
        );
    }

    #[tokio::test]
    async fn test_empty_cache_edge_loads_make_no_network_call() {
        let f = fixture(ScriptedSource::new(None));

        for load_type in [LoadType::Prepend, LoadType::Append] {
            let result = f.mediator.load(load_type).await;
            assert!(matches!(
                result,
                MediatorResult::Success { end_of_pagination: false }
            ));
        }
        assert!(f.source.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_source_failure_comes_back_as_error_value() {
        let f = fixture(ScriptedSource::new(None).failing_page(1, "catalog down"));

        let result = f.mediator.load(LoadType::Refresh { anchor: None }).await;

        match result {
            MediatorResult::Error(AppError::TokenSource(message)) => {
                assert!(message.contains("catalog down"));
            }
            other => panic!("expected a token source error, got {:?}", other),
        }
    }
}
