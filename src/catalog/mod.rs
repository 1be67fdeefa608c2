use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod client;

pub use client::CatalogClient;

/// One token as the catalog API describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogToken {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub is_verified: bool,
    pub is_whitelisted: bool,
    pub is_honeypot: bool,
    pub has_transfer_fee: bool,
    pub tax: Option<f64>,
    pub total_tvl: Option<f64>,
    pub pool_count: i32,
    pub rank: Option<i32>,
    pub volume_rank: Option<i32>,
    pub logo_url: Option<String>,
}

impl CatalogToken {
    /// The catalog occasionally returns placeholder rows with empty
    /// names; those are dropped before caching.
    pub fn is_usable(&self) -> bool {
        !self.name.trim().is_empty() && !self.symbol.trim().is_empty()
    }
}

/// One page of the catalog.
#[derive(Debug, Clone)]
pub struct TokensPage {
    pub tokens: Vec<CatalogToken>,
    pub page: u32,
    /// Total page count as reported by the API, when it reports one.
    pub total_pages: Option<u32>,
}

/// Paged access to the token catalog.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<TokensPage>;
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::error::AppError;

    use super::*;

    pub fn sample_token(address: &str, rank: i32) -> CatalogToken {
        CatalogToken {
            address: address.to_string(),
            name: format!("Token {}", rank),
            symbol: format!("TK{}", rank),
            decimals: 18,
            is_verified: false,
            is_whitelisted: false,
            is_honeypot: false,
            has_transfer_fee: false,
            tax: None,
            total_tvl: None,
            pool_count: 0,
            rank: Some(rank),
            volume_rank: None,
            logo_url: None,
        }
    }

    enum PageScript {
        Tokens(Vec<CatalogToken>),
        Fail(String),
    }

    /// `TokenSource` fake programmed page by page. Unscripted pages come
    /// back empty; every fetch is counted.
    pub struct ScriptedSource {
        pages: Mutex<HashMap<u32, PageScript>>,
        total_pages: Option<u32>,
        calls: Mutex<Vec<u32>>,
    }

    impl ScriptedSource {
        pub fn new(total_pages: Option<u32>) -> Self {
            Self {
                pages: Mutex::new(HashMap::new()),
                total_pages,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn page(self, page: u32, tokens: Vec<CatalogToken>) -> Self {
            self.pages.lock().unwrap().insert(page, PageScript::Tokens(tokens));
            self
        }

        pub fn failing_page(self, page: u32, message: &str) -> Self {
            self.pages
                .lock()
                .unwrap()
                .insert(page, PageScript::Fail(message.to_string()));
            self
        }

        /// Pages fetched so far, in order.
        pub fn fetched(&self) -> Vec<u32> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TokenSource for ScriptedSource {
        async fn fetch_page(&self, page: u32, _page_size: u32) -> Result<TokensPage> {
            self.calls.lock().unwrap().push(page);
            match self.pages.lock().unwrap().get(&page) {
                Some(PageScript::Tokens(tokens)) => Ok(TokensPage {
                    tokens: tokens.clone(),
                    page,
                    total_pages: self.total_pages,
                }),
                Some(PageScript::Fail(message)) => Err(AppError::TokenSource(message.clone())),
                None => Ok(TokensPage {
                    tokens: Vec::new(),
                    page,
                    total_pages: self.total_pages,
                }),
            }
        }
    }
}
