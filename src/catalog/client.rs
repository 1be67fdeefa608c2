use async_trait::async_trait;
use serde::Deserialize;

use crate::catalog::{CatalogToken, TokenSource, TokensPage};
use crate::error::{AppError, Result};

/// HTTP client for the token catalog API.
#[derive(Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
}

// ── Catalog API response types ──────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CatalogPageResponse {
    data: Vec<CatalogTokenDto>,
    page: Option<u32>,
    #[serde(rename = "totalPages")]
    total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CatalogTokenDto {
    address: String,
    name: Option<String>,
    symbol: Option<String>,
    decimals: Option<u8>,
    #[serde(rename = "isVerified", default)]
    is_verified: bool,
    #[serde(rename = "isWhitelisted", default)]
    is_whitelisted: bool,
    #[serde(rename = "isHoneypot", default)]
    is_honeypot: bool,
    #[serde(rename = "hasTransferFee", default)]
    has_transfer_fee: bool,
    tax: Option<f64>,
    #[serde(rename = "totalTvl")]
    total_tvl: Option<f64>,
    #[serde(rename = "poolCount", default)]
    pool_count: i32,
    rank: Option<i32>,
    #[serde(rename = "volumeRank")]
    volume_rank: Option<i32>,
    #[serde(rename = "logoUrl")]
    logo_url: Option<String>,
}

impl From<CatalogTokenDto> for CatalogToken {
    fn from(dto: CatalogTokenDto) -> Self {
        CatalogToken {
            address: dto.address,
            name: dto.name.unwrap_or_default(),
            symbol: dto.symbol.unwrap_or_default(),
            decimals: dto.decimals.unwrap_or(18),
            is_verified: dto.is_verified,
            is_whitelisted: dto.is_whitelisted,
            is_honeypot: dto.is_honeypot,
            has_transfer_fee: dto.has_transfer_fee,
            tax: dto.tax,
            total_tvl: dto.total_tvl,
            pool_count: dto.pool_count,
            rank: dto.rank,
            volume_rank: dto.volume_rank,
            logo_url: dto.logo_url,
        }
    }
}

// ── Implementation ──────────────────────────────────────────────────

impl CatalogClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TokenSource for CatalogClient {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<TokensPage> {
        let url = format!("{}/tokens", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("page", page), ("pageSize", page_size)])
            .send()
            .await
            .map_err(|e| AppError::TokenSource(format!("Catalog request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::TokenSource(format!(
                "Catalog returned {} for page {}",
                response.status(),
                page
            )));
        }

        let body: CatalogPageResponse = response
            .json()
            .await
            .map_err(|e| AppError::TokenSource(format!("Failed to parse catalog response: {}", e)))?;

        Ok(TokensPage {
            tokens: body.data.into_iter().map(CatalogToken::from).collect(),
            page: body.page.unwrap_or(page),
            total_pages: body.total_pages,
        })
    }
}
