use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::entity::token;
use crate::error::{AppError, Result};
use crate::sync::{InitializeAction, LoadType, MediatorResult};

use super::AppState;

const DEFAULT_PAGE_SIZE: u64 = 50;
const MAX_PAGE_SIZE: u64 = 200;

#[derive(Deserialize)]
pub struct ListTokensQuery {
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub page_size: Option<u64>,
}

/// Rank-ordered read of the local token cache.
pub async fn list_tokens(
    State(state): State<AppState>,
    Query(query): Query<ListTokensQuery>,
) -> Result<Json<TokenPage>> {
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = query.page.saturating_mul(page_size);
    let tokens = state.tokens.list_paged(page_size, offset).await?;

    Ok(Json(TokenPage {
        page: query.page,
        page_size,
        tokens,
    }))
}

#[derive(Serialize)]
pub struct TokenPage {
    pub page: u64,
    pub page_size: u64,
    pub tokens: Vec<token::Model>,
}

#[derive(Deserialize)]
pub struct LoadTokensRequest {
    pub load_type: String,
    #[serde(default)]
    pub anchor: Option<String>,
}

/// Drives the remote mediator one load at a time. The page size comes from
/// configuration, not the request.
pub async fn load_tokens(
    State(state): State<AppState>,
    Json(request): Json<LoadTokensRequest>,
) -> Result<Json<LoadTokensResponse>> {
    let load_type = match request.load_type.as_str() {
        "refresh" => LoadType::Refresh {
            anchor: request.anchor,
        },
        "prepend" => LoadType::Prepend,
        "append" => LoadType::Append,
        other => {
            return Err(AppError::InvalidInput(format!(
                "Unknown load type: {}",
                other
            )));
        }
    };

    // An anchor-less refresh is the initial load; while the cached pages
    // are younger than the mediator TTL it is served from cache alone.
    if matches!(load_type, LoadType::Refresh { anchor: None }) {
        if let InitializeAction::SkipInitialRefresh = state.mediator.initialize().await? {
            return Ok(Json(LoadTokensResponse {
                end_of_pagination: false,
            }));
        }
    }

    match state.mediator.load(load_type).await {
        MediatorResult::Success { end_of_pagination } => {
            Ok(Json(LoadTokensResponse { end_of_pagination }))
        }
        MediatorResult::Error(error) => Err(error),
    }
}

#[derive(Serialize)]
pub struct LoadTokensResponse {
    pub end_of_pagination: bool,
}
