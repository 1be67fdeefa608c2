use axum::extract::State;
use axum::Json;

use crate::error::Result;
use crate::services::swap_service::{QuoteRequest, QuoteResponse, SwapReceipt, SwapRequest};

use super::AppState;

pub async fn get_quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<QuoteResponse>> {
    let response = state.swap_service.get_quote(request).await?;

    Ok(Json(response))
}

pub async fn execute_swap(
    State(state): State<AppState>,
    Json(request): Json<SwapRequest>,
) -> Result<Json<SwapReceipt>> {
    let receipt = state.swap_service.execute_swap(request).await?;

    Ok(Json(receipt))
}
