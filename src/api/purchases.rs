use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::db::entity::purchase;
use crate::error::Result;

use super::AppState;

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 200;

#[derive(Deserialize)]
pub struct ListPurchasesQuery {
    pub wallet: String,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: u64,
}

pub async fn list_purchases(
    State(state): State<AppState>,
    Query(query): Query<ListPurchasesQuery>,
) -> Result<Json<Vec<purchase::Model>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let purchases = state
        .purchase_service
        .list_for_wallet(&query.wallet, limit, query.offset)
        .await?;

    Ok(Json(purchases))
}

pub async fn cancel_purchase(
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
) -> Result<Json<purchase::Model>> {
    let purchase = state.purchase_service.cancel(&tx_hash).await?;

    Ok(Json(purchase))
}
