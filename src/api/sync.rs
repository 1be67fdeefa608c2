use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::Result;
use crate::sync::SyncProgress;

use super::AppState;

pub async fn sync_status(State(state): State<AppState>) -> Result<Json<SyncProgress>> {
    let progress = state.sync_manager.progress().await?;

    Ok(Json(progress))
}

/// Restarts the catalog sync from scratch. Answers 409 while a sync is
/// already running.
pub async fn force_refresh(State(state): State<AppState>) -> Result<Json<RefreshResponse>> {
    state.sync_manager.force_sync().await?;

    Ok(Json(RefreshResponse { started: true }))
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub started: bool,
}
