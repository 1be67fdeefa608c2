use axum::extract::{Path, State};
use axum::Json;

use crate::error::Result;
use crate::services::portfolio_service::Portfolio;

use super::AppState;

pub async fn get_portfolio(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Portfolio>> {
    let portfolio = state.portfolio_service.get_portfolio(&address).await?;

    Ok(Json(portfolio))
}
