use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")] Database(#[from] sea_orm::DbErr),

    #[error("Invalid input: {0}")] InvalidInput(String),

    #[error("Token not found")]
    TokenNotFound,

    #[error("Purchase not found")]
    PurchaseNotFound,

    #[error("RPC error: {0}")] Rpc(String),

    #[error("Router error: {0}")] Router(String),

    #[error("Token source error: {0}")] TokenSource(String),

    #[error("Explorer error: {0}")] Explorer(String),

    #[error("Signer error: {0}")] Signer(String),

    #[error("Insufficient balance: have {have}, need {need}")] InsufficientBalance {
        have: String,
        need: String,
    },

    #[error("Invalid address")]
    InvalidAddress,

    #[error("Quote expired")]
    QuoteExpired,

    #[error("Simulation reverted: {0}")] SimulationReverted(String),

    #[error("Sync already running")]
    SyncInProgress,

    #[error("Timeout: {0}")] Timeout(String),

    #[error("Configuration error: {0}")] Config(String),

    #[error("Internal error: {0}")] Internal(String),
}

#[derive(serde::Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(serde::Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    pub fn to_error_response(&self) -> ErrorResponse {
        let (code, message, field) = match self {
            AppError::Database(e) => ("DATABASE_ERROR", e.to_string(), None),
            AppError::InvalidInput(msg) => ("INVALID_INPUT", msg.clone(), None),
            AppError::TokenNotFound => ("TOKEN_NOT_FOUND", "Token not found".to_string(), None),
            AppError::PurchaseNotFound =>
                ("PURCHASE_NOT_FOUND", "Purchase not found".to_string(), None),
            AppError::Rpc(msg) => ("RPC_ERROR", msg.clone(), None),
            AppError::Router(msg) => ("ROUTER_ERROR", msg.clone(), None),
            AppError::TokenSource(msg) => ("TOKEN_SOURCE_ERROR", msg.clone(), None),
            AppError::Explorer(msg) => ("EXPLORER_ERROR", msg.clone(), None),
            AppError::Signer(msg) => ("SIGNER_ERROR", msg.clone(), None),
            AppError::InsufficientBalance { have, need } =>
                (
                    "INSUFFICIENT_BALANCE",
                    format!("Insufficient balance: have {}, need {}", have, need),
                    None,
                ),
            AppError::InvalidAddress =>
                (
                    "INVALID_ADDRESS",
                    "Invalid address format".to_string(),
                    Some("address".to_string()),
                ),
            AppError::QuoteExpired =>
                ("QUOTE_EXPIRED", "Quote expired, request a new one".to_string(), None),
            AppError::SimulationReverted(msg) => ("SIMULATION_REVERTED", msg.clone(), None),
            AppError::SyncInProgress =>
                ("SYNC_IN_PROGRESS", "A catalog sync is already running".to_string(), None),
            AppError::Timeout(msg) => ("TIMEOUT", msg.clone(), None),
            AppError::Config(msg) => ("CONFIG_ERROR", msg.clone(), None),
            AppError::Internal(msg) => ("INTERNAL_ERROR", msg.clone(), None),
        };

        ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                field,
            },
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::TokenNotFound | AppError::PurchaseNotFound => {
                axum::http::StatusCode::NOT_FOUND
            }
            | AppError::InvalidInput(_)
            | AppError::InvalidAddress
            | AppError::InsufficientBalance { .. }
            | AppError::QuoteExpired => {
                axum::http::StatusCode::BAD_REQUEST
            }
            AppError::SimulationReverted(_) => axum::http::StatusCode::UNPROCESSABLE_ENTITY,
            AppError::SyncInProgress => axum::http::StatusCode::CONFLICT,
            | AppError::Rpc(_)
            | AppError::Router(_)
            | AppError::TokenSource(_)
            | AppError::Explorer(_) => axum::http::StatusCode::BAD_GATEWAY,
            AppError::Timeout(_) => axum::http::StatusCode::GATEWAY_TIMEOUT,
            _ => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        };

        let response = self.to_error_response();
        (status, axum::Json(response)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
