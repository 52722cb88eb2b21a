//! API request and error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::finance::{DEFAULT_VARIATION_PCT, EconomicsRequest, SensitivityParameter};

/// Error body: `{"error": "...", "field": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Offending request field for input errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

fn default_variation() -> f64 {
    DEFAULT_VARIATION_PCT
}

/// Body of `POST /economics/sensitivity`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensitivityRequest {
    pub base_request: EconomicsRequest,
    /// Every parameter when empty.
    #[serde(default)]
    pub parameters_to_analyze: Vec<SensitivityParameter>,
    #[serde(default = "default_variation")]
    pub variation_range_pct: f64,
}

/// Failure of one API call.
#[derive(Debug)]
pub enum ApiError {
    /// Body could not be parsed.
    BadRequest(String),
    /// Engine rejected or failed the request.
    Engine(EngineError),
    /// The request exceeded the server timeout; its sweep was cancelled.
    Timeout,
    /// The worker panicked or was aborted.
    Internal(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, field) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Engine(err) => {
                let status = match err {
                    EngineError::Input { .. } => StatusCode::BAD_REQUEST,
                    EngineError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
                    EngineError::Io(_) | EngineError::Csv(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let field = err.field().map(str::to_string);
                (status, err.to_string(), field)
            }
            ApiError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "request timed out".to_string(),
                None,
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
        };
        (status, Json(ErrorResponse { error, field })).into_response()
    }
}
