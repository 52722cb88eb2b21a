//! Request handlers for the API endpoints.
//!
//! Every handler runs the engine on a blocking worker under the server
//! timeout. When the timeout fires the request's cancellation token is
//! triggered so the sweep stops at its next candidate.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Serialize;
use tracing::warn;

use super::AppState;
use super::types::{ApiError, SensitivityRequest};
use crate::error::Result;
use crate::finance::{self, EconomicsRequest, FinancialResult, SensitivityReport};
use crate::optimize::{
    self, AnalyzeRequest, AnalyzeResponse, CancelToken, SeasonalityRequest, SeasonalityResponse,
};
use crate::scoring::{self, ScoringRequest, ScoringResponse};
use crate::solar::production::{GeneratedProfile, ProfileRequest, generate_profile};

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> std::result::Result<T, ApiError> {
    payload
        .map(|Json(v)| v)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

async fn run_blocking<T, F>(state: &AppState, job: F) -> ApiResult<T>
where
    T: Serialize + Send + 'static,
    F: FnOnce(CancelToken) -> Result<T> + Send + 'static,
{
    let cancel = CancelToken::new();
    let worker_token = cancel.clone();
    let task = tokio::task::spawn_blocking(move || job(worker_token));

    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(result)) => result.map(Json).map_err(ApiError::from),
        Ok(Err(join)) => Err(ApiError::Internal(join.to_string())),
        Err(_) => {
            cancel.cancel();
            warn!(
                timeout_ms = state.request_timeout.as_millis() as u64,
                "request timed out, cancelling worker"
            );
            Err(ApiError::Timeout)
        }
    }
}

/// `POST /profile` → 200 + `GeneratedProfile` JSON
pub async fn post_profile(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ProfileRequest>, JsonRejection>,
) -> ApiResult<GeneratedProfile> {
    let request = body(payload)?;
    run_blocking(&state, move |_| generate_profile(&request)).await
}

/// `POST /analyze` → 200 + `{scenarios, key_variants}` JSON
pub async fn post_analyze(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<AnalyzeResponse> {
    let request = body(payload)?;
    run_blocking(&state, move |cancel| optimize::analyze(&request, &cancel)).await
}

/// `POST /seasonality` → 200 + `SeasonalityResponse` JSON
pub async fn post_seasonality(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<SeasonalityRequest>, JsonRejection>,
) -> ApiResult<SeasonalityResponse> {
    let request = body(payload)?;
    run_blocking(&state, move |cancel| {
        optimize::optimize_seasonality(&request, &cancel)
    })
    .await
}

/// `POST /economics/analyze` → 200 + `FinancialResult` JSON
pub async fn post_economics(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<EconomicsRequest>, JsonRejection>,
) -> ApiResult<FinancialResult> {
    let request = body(payload)?;
    run_blocking(&state, move |_| finance::analyze(&request)).await
}

/// `POST /economics/sensitivity` → 200 + tornado data JSON
pub async fn post_sensitivity(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<SensitivityRequest>, JsonRejection>,
) -> ApiResult<SensitivityReport> {
    let request = body(payload)?;
    run_blocking(&state, move |_| {
        finance::comprehensive_sensitivity(
            &request.base_request,
            &request.parameters_to_analyze,
            request.variation_range_pct,
        )
    })
    .await
}

/// `POST /scoring/analyze` → 200 + ranked results JSON
pub async fn post_scoring(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ScoringRequest>, JsonRejection>,
) -> ApiResult<ScoringResponse> {
    let request = body(payload)?;
    run_blocking(&state, move |_| scoring::analyze(&request)).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::util::ServiceExt;

    use super::*;
    use crate::api::router;
    use crate::series::{HOURS_PER_YEAR, TimeSeries};

    fn state(timeout: Duration) -> Arc<AppState> {
        Arc::new(AppState {
            request_timeout: timeout,
        })
    }

    async fn post(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn consumption() -> Value {
        let series = TimeSeries::for_year(2023, vec![50.0; HOURS_PER_YEAR]).unwrap();
        serde_json::to_value(series).unwrap()
    }

    #[tokio::test]
    async fn profile_returns_full_year() {
        let app = router(state(Duration::from_secs(30)));
        let (status, json) = post(
            app,
            "/profile",
            json!({"pv_type": "ground_south", "latitude": 52.0, "yield_target": 1000.0}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["profile"]["values"].as_array().map(Vec::len), Some(HOURS_PER_YEAR));
        let specific = json["specific_yield_kwh_per_kwp"].as_f64().unwrap();
        assert!((specific - 1000.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn analyze_returns_variants() {
        let app = router(state(Duration::from_secs(60)));
        let (status, json) = post(
            app,
            "/analyze",
            json!({
                "consumption": consumption(),
                "capacity": {"min_kwp": 0.0, "max_kwp": 300.0, "step_kwp": 50.0},
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["scenarios"].as_array().map(Vec::len), Some(7));
        assert!(json["key_variants"]["A"].is_object());
    }

    #[tokio::test]
    async fn input_error_returns_400_with_field() {
        let app = router(state(Duration::from_secs(60)));
        let (status, json) = post(
            app,
            "/analyze",
            json!({
                "consumption": consumption(),
                "capacity": {"min_kwp": 0.0, "max_kwp": 300.0, "step_kwp": 0.0},
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["field"], "capacity_step");
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn malformed_body_returns_400() {
        let app = router(state(Duration::from_secs(5)));
        let (status, json) = post(app, "/scoring/analyze", json!({"offers": "nope"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn slow_sweep_times_out_with_504() {
        let app = router(state(Duration::from_millis(1)));
        let (status, json) = post(
            app,
            "/analyze",
            json!({
                "consumption": consumption(),
                "capacity": {"min_kwp": 0.0, "max_kwp": 20000.0, "step_kwp": 1.0},
            }),
        )
        .await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn scoring_ranks_offers() {
        let app = router(state(Duration::from_secs(5)));
        let offer = |id: &str, npv: f64| {
            json!({"id": id, "capex": 100000.0, "npv": npv, "irr": 0.1, "payback_years": 8.0})
        };
        let (status, json) = post(
            app,
            "/scoring/analyze",
            json!({"offers": [offer("a", 10000.0), offer("b", 500000.0)],
                   "parameters": {"profile": "cfo"}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["results"][0]["id"], "b");
        assert_eq!(json["results"][0]["rank"], 1);
    }
}
