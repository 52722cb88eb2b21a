#![cfg(feature = "api")]

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use common::{office_consumption, production};
use pv_sizer::api::{AppState, router};
use pv_sizer::sim::simulate;
use pv_sizer::sim::types::{CapacityScenario, ExportMode};

async fn post(uri: &str, body: Value) -> (StatusCode, Value) {
    let app = router(Arc::new(AppState::default()));
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

fn economics_body() -> Value {
    let prod = production(150.0);
    let cons = office_consumption(60.0, 20.0);
    let result = simulate(&prod, &cons, None, ExportMode::Allowed).unwrap();
    json!({
        "scenario": CapacityScenario::pv_only(150.0, 1.2),
        "result": result,
    })
}

#[tokio::test]
async fn economics_analyze_returns_cash_flows() {
    let (status, json) = post("/economics/analyze", economics_body()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cash_flows"].as_array().map(Vec::len), Some(26));
    assert!(json["capex"].as_f64().unwrap() > 0.0);
    assert!(json["irr"]["status"].is_string());
}

#[tokio::test]
async fn sensitivity_returns_sorted_tornado() {
    let (status, json) = post(
        "/economics/sensitivity",
        json!({
            "base_request": economics_body(),
            "parameters_to_analyze": ["energy_price", "capex"],
            "variation_range_pct": 10.0,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let bars = json["bars"].as_array().unwrap();
    assert_eq!(bars.len(), 2);
    let first = bars[0]["impact"].as_f64().unwrap();
    let second = bars[1]["impact"].as_f64().unwrap();
    assert!(first >= second);
}

#[tokio::test]
async fn seasonality_picks_a_configuration() {
    let consumption = serde_json::to_value(office_consumption(60.0, 20.0)).unwrap();
    let (status, json) = post(
        "/seasonality",
        json!({
            "consumption": consumption,
            "capacity": {"min_kwp": 50.0, "max_kwp": 150.0, "step_kwp": 50.0},
            "band_powers_kw": {"high": 80.0, "mid": 60.0, "low": 40.0},
            "scalers": [0.5, 1.0],
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["bands"].as_array().map(Vec::len), Some(12));
    assert_eq!(json["all_configurations"].as_array().map(Vec::len), Some(24));
    assert_eq!(json["variant"]["kind"], "SEASONALITY");
}

#[tokio::test]
async fn seasonality_npv_without_finance_is_rejected() {
    let consumption = serde_json::to_value(office_consumption(60.0, 20.0)).unwrap();
    let (status, json) = post(
        "/seasonality",
        json!({
            "consumption": consumption,
            "capacity": {"min_kwp": 50.0, "max_kwp": 150.0, "step_kwp": 50.0},
            "band_powers_kw": {"high": 80.0, "mid": 60.0, "low": 40.0},
            "objective": "npv",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["field"], "finance");
}
