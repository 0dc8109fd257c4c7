//! Admin API driven in-process.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use railswitch::admin::setup_admin_router;
use railswitch::clock::ManualClock;
use railswitch::config::{parse_config, AdminConfig};
use railswitch::provider::{HttpProviderClient, ProviderClient, ProviderId};
use railswitch::routing::FixedRandom;
use railswitch::RoutingEngine;

mod common;

const KEY: &str = "test-admin-key";

async fn app() -> (Router, Arc<RoutingEngine>) {
    let up = common::start_mock_provider(200).await;
    let config = parse_config(&format!(
        r#"
        [[providers]]
        id = "mtn_ug"
        base_url = "http://{up}"

        [[providers]]
        id = "airtel_ug"
        base_url = "http://{up}"

        [[routing]]
        currency = "UGX"
        primary = "mtn_ug"
        backup = "airtel_ug"

        [defaults]
        provider = "mtn_ug"
        "#
    ))
    .unwrap();
    let clients: Vec<Arc<dyn ProviderClient>> = config
        .providers
        .iter()
        .map(|p| Arc::new(HttpProviderClient::from_config(p).unwrap()) as Arc<dyn ProviderClient>)
        .collect();
    let engine = Arc::new(
        RoutingEngine::new(&config, clients, Arc::new(ManualClock::new(50_000)), Arc::new(FixedRandom(0.5)))
            .unwrap(),
    );
    let admin = AdminConfig {
        enabled: true,
        api_key: KEY.to_string(),
        ..Default::default()
    };
    (setup_admin_router(engine.clone(), &admin), engine)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {KEY}"));
    let body = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_rejects_missing_or_wrong_token() {
    let (app, _) = app().await;
    let response = app
        .clone()
        .oneshot(Request::get("/admin/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::get("/admin/status")
                .header(header::AUTHORIZATION, "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_status_and_providers() {
    let (app, _) = app().await;
    let (status, body) = call(&app, Method::GET, "/admin/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "operational");
    assert_eq!(body["providers"], 2);
    assert_eq!(body["monitoring"], false);

    let (status, body) = call(&app, Method::GET, "/admin/providers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mtn_ug"]["circuit_state"], "CLOSED");
    assert_eq!(body["airtel_ug"]["success_rate"], 1.0);

    let (_, body) = call(&app, Method::GET, "/admin/providers/summary", None).await;
    assert_eq!(body["healthy"], json!(["airtel_ug", "mtn_ug"]));
}

#[tokio::test]
async fn test_check_and_reset() {
    let (app, engine) = app().await;
    let (status, body) = call(&app, Method::POST, "/admin/providers/mtn_ug/check", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_attempts"], 1);

    let (status, body) = call(&app, Method::POST, "/admin/providers/ghost/check", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("ghost"));

    let mtn = ProviderId::new("mtn_ug");
    for _ in 0..5 {
        engine.record_attempt(&mtn, false, 10.0, Some("timeout".into()));
    }
    let (status, body) = call(&app, Method::POST, "/admin/providers/mtn_ug/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["circuit_state"], "CLOSED");
    assert_eq!(body["consecutive_failures"], 0);
}

#[tokio::test]
async fn test_strategy_crud_and_route_preview() {
    let (app, _) = app().await;

    let (status, body) = call(
        &app,
        Method::PUT,
        "/admin/routing/tzs",
        Some(json!({"primary": "airtel_ug", "backup": "mtn_ug", "preference_score": 0.9})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currency"], "TZS");
    assert_eq!(body["previous"], Value::Null);

    let (status, _) = call(
        &app,
        Method::PUT,
        "/admin/routing/TZS",
        Some(json!({"primary": "mtn_ug", "backup": "mtn_ug", "preference_score": 0.9})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = call(&app, Method::GET, "/admin/routing", None).await;
    assert_eq!(body.as_object().unwrap().len(), 2);

    let (status, body) = call(&app, Method::GET, "/admin/route?currency=tzs&amount=5000&operation=payout", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provider"], "airtel_ug");
    assert_eq!(body["operation"], "payout");
    assert_eq!(body["amount"], 5000);
    assert_eq!(body["is_backup"], false);

    let (status, _) = call(&app, Method::DELETE, "/admin/routing/TZS", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, Method::DELETE, "/admin/routing/TZS", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = call(&app, Method::GET, "/admin/route?currency=TZS", None).await;
    assert_eq!(body["provider"], "mtn_ug");
    assert_eq!(body["reason"], "default provider for currency");
}

#[tokio::test]
async fn test_monitoring_start_stop() {
    let (app, engine) = app().await;

    let (status, _) = call(&app, Method::POST, "/admin/monitoring/start", Some(json!({"interval_ms": 0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        Method::POST,
        "/admin/monitoring/start",
        Some(json!({"interval_ms": 60000})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["monitoring"], true);
    assert!(engine.monitoring_interval().await.is_some());

    let (_, body) = call(&app, Method::GET, "/admin/status", None).await;
    assert_eq!(body["monitoring_interval_ms"], 60000);

    let (status, body) = call(&app, Method::POST, "/admin/monitoring/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["monitoring"], false);
    assert!(engine.monitoring_interval().await.is_none());
}

#[tokio::test]
async fn test_slow_request_times_out() {
    let slow = common::start_slow_backend(Duration::from_secs(3)).await;
    let config = parse_config(&format!(
        r#"
        [[providers]]
        id = "orange_ci"
        base_url = "http://{slow}"
        timeout_ms = 10000

        [defaults]
        provider = "orange_ci"
        "#
    ))
    .unwrap();
    let clients: Vec<Arc<dyn ProviderClient>> = vec![Arc::new(
        HttpProviderClient::from_config(&config.providers[0]).unwrap(),
    )];
    let engine = Arc::new(
        RoutingEngine::new(&config, clients, Arc::new(ManualClock::new(0)), Arc::new(FixedRandom(0.5)))
            .unwrap(),
    );
    let admin = AdminConfig {
        enabled: true,
        api_key: KEY.to_string(),
        request_timeout_secs: 1,
        ..Default::default()
    };
    let app = setup_admin_router(engine, &admin);

    let (status, _) = call(&app, Method::POST, "/admin/providers/orange_ci/check", None).await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
}
