//! Operator admin API.
//!
//! Every route sits under `/admin` behind bearer-token auth.

pub mod auth;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::config::AdminConfig;
use crate::engine::RoutingEngine;

/// Shared handler state.
#[derive(Clone)]
pub struct AdminState {
    pub engine: Arc<RoutingEngine>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(engine: Arc<RoutingEngine>, api_key: &str) -> Self {
        Self {
            engine,
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(engine: Arc<RoutingEngine>, config: &AdminConfig) -> Router {
    let state = AdminState::new(engine, &config.api_key);
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/providers", get(get_providers))
        .route("/admin/providers/summary", get(get_summary))
        .route("/admin/providers/{id}/check", post(check_provider))
        .route("/admin/providers/{id}/reset", post(reset_provider))
        .route("/admin/routing", get(list_strategies))
        .route(
            "/admin/routing/{currency}",
            get(get_strategy).put(put_strategy).delete(delete_strategy),
        )
        .route("/admin/route", get(preview_route))
        .route("/admin/monitoring/start", post(start_monitoring))
        .route("/admin/monitoring/stop", post(stop_monitoring))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(TraceLayer::new_for_http())
}
