use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::engine::EngineError;
use crate::health::{HealthRecord, HealthSummary};
use crate::provider::ProviderId;
use crate::routing::strategy::normalize_currency;
use crate::routing::{OperationType, RoutingDecision, RoutingStrategy};

/// Error body returned by every failing handler.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: message.into(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        let status = match e {
            EngineError::UnknownProvider(_) => StatusCode::NOT_FOUND,
            EngineError::Strategy(_) | EngineError::ZeroInterval => StatusCode::BAD_REQUEST,
            EngineError::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            error: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub providers: usize,
    pub strategies: usize,
    pub monitoring: bool,
    pub monitoring_interval_ms: Option<u64>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let interval = state.engine.monitoring_interval().await;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        providers: state.engine.store().providers().len(),
        strategies: state.engine.list_strategies().len(),
        monitoring: interval.is_some(),
        monitoring_interval_ms: interval.map(|i| i.as_millis() as u64),
    })
}

pub async fn get_providers(State(state): State<AdminState>) -> Json<BTreeMap<ProviderId, HealthRecord>> {
    Json(state.engine.get_health_status())
}

pub async fn get_summary(State(state): State<AdminState>) -> Json<HealthSummary> {
    Json(state.engine.get_health_summary())
}

pub async fn check_provider(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<HealthRecord>, ApiError> {
    let record = state.engine.force_health_check(&ProviderId::new(id)).await?;
    Ok(Json(record))
}

pub async fn reset_provider(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<Json<HealthRecord>, ApiError> {
    let record = state.engine.reset_circuit_breaker(&ProviderId::new(id))?;
    Ok(Json(record))
}

pub async fn list_strategies(State(state): State<AdminState>) -> Json<BTreeMap<String, RoutingStrategy>> {
    Json(state.engine.list_strategies())
}

pub async fn get_strategy(
    State(state): State<AdminState>,
    Path(currency): Path<String>,
) -> Result<Json<RoutingStrategy>, ApiError> {
    state
        .engine
        .get_routing_strategy(&currency)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no routing strategy for '{}'", currency)))
}

#[derive(Serialize)]
pub struct StrategyUpdate {
    pub currency: String,
    pub previous: Option<RoutingStrategy>,
}

pub async fn put_strategy(
    State(state): State<AdminState>,
    Path(currency): Path<String>,
    Json(strategy): Json<RoutingStrategy>,
) -> Result<Json<StrategyUpdate>, ApiError> {
    let previous = state.engine.update_routing_strategy(&currency, strategy)?;
    Ok(Json(StrategyUpdate {
        currency: normalize_currency(&currency),
        previous,
    }))
}

pub async fn delete_strategy(
    State(state): State<AdminState>,
    Path(currency): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.engine.remove_routing_strategy(&currency) {
        Some(_) => Ok(StatusCode::NO_CONTENT),
        None => Err(ApiError::not_found(format!("no routing strategy for '{}'", currency))),
    }
}

#[derive(Deserialize)]
pub struct RouteQuery {
    pub currency: String,
    #[serde(default)]
    pub amount: u64,
    #[serde(default)]
    pub operation: OperationType,
}

/// Preview a routing decision without executing anything.
pub async fn preview_route(
    State(state): State<AdminState>,
    Query(query): Query<RouteQuery>,
) -> Json<RoutingDecision> {
    Json(
        state
            .engine
            .select_provider(&query.currency, query.amount, query.operation),
    )
}

#[derive(Deserialize)]
pub struct StartMonitoring {
    pub interval_ms: u64,
}

#[derive(Serialize)]
pub struct MonitoringState {
    pub monitoring: bool,
    pub interval_ms: Option<u64>,
}

pub async fn start_monitoring(
    State(state): State<AdminState>,
    Json(body): Json<StartMonitoring>,
) -> Result<Json<MonitoringState>, ApiError> {
    state
        .engine
        .start_health_monitoring(Duration::from_millis(body.interval_ms))
        .await?;
    Ok(Json(MonitoringState {
        monitoring: true,
        interval_ms: Some(body.interval_ms),
    }))
}

pub async fn stop_monitoring(State(state): State<AdminState>) -> Json<MonitoringState> {
    state.engine.stop_health_monitoring().await;
    Json(MonitoringState {
        monitoring: false,
        interval_ms: None,
    })
}
