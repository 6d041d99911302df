//! The authenticated HTTP surface for the inbound-call agent:
//!
//! - `POST /api/authenticate` verifies a carrier's operating status
//! - `GET  /api/loads` lists board loads (filtered, capped at 10)
//! - `POST /api/negotiate` runs one negotiation round
//! - `POST /api/call/result` logs a finalized call outcome
//! - `GET  /api/metrics` returns counters and recent calls
//!
//! Every route requires the `x-api-key` shared secret.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use loadline_core::config::AppConfig;
use loadline_core::{
    extract_entities, parse_amount, sentiment, CarrierId, CarrierSnapshot, DomainError, Load,
    MetricsRegistry, MetricsSnapshot, NegotiationEngine, NegotiationOutcome, RawAmount,
};
use loadline_registry::{RegistryClient, VerifyError};

use crate::catalog::{CatalogError, LoadCatalog, LoadFilter};
use crate::outcomes::{CallRecord, InMemoryOutcomeLog};

const MAX_LISTED_LOADS: usize = 10;
const RECENT_CALLS_SHOWN: usize = 10;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<AppConfig>,
    pub catalog: Arc<dyn LoadCatalog>,
    pub registry: Arc<RegistryClient>,
    pub engine: Arc<NegotiationEngine>,
    pub outcomes: Arc<InMemoryOutcomeLog>,
    pub metrics: Arc<MetricsRegistry>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid offer amount: {0}")]
    InvalidAmount(String),
    #[error("load not found: {0}")]
    LoadNotFound(String),
    #[error("carrier verification unavailable: {0}")]
    VerificationUnavailable(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("server misconfigured: {0}")]
    Misconfigured(String),
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::InvalidAmount(input) => Self::InvalidAmount(input),
            DomainError::LoadNotFound(id) => Self::LoadNotFound(id),
        }
    }
}

impl From<VerifyError> for ApiError {
    fn from(error: VerifyError) -> Self {
        Self::VerificationUnavailable(error.to_string())
    }
}

impl From<CatalogError> for ApiError {
    fn from(error: CatalogError) -> Self {
        // A broken board file is an operator problem, not a caller problem.
        Self::Misconfigured(error.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidAmount(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::LoadNotFound(_) => StatusCode::NOT_FOUND,
            Self::VerificationUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Misconfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/authenticate", post(authenticate))
        .route("/api/loads", get(list_loads))
        .route("/api/negotiate", post(negotiate))
        .route("/api/call/result", post(call_result))
        .route("/api/metrics", get(metrics))
        .with_state(state)
}

fn require_api_key(headers: &HeaderMap, state: &ApiState) -> Result<(), ApiError> {
    let Some(expected) = &state.config.auth.api_key else {
        return Err(ApiError::Misconfigured("auth.api_key is not configured".to_string()));
    };
    let provided = headers.get("x-api-key").and_then(|value| value.to_str().ok());
    match provided {
        Some(value) if value == expected.expose_secret() => Ok(()),
        _ => {
            state.metrics.record_auth_failure();
            Err(ApiError::Unauthorized("invalid x-api-key".to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthenticateRequest {
    mc_number: String,
}

#[derive(Debug, Serialize)]
struct AuthenticateResponse {
    eligible: bool,
    carrier: CarrierSnapshot,
}

async fn authenticate(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(payload): Json<AuthenticateRequest>,
) -> Result<Json<AuthenticateResponse>, ApiError> {
    require_api_key(&headers, &state)?;
    state.metrics.record_call();

    let snapshot = state.registry.verify(&payload.mc_number).await?;
    let eligible = snapshot.eligible();
    info!(
        mc_number = %payload.mc_number.trim(),
        eligible,
        provenance = ?snapshot.provenance,
        "carrier authenticated"
    );
    Ok(Json(AuthenticateResponse { eligible, carrier: snapshot }))
}

async fn list_loads(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(filter): Query<LoadFilter>,
) -> Result<Json<Vec<Load>>, ApiError> {
    require_api_key(&headers, &state)?;

    let mut loads = state.catalog.list(&filter)?;
    loads.truncate(MAX_LISTED_LOADS);
    Ok(Json(loads))
}

#[derive(Debug, Deserialize)]
struct NegotiateRequest {
    mc_number: String,
    load_id: String,
    offer: RawAmount,
}

async fn negotiate(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(payload): Json<NegotiateRequest>,
) -> Result<Json<NegotiationOutcome>, ApiError> {
    require_api_key(&headers, &state)?;

    // Resolve the load first: an unknown id must never create state.
    let load = state
        .catalog
        .get(&payload.load_id)?
        .ok_or_else(|| ApiError::LoadNotFound(payload.load_id.trim().to_string()))?;

    let carrier_id = CarrierId(payload.mc_number.trim().to_string());
    let outcome = state.engine.negotiate(&carrier_id, &load.load_id, &payload.offer, &load)?;
    info!(
        mc_number = %carrier_id.0,
        load_id = %load.load_id.0,
        accepted = outcome.accepted,
        round = outcome.round,
        "negotiation round processed"
    );
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct CallResultRequest {
    transcript: String,
    #[serde(default)]
    mc_number: Option<String>,
    #[serde(default)]
    load_id: Option<String>,
    #[serde(default)]
    final_price: Option<RawAmount>,
    #[serde(default)]
    accepted: Option<bool>,
}

#[derive(Debug, Serialize)]
struct CallResultResponse {
    ok: bool,
    summary: CallRecord,
}

async fn call_result(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(payload): Json<CallResultRequest>,
) -> Result<Json<CallResultResponse>, ApiError> {
    require_api_key(&headers, &state)?;

    let entities = extract_entities(&payload.transcript);
    let call_sentiment = sentiment(&payload.transcript);

    // Explicit fields win; extraction only fills gaps. An unparseable final
    // price downgrades to none rather than blocking the log.
    let final_price =
        payload.final_price.as_ref().and_then(|raw| parse_amount(raw).ok());
    let mc_number = payload.mc_number.or_else(|| entities.mc_number.clone());
    let load_id = payload.load_id.or_else(|| entities.load_id.clone());

    let record = state.outcomes.record(CallRecord::new(
        mc_number,
        load_id,
        payload.transcript,
        entities,
        final_price,
        payload.accepted,
        call_sentiment,
    ));
    info!(record_id = %record.id, sentiment = ?record.sentiment, "call outcome recorded");
    Ok(Json(CallResultResponse { ok: true, summary: record }))
}

#[derive(Debug, Serialize)]
struct MetricsResponse {
    counters: MetricsSnapshot,
    avg_negotiation_rounds: Option<f64>,
    calls_logged: usize,
    recent_calls: Vec<CallRecord>,
}

async fn metrics(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<MetricsResponse>, ApiError> {
    require_api_key(&headers, &state)?;

    let counters = state.metrics.snapshot();
    let avg_negotiation_rounds = counters.avg_negotiation_rounds();
    Ok(Json(MetricsResponse {
        counters,
        avg_negotiation_rounds,
        calls_logged: state.outcomes.len(),
        recent_calls: state.outcomes.recent(RECENT_CALLS_SHOWN),
    }))
}
