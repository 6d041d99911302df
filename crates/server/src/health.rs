use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::catalog::{LoadCatalog, LoadFilter};

#[derive(Clone)]
pub struct HealthState {
    catalog: Arc<dyn LoadCatalog>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub load_board: HealthCheck,
    pub checked_at: String,
}

pub fn router(catalog: Arc<dyn LoadCatalog>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { catalog })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let load_board = board_check(state.catalog.as_ref());
    let ready = load_board.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "loadline-server runtime initialized".to_string(),
        },
        load_board,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn board_check(catalog: &dyn LoadCatalog) -> HealthCheck {
    match catalog.list(&LoadFilter::default()) {
        Ok(loads) => HealthCheck {
            status: "ready",
            detail: format!("load board readable, {} loads published", loads.len()),
        },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("load board unreadable: {error}") }
        }
    }
}
