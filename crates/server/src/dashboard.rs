//! Operator dashboard. Served without the shared secret so a broker can
//! keep it open on a wallboard.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Html,
    routing::get,
    Router,
};
use serde::Serialize;
use tera::{Context, Tera};
use tracing::error;

use crate::api::ApiState;

const DASHBOARD_TEMPLATE: &str = "dashboard.html";

pub fn templates() -> Arc<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_template(DASHBOARD_TEMPLATE, include_str!("../../../templates/dashboard.html"))
        .expect("dashboard template is valid");
    Arc::new(tera)
}

pub fn router(state: ApiState, templates: Arc<Tera>) -> Router {
    Router::new().route("/dashboard", get(dashboard)).with_state((state, templates))
}

#[derive(Serialize)]
struct DailyVolume {
    date: String,
    count: u64,
}

async fn dashboard(
    State((state, templates)): State<(ApiState, Arc<Tera>)>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    let counters = state.metrics.snapshot();

    let decided = counters.offers_accepted + counters.offers_rejected;
    let acceptance_rate = if decided == 0 {
        "n/a".to_string()
    } else {
        format!("{:.0}%", counters.offers_accepted as f64 / decided as f64 * 100.0)
    };
    let avg_rounds = counters
        .avg_negotiation_rounds()
        .map(|avg| format!("{avg:.2}"))
        .unwrap_or_else(|| "n/a".to_string());

    let daily_volume: Vec<DailyVolume> = state
        .outcomes
        .daily_counts()
        .into_iter()
        .map(|(date, count)| DailyVolume { date, count })
        .collect();

    let mut context = Context::new();
    context.insert("calls_total", &counters.calls_total);
    context.insert("offers_accepted", &counters.offers_accepted);
    context.insert("offers_rejected", &counters.offers_rejected);
    context.insert("acceptance_rate", &acceptance_rate);
    context.insert("avg_rounds", &avg_rounds);
    context.insert("registry_fallbacks_used", &counters.registry_fallbacks_used);
    context.insert("daily_volume", &daily_volume);
    context.insert("recent_calls", &state.outcomes.recent(10));

    let page = templates.render(DASHBOARD_TEMPLATE, &context).map_err(|e| {
        error!(error = %e, "dashboard render failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Dashboard unavailable</h1>".to_string()))
    })?;
    Ok(Html(page))
}
