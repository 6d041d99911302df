mod api;
mod bootstrap;
mod catalog;
mod dashboard;
mod health;
mod outcomes;

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tracing::info;

use loadline_core::config::{AppConfig, LoadOptions};

use crate::api::ApiState;
use crate::bootstrap::Application;

fn init_logging(config: &AppConfig) {
    use loadline_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

fn app_router(app: &Application) -> Router {
    let state = ApiState {
        config: Arc::clone(&app.config),
        catalog: Arc::clone(&app.catalog),
        registry: Arc::clone(&app.registry),
        engine: Arc::clone(&app.engine),
        outcomes: Arc::clone(&app.outcomes),
        metrics: Arc::clone(&app.metrics),
    };
    let templates = dashboard::templates();

    Router::new()
        .merge(api::router(state.clone()))
        .merge(dashboard::router(state, templates))
        .merge(health::router(Arc::clone(&app.catalog)))
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "system.server.started",
        bind_address = %address,
        "loadline-server listening"
    );

    axum::serve(listener, app_router(&app))
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    info!(event_name = "system.server.stopping", "loadline-server stopping");
    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
