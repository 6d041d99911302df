use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use loadline_core::config::{AppConfig, ConfigError, LoadOptions};
use loadline_core::{InMemoryNegotiationStore, MetricsRegistry, NegotiationEngine};
use loadline_registry::RegistryClient;

use crate::catalog::{FileLoadCatalog, LoadCatalog};
use crate::outcomes::InMemoryOutcomeLog;

pub struct Application {
    pub config: Arc<AppConfig>,
    pub catalog: Arc<dyn LoadCatalog>,
    pub registry: Arc<RegistryClient>,
    pub engine: Arc<NegotiationEngine>,
    pub outcomes: Arc<InMemoryOutcomeLog>,
    pub metrics: Arc<MetricsRegistry>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("verification client setup failed: {0}")]
    Registry(#[source] anyhow::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let metrics = Arc::new(MetricsRegistry::default());

    let registry = Arc::new(
        RegistryClient::from_config(&config.registry, Arc::clone(&metrics))
            .map_err(BootstrapError::Registry)?,
    );
    info!(
        event_name = "system.bootstrap.registry_ready",
        mode = %config.registry.mode,
        "verification client initialized"
    );

    let store = Arc::new(InMemoryNegotiationStore::new(config.negotiation.state_ttl_secs));
    let engine = Arc::new(NegotiationEngine::from_config(
        &config.negotiation,
        store,
        Arc::clone(&metrics),
    ));
    info!(
        event_name = "system.bootstrap.engine_ready",
        policy = %config.negotiation.policy,
        max_rounds = config.negotiation.max_rounds,
        "negotiation engine initialized"
    );

    let catalog = Arc::new(FileLoadCatalog::new(config.loads.file.clone()));
    info!(
        event_name = "system.bootstrap.board_ready",
        board_file = %config.loads.file.display(),
        "load board catalog initialized"
    );

    Ok(Application {
        config: Arc::new(config),
        catalog,
        registry,
        engine,
        outcomes: Arc::new(InMemoryOutcomeLog::default()),
        metrics,
    })
}
