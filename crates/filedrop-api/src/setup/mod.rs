//! Application setup and initialization

pub mod routes;
pub mod server;
pub mod storage;

use crate::auth::{ApiKeyAuthorizer, Authorizer};
use crate::state::AppState;
use anyhow::{Context, Result};
use filedrop_core::Config;
use std::sync::Arc;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    crate::telemetry::init_telemetry()
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment(),
        production = config.is_production(),
        "Configuration loaded and validated successfully"
    );

    let storage = storage::setup_storage(&config).await?;
    let authorizer = setup_authorizer(&config);

    let state = Arc::new(AppState::new(config.clone(), storage, authorizer));
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}

fn setup_authorizer(config: &Config) -> Arc<dyn Authorizer> {
    let authorizer = ApiKeyAuthorizer::new(config.api_keys().to_vec());
    if authorizer.is_open() {
        tracing::warn!("No API_KEYS configured - uploads are accepted from anyone");
    } else {
        tracing::info!(keys = config.api_keys().len(), "API key authorization enabled");
    }
    Arc::new(authorizer)
}
