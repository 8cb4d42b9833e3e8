//! Startup/shutdown orchestration: load config, bring up the backend
//! fabric, publish it, and tear it down again on exit.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use mcpgw_config::GatewayConfig;
use mcpgw_core::GatewayState;
use tokio::sync::RwLock;
use tracing::info;

/// Load configuration, connect every backend, and run discovery. Fails if
/// the configuration is invalid, or if at least one backend was
/// configured and none of them started.
pub async fn start(config_path: &str) -> Result<Arc<RwLock<GatewayState>>> {
    let path = Path::new(config_path);
    let config = GatewayConfig::load(path)
        .with_context(|| format!("loading configuration from '{config_path}'"))?;
    info!(
        backends = config.backends.len(),
        path = config_path,
        "configuration loaded"
    );

    let mut state = GatewayState::new();
    let (connected, total) = state.manager.start_all(&config.backends).await;
    if total > 0 && connected == 0 {
        bail!("{total} backend(s) configured but none started successfully");
    }

    state.registry.discover_and_register(&state.manager).await;
    info!(
        tools = state.registry.tools().len(),
        resources = state.registry.resources().len(),
        prompts = state.registry.prompts().len(),
        "capability discovery complete"
    );

    Ok(Arc::new(RwLock::new(state)))
}

/// Stop every backend, draining the shutdown stack in LIFO order. Safe to
/// call even if startup only partially completed.
pub async fn stop(state: &Arc<RwLock<GatewayState>>) {
    let mut state = state.write().await;
    state.manager.stop_all().await;
}
