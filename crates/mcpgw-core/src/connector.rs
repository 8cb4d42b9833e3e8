//! Backend connector: turns one [`BackendConfig`] into a live MCP session,
//! spawning a local process first when the config calls for it.

use std::time::Duration;

use mcpgw_config::{BackendConfig, BackendTransport, LocalLaunch};
use mcpgw_process::SupervisedProcess;
use rmcp::model::{ClientCapabilities, ClientInfo, Implementation};
use rmcp::service::RunningService;
use rmcp::transport::SseClientTransport;
use rmcp::{RoleClient, ServiceExt};
use tracing::{info, warn};

use crate::error::GatewayError;

/// Bound on the MCP `initialize` handshake, once a transport is reachable.
pub const INITIALIZE_TIMEOUT: Duration = Duration::from_secs(15);

/// Grace period given to a locally-launched SSE backend to start listening
/// before the gateway attempts to connect to it.
pub const LOCAL_SSE_STARTUP_DELAY: Duration = Duration::from_secs(5);

/// A live connection to one backend: its MCP session, plus any process the
/// gateway itself spawned and must later terminate.
pub struct Connection {
    pub name: String,
    pub service: RunningService<RoleClient, ()>,
    pub owned_process: Option<SupervisedProcess>,
}

fn client_info() -> ClientInfo {
    ClientInfo {
        protocol_version: Default::default(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "mcpgw".to_string(),
            title: Some("MCP Aggregating Gateway".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            website_url: None,
            icons: None,
        },
    }
}

/// Connect to a single backend. Never returns a partially-registered
/// connection: either the session is fully initialized, or nothing is
/// left behind (the owned process, if any, has been terminated).
pub async fn connect(config: &BackendConfig) -> Result<Connection, GatewayError> {
    match &config.transport {
        BackendTransport::Stdio { command, args, env } => {
            connect_stdio(&config.name, command, args, env).await
        }
        BackendTransport::Sse { url, local_launch } => {
            connect_sse(&config.name, url, local_launch.as_ref()).await
        }
    }
}

async fn connect_stdio(
    name: &str,
    command: &str,
    args: &[String],
    env: &std::collections::HashMap<String, String>,
) -> Result<Connection, GatewayError> {
    let mut process = SupervisedProcess::spawn(name, command, args, env).map_err(|e| {
        GatewayError::Transport {
            backend: name.to_string(),
            message: format!("failed to spawn stdio backend: {e}"),
        }
    })?;

    let Some((stdin, stdout)) = process.take_stdio() else {
        let _ = process.terminate().await;
        return Err(GatewayError::Internal(format!(
            "backend '{name}': child process did not expose stdio"
        )));
    };

    let service = match tokio::time::timeout(
        INITIALIZE_TIMEOUT,
        client_info().serve((stdout, stdin)),
    )
    .await
    {
        Ok(Ok(service)) => service,
        Ok(Err(err)) => {
            let _ = process.terminate().await;
            return Err(GatewayError::Transport {
                backend: name.to_string(),
                message: err.to_string(),
            });
        }
        Err(_) => {
            let _ = process.terminate().await;
            return Err(GatewayError::Timeout {
                backend: name.to_string(),
            });
        }
    };

    info!(server = name, "stdio backend initialized");
    Ok(Connection {
        name: name.to_string(),
        service,
        owned_process: Some(process),
    })
}

async fn connect_sse(
    name: &str,
    url: &str,
    local_launch: Option<&LocalLaunch>,
) -> Result<Connection, GatewayError> {
    let mut owned_process = if let Some(launch) = local_launch {
        let mut process =
            SupervisedProcess::spawn(name, &launch.command, &launch.args, &launch.env).map_err(
                |e| GatewayError::Transport {
                    backend: name.to_string(),
                    message: format!("failed to spawn local SSE backend: {e}"),
                },
            )?;
        process.log_stdout();
        info!(
            server = name,
            seconds = LOCAL_SSE_STARTUP_DELAY.as_secs(),
            "waiting for locally launched SSE backend to start"
        );
        tokio::time::sleep(LOCAL_SSE_STARTUP_DELAY).await;
        Some(process)
    } else {
        None
    };

    let transport = match SseClientTransport::start(url.to_owned()).await {
        Ok(transport) => transport,
        Err(err) => {
            if let Some(mut process) = owned_process.take() {
                let _ = process.terminate().await;
            }
            return Err(GatewayError::Transport {
                backend: name.to_string(),
                message: err.to_string(),
            });
        }
    };

    let service = match tokio::time::timeout(INITIALIZE_TIMEOUT, client_info().serve(transport))
        .await
    {
        Ok(Ok(service)) => service,
        Ok(Err(err)) => {
            if let Some(mut process) = owned_process.take() {
                let _ = process.terminate().await;
            }
            return Err(GatewayError::Transport {
                backend: name.to_string(),
                message: err.to_string(),
            });
        }
        Err(_) => {
            warn!(server = name, "SSE initialize timed out");
            if let Some(mut process) = owned_process.take() {
                let _ = process.terminate().await;
            }
            return Err(GatewayError::Timeout {
                backend: name.to_string(),
            });
        }
    };

    info!(server = name, "SSE backend initialized");
    Ok(Connection {
        name: name.to_string(),
        service,
        owned_process,
    })
}
