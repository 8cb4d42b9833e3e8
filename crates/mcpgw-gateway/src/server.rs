//! Front-facing HTTP/SSE surface. How the gateway's handlers are mounted
//! is not part of the core's contract; this is the thinnest binding that
//! gets a [`GatewayHandler`] onto the wire.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use mcpgw_core::{GatewayHandler, GatewayState};
use rmcp::transport::sse_server::SseServerConfig;
use rmcp::transport::SseServer;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const SSE_PATH: &str = "/sse";
const POST_PATH: &str = "/message";

/// The bound front-facing endpoint; holds the task driving `axum::serve`
/// and the token that cancels it.
pub struct GatewayEndpoint {
    pub addr: SocketAddr,
    shutdown: CancellationToken,
    server_task: tokio::task::JoinHandle<()>,
}

impl GatewayEndpoint {
    pub async fn start(host: &str, port: u16, state: Arc<RwLock<GatewayState>>) -> Result<Self> {
        let bind_addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid bind address '{host}:{port}'"))?;

        let listener = tokio::net::TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("failed to bind front-facing endpoint at {bind_addr}"))?;
        let local_addr = listener
            .local_addr()
            .context("failed to resolve local front-facing address")?;

        let shutdown = CancellationToken::new();
        let (sse_server, sse_router) = SseServer::new(SseServerConfig {
            bind: local_addr,
            sse_path: SSE_PATH.to_string(),
            post_path: POST_PATH.to_string(),
            ct: shutdown.clone(),
            sse_keep_alive: None,
        });

        let handler = GatewayHandler::new(state);
        let _server_ct = sse_server.with_service_directly(move || handler.clone());

        let server_shutdown = shutdown.clone();
        let server_task = tokio::spawn(async move {
            if let Err(error) = axum::serve(listener, sse_router)
                .with_graceful_shutdown(async move {
                    server_shutdown.cancelled().await;
                })
                .await
            {
                warn!(error = %error, "front-facing HTTP server stopped with error");
            }
        });

        Ok(Self {
            addr: local_addr,
            shutdown,
            server_task,
        })
    }

    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(error) = self.server_task.await {
            warn!(error = %error, "front-facing HTTP server task join failed");
        }
    }
}
