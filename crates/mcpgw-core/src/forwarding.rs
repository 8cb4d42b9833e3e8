//! Forwarding engine: the front-facing [`ServerHandler`] that resolves an
//! exposed capability name to its owning backend and relays the call.

use std::future::Future;
use std::sync::Arc;

use rmcp::model::{
    CallToolRequestParam, CallToolResult, GetPromptRequestParam, GetPromptResult,
    ListPromptsResult, ListResourcesResult, ListToolsResult, PaginatedRequestParam,
    ReadResourceRequestParam, ReadResourceResult, ServerCapabilities, ServerInfo,
};
use rmcp::service::RequestContext;
use rmcp::{ErrorData as McpError, RoleServer, ServerHandler};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{classify_service_error, GatewayError};
use crate::manager::ClientManager;
use crate::registry::{CapabilityRegistry, RoutingEntry};

/// Shared gateway state: every backend session and the aggregated
/// capability namespace resolved against it.
pub struct GatewayState {
    pub manager: ClientManager,
    pub registry: CapabilityRegistry,
}

impl GatewayState {
    pub fn new() -> Self {
        Self {
            manager: ClientManager::new(),
            registry: CapabilityRegistry::new(),
        }
    }
}

impl Default for GatewayState {
    fn default() -> Self {
        Self::new()
    }
}

/// The MCP server the gateway exposes to the downstream client.
#[derive(Clone)]
pub struct GatewayHandler {
    state: Arc<RwLock<GatewayState>>,
}

impl GatewayHandler {
    pub fn new(state: Arc<RwLock<GatewayState>>) -> Self {
        Self { state }
    }

    /// Resolve an exposed capability name to its owning backend and
    /// original name, failing `notFound` or `unavailable` as appropriate.
    async fn resolve_entry(&self, exposed_name: &str) -> Result<RoutingEntry, GatewayError> {
        let state = self.state.read().await;
        let entry = state
            .registry
            .resolve(exposed_name)
            .ok_or_else(|| GatewayError::NotFound(exposed_name.to_string()))?
            .clone();
        if state.manager.get(&entry.backend).is_none() {
            return Err(GatewayError::Unavailable {
                backend: entry.backend,
            });
        }
        Ok(entry)
    }
}

#[allow(clippy::manual_async_fn)]
impl ServerHandler for GatewayHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .enable_prompts()
                .build(),
            ..Default::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        async move {
            let state = self.state.read().await;
            debug!(count = state.registry.tools().len(), "listing tools");
            Ok(ListToolsResult {
                tools: state.registry.tools().to_vec(),
                next_cursor: None,
            })
        }
    }

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        async move {
            let state = self.state.read().await;
            debug!(
                count = state.registry.resources().len(),
                "listing resources"
            );
            Ok(ListResourcesResult {
                resources: state.registry.resources().to_vec(),
                next_cursor: None,
            })
        }
    }

    fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListPromptsResult, McpError>> + Send + '_ {
        async move {
            let state = self.state.read().await;
            debug!(count = state.registry.prompts().len(), "listing prompts");
            Ok(ListPromptsResult {
                prompts: state.registry.prompts().to_vec(),
                next_cursor: None,
            })
        }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            let exposed_name = request.name.to_string();
            let entry = self.resolve_entry(&exposed_name).await?;
            let backend = entry.backend;
            let mut request = request;
            request.name = entry.original_name.into();
            if request.arguments.is_none() {
                request.arguments = Some(Default::default());
            }

            let state = self.state.read().await;
            let connection = state
                .manager
                .get(&backend)
                .ok_or_else(|| GatewayError::Unavailable {
                    backend: backend.clone(),
                })?;

            connection
                .service
                .peer()
                .call_tool(request)
                .await
                .map_err(|err| {
                    warn!(backend = %backend, error = %err, "call_tool forwarding failed");
                    classify_service_error(backend, err)
                })
        }
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            let exposed_name = request.uri.to_string();
            let entry = self.resolve_entry(&exposed_name).await?;
            let backend = entry.backend;
            let mut request = request;
            request.uri = entry.original_name.into();

            let state = self.state.read().await;
            let connection = state
                .manager
                .get(&backend)
                .ok_or_else(|| GatewayError::Unavailable {
                    backend: backend.clone(),
                })?;

            connection
                .service
                .peer()
                .read_resource(request)
                .await
                .map_err(|err| {
                    warn!(backend = %backend, error = %err, "read_resource forwarding failed");
                    classify_service_error(backend, err)
                })
        }
    }

    fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<GetPromptResult, McpError>> + Send + '_ {
        async move {
            let exposed_name = request.name.clone();
            let entry = self.resolve_entry(&exposed_name).await?;
            let backend = entry.backend;
            let mut request = request;
            request.name = entry.original_name.into();

            let state = self.state.read().await;
            let connection = state
                .manager
                .get(&backend)
                .ok_or_else(|| GatewayError::Unavailable {
                    backend: backend.clone(),
                })?;

            connection
                .service
                .peer()
                .get_prompt(request)
                .await
                .map_err(|err| {
                    warn!(backend = %backend, error = %err, "get_prompt forwarding failed");
                    classify_service_error(backend, err)
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolving_unknown_capability_is_not_found() {
        let state = Arc::new(RwLock::new(GatewayState::new()));
        let handler = GatewayHandler::new(state);
        let err = handler.resolve_entry("missing_tool").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }
}
