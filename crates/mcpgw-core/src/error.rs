use rmcp::ErrorData as McpError;
use rmcp::service::ServiceError;

/// The gateway's error taxonomy, covering both startup-time failures and
/// per-call forwarding failures.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The backend configuration file was missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A requested capability name has no registered owner.
    #[error("capability not found: {0}")]
    NotFound(String),

    /// The capability's owning backend has no active session.
    #[error("backend '{backend}' is unavailable")]
    Unavailable { backend: String },

    /// A call to a backend did not complete within its deadline.
    #[error("request to backend '{backend}' timed out")]
    Timeout { backend: String },

    /// The transport to a backend failed (connection lost, broken pipe).
    #[error("transport error with backend '{backend}': {message}")]
    Transport { backend: String, message: String },

    /// The backend itself reported an error for the forwarded call.
    #[error("backend '{backend}' reported an error: {message}")]
    Backend { backend: String, message: String },

    /// A gateway-internal invariant was violated.
    #[error("internal gateway error: {0}")]
    Internal(String),
}

impl From<GatewayError> for McpError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound(msg) => McpError::invalid_params(msg, None),
            GatewayError::Configuration(msg) => McpError::internal_error(msg, None),
            GatewayError::Unavailable { backend } => {
                McpError::internal_error(format!("backend '{backend}' is unavailable"), None)
            }
            GatewayError::Timeout { backend } => {
                McpError::internal_error(format!("backend '{backend}' timed out"), None)
            }
            GatewayError::Transport { backend, message } => McpError::internal_error(
                format!("transport error with backend '{backend}': {message}"),
                None,
            ),
            GatewayError::Backend { backend, message } => McpError::internal_error(
                format!("backend '{backend}' reported an error: {message}"),
                None,
            ),
            GatewayError::Internal(msg) => McpError::internal_error(msg, None),
        }
    }
}

/// Classify a forwarded call's failure into the gateway's error taxonomy
/// instead of collapsing everything into `GatewayError::Backend`. A backend
/// protocol error is surfaced to the caller as-is; a timeout or a lost
/// transport gets its own kind so a client can tell "backend is slow" apart
/// from "backend rejected the call".
pub fn classify_service_error(backend: String, err: ServiceError) -> McpError {
    let message = err.to_string();
    match err {
        ServiceError::McpError(data) => data,
        ServiceError::Timeout { .. } => GatewayError::Timeout { backend }.into(),
        ServiceError::TransportSend(_) | ServiceError::TransportClosed => {
            GatewayError::Transport { backend, message }.into()
        }
        _ => GatewayError::Backend { backend, message }.into(),
    }
}
