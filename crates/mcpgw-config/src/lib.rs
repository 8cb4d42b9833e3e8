//! Configuration data model for the MCP aggregating gateway.
//!
//! Parses and validates the JSON backend configuration file described in the
//! gateway's external interface: a top-level object keyed by backend name,
//! each value describing either a stdio or an SSE transport.

mod error;
mod model;

pub use error::ConfigError;
pub use model::{BackendConfig, BackendTransport, GatewayConfig, LocalLaunch};
