//! Core gateway logic: connecting to backends, tracking their sessions,
//! aggregating their capabilities, and forwarding calls between them and
//! the downstream MCP client.

pub mod connector;
pub mod error;
pub mod forwarding;
pub mod manager;
pub mod registry;

pub use connector::Connection;
pub use error::GatewayError;
pub use forwarding::{GatewayHandler, GatewayState};
pub use manager::ClientManager;
pub use registry::{CapabilityRegistry, RoutingEntry};
