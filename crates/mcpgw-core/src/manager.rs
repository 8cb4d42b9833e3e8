//! Client manager: owns every live backend session and the order in which
//! they were brought up, so shutdown can unwind in the reverse order.

use std::collections::HashMap;

use mcpgw_config::BackendConfig;
use tracing::{info, warn};

use crate::connector::{self, Connection};

/// Holds one active session per successfully started backend.
#[derive(Default)]
pub struct ClientManager {
    connections: HashMap<String, Connection>,
    start_order: Vec<String>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start every backend concurrently. A backend that fails to connect is
    /// logged and skipped; it never aborts the attempt for the others.
    /// Returns `(connected, total)`.
    pub async fn start_all(&mut self, configs: &[BackendConfig]) -> (usize, usize) {
        let total = configs.len();
        info!(total, "starting backend connections");

        let mut set = tokio::task::JoinSet::new();
        for config in configs {
            let config = config.clone();
            set.spawn(async move {
                let result = connector::connect(&config).await;
                (config.name, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((name, Ok(connection))) => {
                    info!(backend = %name, "backend connected");
                    self.start_order.push(name.clone());
                    self.connections.insert(name, connection);
                }
                Ok((name, Err(err))) => {
                    warn!(backend = %name, error = %err, "backend failed to start");
                }
                Err(join_err) => {
                    warn!(error = %join_err, "backend start task failed to complete");
                }
            }
        }

        let connected = self.connections.len();
        if connected < total {
            warn!(connected, total, "some backends failed to start");
        } else {
            info!(connected, total, "all backends started");
        }
        (connected, total)
    }

    /// Tear every connection down in the reverse of its start order:
    /// cancel the MCP session, then terminate any process the gateway
    /// itself launched for it.
    pub async fn stop_all(&mut self) {
        info!(count = self.start_order.len(), "stopping all backends");
        for name in self.start_order.drain(..).rev() {
            let Some(connection) = self.connections.remove(&name) else {
                continue;
            };
            let Connection {
                service,
                mut owned_process,
                ..
            } = connection;

            if let Err(err) = service.cancel().await {
                warn!(backend = %name, error = %err, "error cancelling backend session");
            }
            if let Some(process) = owned_process.as_mut() {
                if let Err(err) = process.terminate().await {
                    warn!(backend = %name, error = %err, "error terminating owned process");
                }
            }
        }
        info!("all backends stopped");
    }

    pub fn get(&self, name: &str) -> Option<&Connection> {
        self.connections.get(name)
    }

    pub fn active_count(&self) -> usize {
        self.connections.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.connections.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_manager_has_no_connections() {
        let manager = ClientManager::new();
        assert_eq!(manager.active_count(), 0);
        assert!(manager.get("anything").is_none());
    }
}
