//! Capability registry: discovers each backend's tools, resources and
//! prompts, and aggregates them into one namespace the front end can query.
//!
//! Capability names are a single flat namespace shared across all three
//! kinds, matching how the gateway resolves a call by name alone: the first
//! backend to register a given name keeps it, later collisions are dropped
//! with a warning. Tools and prompts are keyed by their `name`; resources
//! are keyed by their `uri`, since that's what a client actually reads by
//! and what distinguishes one resource from another even when two share a
//! display name.

use std::collections::HashMap;
use std::time::Duration;

use rmcp::model::{Prompt, Resource, Tool};
use rmcp::service::ServiceError;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::manager::ClientManager;

/// Bound on a single `list_*` call to a backend during discovery.
pub const CAPABILITY_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Which backend (and under what identifier on that backend) owns an
/// exposed capability. `original_name` is the tool/prompt name for those
/// two kinds, and the resource URI for resources.
#[derive(Debug, Clone)]
pub struct RoutingEntry {
    pub backend: String,
    pub original_name: String,
}

#[derive(Default)]
pub struct CapabilityRegistry {
    tools: Vec<Tool>,
    resources: Vec<Resource>,
    prompts: Vec<Prompt>,
    routing: HashMap<String, RoutingEntry>,
}

/// Outcome of a single bounded `list_*` call.
enum Fetch<T> {
    Ready(Vec<T>),
    Failed(ServiceError),
    TimedOut,
}

/// One (backend, capability-type) discovery task's result, tagged with
/// enough information to merge everything back in deterministic order.
struct DiscoveryTask {
    backend_index: usize,
    type_order: u8,
    backend: String,
    outcome: Outcome,
}

enum Outcome {
    Tools(Fetch<Tool>),
    Resources(Fetch<Resource>),
    Prompts(Fetch<Prompt>),
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn prompts(&self) -> &[Prompt] {
        &self.prompts
    }

    pub fn resolve(&self, exposed_name: &str) -> Option<&RoutingEntry> {
        self.routing.get(exposed_name)
    }

    /// Re-discover every capability across every active backend, replacing
    /// whatever was previously aggregated. Every (backend, capability-type)
    /// pair is listed concurrently; results are merged back in a fixed
    /// backend-then-type order so aggregation is deterministic regardless
    /// of which backend happens to answer first.
    pub async fn discover_and_register(&mut self, manager: &ClientManager) {
        self.tools.clear();
        self.resources.clear();
        self.prompts.clear();
        self.routing.clear();

        let backend_names: Vec<String> = manager.names().map(str::to_string).collect();
        info!(backends = backend_names.len(), "discovering capabilities");

        let mut set = JoinSet::new();
        for (backend_index, name) in backend_names.iter().enumerate() {
            let Some(connection) = manager.get(name) else {
                continue;
            };
            let peer = connection.service.peer().clone();
            let backend = name.clone();

            let tools_peer = peer.clone();
            let tools_backend = backend.clone();
            set.spawn(async move {
                let outcome =
                    Outcome::Tools(fetch(tools_peer.list_tools(None), |r| r.tools).await);
                DiscoveryTask {
                    backend_index,
                    type_order: 0,
                    backend: tools_backend,
                    outcome,
                }
            });

            let resources_peer = peer.clone();
            let resources_backend = backend.clone();
            set.spawn(async move {
                let outcome = Outcome::Resources(
                    fetch(resources_peer.list_resources(None), |r| r.resources).await,
                );
                DiscoveryTask {
                    backend_index,
                    type_order: 1,
                    backend: resources_backend,
                    outcome,
                }
            });

            set.spawn(async move {
                let outcome =
                    Outcome::Prompts(fetch(peer.list_prompts(None), |r| r.prompts).await);
                DiscoveryTask {
                    backend_index,
                    type_order: 2,
                    backend,
                    outcome,
                }
            });
        }

        let mut tasks = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(task) => tasks.push(task),
                Err(join_err) => {
                    warn!(error = %join_err, "capability discovery task failed to complete");
                }
            }
        }
        tasks.sort_by_key(|task| (task.backend_index, task.type_order));

        for task in tasks {
            self.apply(task);
        }

        info!(
            tools = self.tools.len(),
            resources = self.resources.len(),
            prompts = self.prompts.len(),
            "capability discovery complete"
        );
    }

    fn apply(&mut self, task: DiscoveryTask) {
        let DiscoveryTask {
            backend, outcome, ..
        } = task;

        match outcome {
            Outcome::Tools(fetch) => match fetch {
                Fetch::Ready(tools) => {
                    let mut registered = 0;
                    for tool in tools {
                        let exposed_name = tool.name.to_string();
                        if self.try_claim(&backend, &exposed_name) {
                            self.tools.push(tool);
                            registered += 1;
                        }
                    }
                    info!(backend = %backend, registered, "tools discovered");
                }
                Fetch::Failed(err) => warn!(backend = %backend, error = %err, "list_tools failed"),
                Fetch::TimedOut => warn!(backend = %backend, "list_tools timed out"),
            },
            Outcome::Resources(fetch) => match fetch {
                Fetch::Ready(resources) => {
                    let mut registered = 0;
                    for resource in resources {
                        let exposed_uri = resource.uri.to_string();
                        if self.try_claim(&backend, &exposed_uri) {
                            self.resources.push(resource);
                            registered += 1;
                        }
                    }
                    info!(backend = %backend, registered, "resources discovered");
                }
                Fetch::Failed(err) => {
                    warn!(backend = %backend, error = %err, "list_resources failed")
                }
                Fetch::TimedOut => warn!(backend = %backend, "list_resources timed out"),
            },
            Outcome::Prompts(fetch) => match fetch {
                Fetch::Ready(prompts) => {
                    let mut registered = 0;
                    for prompt in prompts {
                        let exposed_name = prompt.name.clone();
                        if self.try_claim(&backend, &exposed_name) {
                            self.prompts.push(prompt);
                            registered += 1;
                        }
                    }
                    info!(backend = %backend, registered, "prompts discovered");
                }
                Fetch::Failed(err) => {
                    warn!(backend = %backend, error = %err, "list_prompts failed")
                }
                Fetch::TimedOut => warn!(backend = %backend, "list_prompts timed out"),
            },
        }
    }

    /// Attempt to register `exposed_name` under `backend`. Returns `true`
    /// if this call won the name (caller should push the item); `false` if
    /// an earlier registration already owns it.
    fn try_claim(&mut self, backend: &str, exposed_name: &str) -> bool {
        if exposed_name.is_empty() {
            warn!(backend = %backend, "discovered a capability with no name, skipping");
            return false;
        }

        if let Some(existing) = self.routing.get(exposed_name) {
            if existing.backend != backend {
                warn!(
                    capability = %exposed_name,
                    existing_backend = %existing.backend,
                    new_backend = %backend,
                    "capability name conflict, keeping first registration"
                );
            } else {
                warn!(
                    capability = %exposed_name,
                    backend = %backend,
                    "backend offered the same capability name twice, keeping the first"
                );
            }
            return false;
        }

        self.routing.insert(
            exposed_name.to_string(),
            RoutingEntry {
                backend: backend.to_string(),
                original_name: exposed_name.to_string(),
            },
        );
        true
    }
}

/// Run one bounded `list_*` call, project its result onto the item vector
/// the caller cares about, and flatten timeout/service-error/success into
/// a single outcome.
async fn fetch<T, R, F, Proj>(call: F, project: Proj) -> Fetch<T>
where
    F: std::future::Future<Output = Result<R, ServiceError>>,
    Proj: FnOnce(R) -> Vec<T>,
{
    match tokio::time::timeout(CAPABILITY_FETCH_TIMEOUT, call).await {
        Ok(Ok(result)) => Fetch::Ready(project(result)),
        Ok(Err(err)) => Fetch::Failed(err),
        Err(_) => Fetch::TimedOut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_resolves_nothing() {
        let registry = CapabilityRegistry::new();
        assert!(registry.resolve("anything").is_none());
        assert!(registry.tools().is_empty());
    }

    #[test]
    fn first_claim_wins_a_conflicting_name() {
        let mut registry = CapabilityRegistry::new();
        assert!(registry.try_claim("alpha", "shared_tool"));
        assert!(!registry.try_claim("beta", "shared_tool"));
        assert_eq!(registry.resolve("shared_tool").unwrap().backend, "alpha");
    }

    #[test]
    fn same_backend_claiming_twice_keeps_the_first() {
        let mut registry = CapabilityRegistry::new();
        assert!(registry.try_claim("alpha", "dup_tool"));
        assert!(!registry.try_claim("alpha", "dup_tool"));
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut registry = CapabilityRegistry::new();
        assert!(!registry.try_claim("alpha", ""));
    }

    #[test]
    fn resource_routing_is_keyed_by_uri_not_display_name() {
        let mut registry = CapabilityRegistry::new();
        assert!(registry.try_claim("alpha", "file:///a.txt"));
        let entry = registry.resolve("file:///a.txt").unwrap();
        assert_eq!(entry.backend, "alpha");
        assert_eq!(entry.original_name, "file:///a.txt");
    }
}
