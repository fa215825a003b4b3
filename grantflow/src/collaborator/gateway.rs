//! Host grant gateway
//!
//! Abstraction over the host's runtime permission API: the grant state of a
//! capability, the "should a rationale be shown" predicate, and the
//! asynchronous grant dialog.

use grantflow_api::{CapabilityId, RequestId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError, RwLock};

use super::PromptContext;

/// Gateway to the host's grant machinery
///
/// Queries run while the orchestrator holds its lock, so `check_granted`,
/// `should_show_rationale` and `supports_runtime_grants` must not call back
/// into the orchestrator. `request_grant` runs outside the lock; the host's
/// answer is delivered later through
/// [`Orchestrator::notify_host_grant_result`](crate::Orchestrator::notify_host_grant_result)
/// with the same request id, possibly from within `request_grant` itself.
pub trait HostGrantGateway: Send + Sync {
    /// Whether the host grants capabilities at runtime
    ///
    /// Hosts that grant everything at install time return `false`.
    fn supports_runtime_grants(&self) -> bool {
        true
    }

    /// Current grant state of a capability
    fn check_granted(&self, capability: &CapabilityId) -> bool;

    /// Whether the user should see a rationale before being asked again
    fn should_show_rationale(&self, ctx: &dyn PromptContext, capability: &CapabilityId) -> bool;

    /// Ask the host to grant the capabilities
    fn request_grant(
        &self,
        ctx: &dyn PromptContext,
        capabilities: &[CapabilityId],
        request_id: RequestId,
    );
}

/// Serializable description of a host's grant state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSnapshot {
    /// Capabilities currently granted
    #[serde(default)]
    pub granted: Vec<CapabilityId>,
    /// Capabilities the host wants a rationale for
    #[serde(default)]
    pub rationale: Vec<CapabilityId>,
    /// Whether the host grants at runtime
    #[serde(default = "default_runtime_grants")]
    pub runtime_grants: bool,
}

fn default_runtime_grants() -> bool {
    true
}

impl Default for HostSnapshot {
    fn default() -> Self {
        Self {
            granted: Vec::new(),
            rationale: Vec::new(),
            runtime_grants: true,
        }
    }
}

/// A grant request the host received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantAsk {
    pub request_id: RequestId,
    pub capabilities: Vec<CapabilityId>,
}

#[derive(Debug, Default)]
struct HostState {
    granted: HashSet<CapabilityId>,
    rationale: HashSet<CapabilityId>,
}

/// In-memory host for tests and simulators
///
/// Grant asks are recorded, not answered: the driver decides what the user
/// picked in the host dialog and reports it to the orchestrator.
#[derive(Debug)]
pub struct MemoryHostGateway {
    state: RwLock<HostState>,
    asks: Mutex<Vec<GrantAsk>>,
    runtime_grants: bool,
}

impl MemoryHostGateway {
    /// Create a runtime-grant host with nothing granted
    pub fn new() -> Self {
        Self::from_snapshot(HostSnapshot::default())
    }

    /// Create a host that predates runtime grants
    pub fn legacy() -> Self {
        Self::from_snapshot(HostSnapshot {
            runtime_grants: false,
            ..HostSnapshot::default()
        })
    }

    pub fn from_snapshot(snapshot: HostSnapshot) -> Self {
        Self {
            state: RwLock::new(HostState {
                granted: snapshot.granted.into_iter().collect(),
                rationale: snapshot.rationale.into_iter().collect(),
            }),
            asks: Mutex::new(Vec::new()),
            runtime_grants: snapshot.runtime_grants,
        }
    }

    /// Mark a capability granted
    pub fn grant(&self, capability: impl Into<CapabilityId>) {
        self.write_state().granted.insert(capability.into());
    }

    /// Mark a capability denied
    pub fn revoke(&self, capability: &CapabilityId) {
        self.write_state().granted.remove(capability);
    }

    /// Set the rationale predicate for a capability
    pub fn set_rationale(&self, capability: impl Into<CapabilityId>, show: bool) {
        let capability = capability.into();
        let mut state = self.write_state();
        if show {
            state.rationale.insert(capability);
        } else {
            state.rationale.remove(&capability);
        }
    }

    pub fn is_granted(&self, capability: &CapabilityId) -> bool {
        self.read_state().granted.contains(capability)
    }

    /// Current state as a snapshot (granted list sorted)
    pub fn snapshot(&self) -> HostSnapshot {
        let state = self.read_state();
        let mut granted: Vec<_> = state.granted.iter().cloned().collect();
        let mut rationale: Vec<_> = state.rationale.iter().cloned().collect();
        granted.sort();
        rationale.sort();
        HostSnapshot {
            granted,
            rationale,
            runtime_grants: self.runtime_grants,
        }
    }

    /// All grant asks received so far
    pub fn asks(&self) -> Vec<GrantAsk> {
        self.asks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recent grant ask
    pub fn last_ask(&self) -> Option<GrantAsk> {
        self.asks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn ask_count(&self) -> usize {
        self.asks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, HostState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, HostState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryHostGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl HostGrantGateway for MemoryHostGateway {
    fn supports_runtime_grants(&self) -> bool {
        self.runtime_grants
    }

    fn check_granted(&self, capability: &CapabilityId) -> bool {
        self.is_granted(capability)
    }

    fn should_show_rationale(&self, _ctx: &dyn PromptContext, capability: &CapabilityId) -> bool {
        self.read_state().rationale.contains(capability)
    }

    fn request_grant(
        &self,
        _ctx: &dyn PromptContext,
        capabilities: &[CapabilityId],
        request_id: RequestId,
    ) {
        tracing::debug!(%request_id, count = capabilities.len(), "Host grant dialog requested");
        self.asks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(GrantAsk {
                request_id,
                capabilities: capabilities.to_vec(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::ManagedContext;

    #[test]
    fn test_memory_gateway_grant_and_revoke() {
        let host = MemoryHostGateway::new();
        let cam = CapabilityId::from("CAM");

        assert!(!host.check_granted(&cam));
        host.grant("CAM");
        assert!(host.check_granted(&cam));
        host.revoke(&cam);
        assert!(!host.check_granted(&cam));
    }

    #[test]
    fn test_memory_gateway_records_asks() {
        let host = MemoryHostGateway::new();
        let ctx = ManagedContext::new("test");
        let caps = vec![CapabilityId::from("CAM"), CapabilityId::from("LOC")];

        host.request_grant(ctx.as_ref(), &caps, RequestId::new(7));

        assert_eq!(host.ask_count(), 1);
        let ask = host.last_ask().unwrap();
        assert_eq!(ask.request_id, RequestId::new(7));
        assert_eq!(ask.capabilities, caps);
    }

    #[test]
    fn test_rationale_predicate() {
        let host = MemoryHostGateway::new();
        let ctx = ManagedContext::new("test");
        host.set_rationale("CAM", true);

        assert!(host.should_show_rationale(ctx.as_ref(), &"CAM".into()));
        host.set_rationale("CAM", false);
        assert!(!host.should_show_rationale(ctx.as_ref(), &"CAM".into()));
    }

    #[test]
    fn test_snapshot_from_json() {
        let json = r#"{ "granted": ["LOC"], "rationale": ["CAM"] }"#;
        let snapshot: HostSnapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.runtime_grants);

        let host = MemoryHostGateway::from_snapshot(snapshot.clone());
        assert!(host.supports_runtime_grants());
        assert!(host.is_granted(&"LOC".into()));
        assert_eq!(host.snapshot(), snapshot);
    }

    #[test]
    fn test_legacy_host() {
        assert!(!MemoryHostGateway::legacy().supports_runtime_grants());
    }
}
