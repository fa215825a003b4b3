//! Per-cycle request session

use grantflow_api::{CapabilityId, Outcome, RequestId, RequestOptions};
use serde::Serialize;
use std::fmt;

use crate::catalog::CapabilityCatalog;
use crate::collaborator::{HostGrantGateway, PromptContextHandle};

/// Callback receiving the terminal outcome of a cycle
pub type OutcomeCallback = Box<dyn FnOnce(Outcome) + Send + 'static>;

/// Identifier of one grant cycle, unique per orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CycleId(u64);

impl CycleId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where an active session is in its cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Phase {
    Checking,
    AwaitingContext,
    AwaitingRationale,
    AwaitingHostResult(RequestId),
    AwaitingDenialChoice(Vec<CapabilityId>),
    AwaitingSettingsReturn(RequestId),
}

/// Mutable record of the in-flight cycle
pub(crate) struct RequestSession {
    pub(crate) cycle: CycleId,
    pub(crate) options: RequestOptions,
    /// Declared capabilities the host currently denies, request order
    pub(crate) pending: Vec<CapabilityId>,
    /// Current check re-derives state only; the host is not asked again
    pub(crate) from_settings: bool,
    pub(crate) callback: Option<OutcomeCallback>,
    pub(crate) context: Option<PromptContextHandle>,
    pub(crate) phase: Phase,
}

impl RequestSession {
    pub(crate) fn new(
        cycle: CycleId,
        options: RequestOptions,
        callback: OutcomeCallback,
        context: Option<PromptContextHandle>,
    ) -> Self {
        Self {
            cycle,
            options,
            pending: Vec::new(),
            from_settings: false,
            callback: Some(callback),
            context,
            phase: Phase::Checking,
        }
    }

    /// Rebuild the pending denials from the host's current state
    ///
    /// Capabilities missing from the catalog are skipped: they are never
    /// checked and never reported as denied.
    pub(crate) fn recompute_pending(
        &mut self,
        catalog: &CapabilityCatalog,
        gateway: &dyn HostGrantGateway,
    ) {
        self.pending.clear();
        for capability in self.options.capabilities() {
            if !catalog.contains(capability) {
                tracing::trace!(cycle = %self.cycle, %capability, "Capability not declared, skipped");
                continue;
            }
            if self.pending.contains(capability) {
                continue;
            }
            if !gateway.check_granted(capability) {
                self.pending.push(capability.clone());
            }
        }
    }

    /// Context to prompt against, if attached and still alive
    pub(crate) fn live_context(&self) -> Option<PromptContextHandle> {
        self.context.clone().filter(|ctx| ctx.is_active())
    }
}

impl fmt::Debug for RequestSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSession")
            .field("cycle", &self.cycle)
            .field("pending", &self.pending)
            .field("from_settings", &self.from_settings)
            .field("has_callback", &self.callback.is_some())
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::MemoryHostGateway;

    fn session(caps: &[&str]) -> RequestSession {
        let options = RequestOptions::for_capabilities(caps.iter().copied()).unwrap();
        RequestSession::new(CycleId::new(1), options, Box::new(|_| {}), None)
    }

    #[test]
    fn test_pending_skips_undeclared() {
        let catalog: CapabilityCatalog = ["CAM".into()].into_iter().collect();
        let host = MemoryHostGateway::new();
        let mut session = session(&["MIC", "CAM"]);

        session.recompute_pending(&catalog, &host);
        assert_eq!(session.pending, vec![CapabilityId::from("CAM")]);
    }

    #[test]
    fn test_pending_keeps_request_order_without_duplicates() {
        let catalog: CapabilityCatalog = ["CAM".into(), "LOC".into(), "MIC".into()]
            .into_iter()
            .collect();
        let host = MemoryHostGateway::new();
        host.grant("MIC");
        let mut session = session(&["LOC", "MIC", "CAM", "LOC"]);

        session.recompute_pending(&catalog, &host);
        assert_eq!(
            session.pending,
            vec![CapabilityId::from("LOC"), CapabilityId::from("CAM")]
        );
    }

    #[test]
    fn test_pending_is_rebuilt() {
        let catalog: CapabilityCatalog = ["CAM".into()].into_iter().collect();
        let host = MemoryHostGateway::new();
        let mut session = session(&["CAM"]);

        session.recompute_pending(&catalog, &host);
        assert_eq!(session.pending.len(), 1);

        host.grant("CAM");
        session.recompute_pending(&catalog, &host);
        assert!(session.pending.is_empty());
    }

    #[test]
    fn test_cycle_id_display() {
        assert_eq!(CycleId::new(12).to_string(), "#12");
    }
}
