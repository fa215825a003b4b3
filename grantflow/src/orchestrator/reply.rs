//! Single-use reply tokens handed to the prompt collaborator
//!
//! Resolving a token consumes it, so a prompt can answer at most once.
//! Dropping an unresolved rationale or denial token tells the orchestrator
//! the prompt went away with its UI; the cycle is then abandoned silently.

use std::fmt;
use std::sync::Weak;

use super::{CycleId, Shared};
use crate::collaborator::PromptContextHandle;

/// Reply to a rationale prompt
pub struct RationaleReply {
    shared: Weak<Shared>,
    cycle: CycleId,
    resolved: bool,
}

impl RationaleReply {
    pub(crate) fn new(shared: Weak<Shared>, cycle: CycleId) -> Self {
        Self {
            shared,
            cycle,
            resolved: false,
        }
    }

    pub fn cycle(&self) -> CycleId {
        self.cycle
    }

    /// The user acknowledged the rationale; the host gets asked next
    pub fn acknowledge(mut self) {
        self.resolved = true;
        if let Some(shared) = self.shared.upgrade() {
            shared.on_rationale_acknowledged(self.cycle);
        }
    }
}

impl Drop for RationaleReply {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        if let Some(shared) = self.shared.upgrade() {
            shared.on_prompt_dismissed(self.cycle, "rationale prompt dismissed");
        }
    }
}

impl fmt::Debug for RationaleReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RationaleReply")
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}

/// Reply to a denial prompt
pub struct DenialReply {
    shared: Weak<Shared>,
    cycle: CycleId,
    resolved: bool,
}

impl DenialReply {
    pub(crate) fn new(shared: Weak<Shared>, cycle: CycleId) -> Self {
        Self {
            shared,
            cycle,
            resolved: false,
        }
    }

    pub fn cycle(&self) -> CycleId {
        self.cycle
    }

    /// The user closed the prompt; the cycle ends denied
    pub fn close(mut self) {
        self.resolved = true;
        if let Some(shared) = self.shared.upgrade() {
            shared.on_denial_closed(self.cycle);
        }
    }

    /// The user chose to fix the grants in the settings surface
    pub fn open_settings(mut self) {
        self.resolved = true;
        if let Some(shared) = self.shared.upgrade() {
            shared.on_denial_settings(self.cycle);
        }
    }
}

impl Drop for DenialReply {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        if let Some(shared) = self.shared.upgrade() {
            shared.on_prompt_dismissed(self.cycle, "denial prompt dismissed");
        }
    }
}

impl fmt::Debug for DenialReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenialReply")
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}

/// Request for a prompt context
///
/// Dropping it is harmless: the embedder may still attach a context through
/// [`Orchestrator::handle_prompt_context`](crate::Orchestrator::handle_prompt_context).
pub struct ContextRequest {
    shared: Weak<Shared>,
    cycle: CycleId,
}

impl ContextRequest {
    pub(crate) fn new(shared: Weak<Shared>, cycle: CycleId) -> Self {
        Self { shared, cycle }
    }

    pub fn cycle(&self) -> CycleId {
        self.cycle
    }

    /// Attach the opened surface to the cycle that asked for it
    pub fn attach(self, ctx: PromptContextHandle) {
        match self.shared.upgrade() {
            Some(shared) => shared.attach_context(Some(self.cycle), ctx),
            None => ctx.release(),
        }
    }
}

impl fmt::Debug for ContextRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextRequest")
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}
