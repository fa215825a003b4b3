//! External collaborators consumed by the orchestrator
//!
//! The orchestrator never talks to a concrete host. Everything it needs from
//! the outside world goes through the traits in this module:
//!
//! | Trait | Role |
//! |-------|------|
//! | [`HostGrantGateway`] | grant state, rationale predicate, host grant dialog |
//! | [`PromptCollaborator`] | rationale and denial prompts |
//! | [`SettingsRedirector`] | detour to the host settings surface |
//! | [`PromptContext`] | live UI surface the prompts are shown against |
//!
//! Each trait ships with in-memory or recording implementations for tests and
//! simulators, plus terminal/command based ones for real use.

pub mod gateway;
pub mod prompt;
pub mod settings;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use gateway::{GrantAsk, HostGrantGateway, HostSnapshot, MemoryHostGateway};
pub use prompt::{
    AutoPromptCollaborator, DenialAnswer, DenialPrompt, PendingPrompt, PromptCollaborator,
    PromptKind, RationaleAnswer, RationalePrompt, RecordedPrompt, RecordingPromptCollaborator,
    SharedInput, TerminalPromptCollaborator,
};
pub use settings::{
    ChainedSettingsRedirector, CommandNavigation, NavigationError, NavigationStrategy,
    RecordingSettingsRedirector, SettingsRedirector,
};

/// Handle to the host UI surface prompts are attached to
///
/// A context is attached before the host is asked and released when the
/// cycle ends, whatever the reason. An inactive context makes every UI step
/// a silent abandonment.
pub trait PromptContext: Send + Sync + fmt::Debug {
    /// Whether the surface can still show prompts
    fn is_active(&self) -> bool;

    /// Tear the surface down; called once per attached context
    fn release(&self) {}
}

/// Shared handle to a prompt context
pub type PromptContextHandle = Arc<dyn PromptContext>;

/// Prompt context with an explicit lifecycle flag
///
/// Useful for hosts whose surface has no richer handle, for simulators,
/// and for tests that need to observe the release.
#[derive(Debug)]
pub struct ManagedContext {
    name: String,
    active: AtomicBool,
    released: AtomicBool,
}

impl ManagedContext {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            active: AtomicBool::new(true),
            released: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Simulate the host tearing the surface down
    pub fn tear_down(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    /// Whether the orchestrator released this context
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl PromptContext for ManagedContext {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) && !self.is_released()
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            tracing::debug!(context = %self.name, "Prompt context released");
        }
    }
}
