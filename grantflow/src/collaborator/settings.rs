//! Settings surface navigation
//!
//! The orchestrator only knows that a settings surface was opened under a
//! request id and that the host will report the return later. Which surface
//! gets opened is decided here, by an ordered chain of strategies:
//! vendor-specific variants first, generic ones last.

use grantflow_api::RequestId;
use std::fmt;
use std::io;
use std::process::Command;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

use super::PromptContext;

/// Error type for settings navigation
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("Navigation strategy {0} does not apply to this host")]
    NotApplicable(String),

    #[error("Prompt context is no longer active")]
    ContextInactive,

    #[error("Failed to launch settings surface {surface}: {source}")]
    Launch {
        surface: String,
        #[source]
        source: io::Error,
    },

    #[error("Settings surface {0} is unavailable")]
    Unavailable(String),

    #[error("No settings surface could be opened (tried: {})", .attempted.join(", "))]
    Exhausted { attempted: Vec<String> },
}

/// Opens the host settings surface for the application
///
/// The host reports the return through
/// [`Orchestrator::notify_settings_return`](crate::Orchestrator::notify_settings_return)
/// with the same request id.
pub trait SettingsRedirector: Send + Sync {
    fn open_app_settings(
        &self,
        ctx: &dyn PromptContext,
        request_id: RequestId,
    ) -> Result<(), NavigationError>;
}

/// One way of reaching a settings surface
pub trait NavigationStrategy: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Whether this variant exists on the current host
    fn is_applicable(&self) -> bool {
        true
    }

    /// Open the surface
    fn open(&self, ctx: &dyn PromptContext, request_id: RequestId) -> Result<(), NavigationError>;
}

// ============================================================================
// Chained Redirector
// ============================================================================

/// Tries navigation strategies in order until one opens a surface
///
/// An empty chain always fails, which leaves the cycle waiting for a
/// settings return that never comes.
#[derive(Default)]
pub struct ChainedSettingsRedirector {
    strategies: Vec<Box<dyn NavigationStrategy>>,
}

impl ChainedSettingsRedirector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy; earlier strategies win
    pub fn with_strategy(mut self, strategy: impl NavigationStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Strategy names in trial order
    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Settings surfaces of the common desktop platforms
    pub fn desktop_defaults() -> Self {
        let chain = Self::new();

        #[cfg(target_os = "macos")]
        let chain = chain.with_strategy(
            CommandNavigation::new("macos-privacy", "open")
                .arg("x-apple.systempreferences:com.apple.preference.security?Privacy"),
        );

        #[cfg(target_os = "windows")]
        let chain = chain.with_strategy(
            CommandNavigation::new("windows-privacy", "cmd").args(["/C", "start", "", "ms-settings:privacy"]),
        );

        #[cfg(all(unix, not(target_os = "macos")))]
        let chain = chain
            .with_strategy(
                CommandNavigation::new("gnome-applications", "gnome-control-center")
                    .arg("applications")
                    .when_env_contains("XDG_CURRENT_DESKTOP", "GNOME"),
            )
            .with_strategy(
                CommandNavigation::new("kde-app-permissions", "systemsettings")
                    .arg("kcm_app-permissions")
                    .when_env_contains("XDG_CURRENT_DESKTOP", "KDE"),
            )
            .with_strategy(CommandNavigation::new("gnome-privacy", "gnome-control-center").arg("privacy"));

        chain
    }
}

impl SettingsRedirector for ChainedSettingsRedirector {
    fn open_app_settings(
        &self,
        ctx: &dyn PromptContext,
        request_id: RequestId,
    ) -> Result<(), NavigationError> {
        if !ctx.is_active() {
            return Err(NavigationError::ContextInactive);
        }

        let mut attempted = Vec::new();
        for strategy in &self.strategies {
            if !strategy.is_applicable() {
                tracing::debug!(strategy = strategy.name(), "Navigation strategy not applicable");
                continue;
            }
            attempted.push(strategy.name().to_string());
            match strategy.open(ctx, request_id) {
                Ok(()) => {
                    tracing::info!(strategy = strategy.name(), %request_id, "Settings surface opened");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(strategy = strategy.name(), error = %e, "Navigation strategy failed");
                }
            }
        }

        Err(NavigationError::Exhausted { attempted })
    }
}

impl fmt::Debug for ChainedSettingsRedirector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainedSettingsRedirector")
            .field("strategies", &self.names())
            .finish()
    }
}

// ============================================================================
// Command Navigation
// ============================================================================

type Applicability = Box<dyn Fn() -> bool + Send + Sync>;

/// Opens a settings surface by launching a program (URI opener, control panel)
pub struct CommandNavigation {
    name: String,
    program: String,
    args: Vec<String>,
    condition: Option<Applicability>,
}

impl CommandNavigation {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            condition: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Only apply when the predicate holds
    pub fn applicable_when(mut self, predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Box::new(predicate));
        self
    }

    /// Only apply when an environment variable contains `needle`
    pub fn when_env_contains(self, var: &'static str, needle: &'static str) -> Self {
        self.applicable_when(move || {
            std::env::var(var)
                .map(|value| value.contains(needle))
                .unwrap_or(false)
        })
    }
}

impl NavigationStrategy for CommandNavigation {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_applicable(&self) -> bool {
        self.condition.as_ref().map(|f| f()).unwrap_or(true)
    }

    fn open(&self, _ctx: &dyn PromptContext, _request_id: RequestId) -> Result<(), NavigationError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .spawn()
            .map_err(|source| NavigationError::Launch {
                surface: self.name.clone(),
                source,
            })?;

        // reap the opener without blocking the orchestrator
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

impl fmt::Debug for CommandNavigation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandNavigation")
            .field("name", &self.name)
            .field("program", &self.program)
            .field("args", &self.args)
            .field("conditional", &self.condition.is_some())
            .finish()
    }
}

// ============================================================================
// Recording Redirector (for testing)
// ============================================================================

/// Redirector that records navigations instead of performing them
#[derive(Debug, Default)]
pub struct RecordingSettingsRedirector {
    opened: Mutex<Vec<RequestId>>,
    failing: bool,
}

impl RecordingSettingsRedirector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A redirector for which every surface is unavailable
    pub fn failing() -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    /// Request ids of every successful navigation
    pub fn opened(&self) -> Vec<RequestId> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_request(&self) -> Option<RequestId> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
    }
}

impl SettingsRedirector for RecordingSettingsRedirector {
    fn open_app_settings(
        &self,
        _ctx: &dyn PromptContext,
        request_id: RequestId,
    ) -> Result<(), NavigationError> {
        if self.failing {
            return Err(NavigationError::Unavailable("recording".into()));
        }
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::ManagedContext;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeSurface {
        name: &'static str,
        applicable: bool,
        works: bool,
        opened: Arc<AtomicUsize>,
    }

    impl NavigationStrategy for FakeSurface {
        fn name(&self) -> &str {
            self.name
        }

        fn is_applicable(&self) -> bool {
            self.applicable
        }

        fn open(&self, _ctx: &dyn PromptContext, _request_id: RequestId) -> Result<(), NavigationError> {
            if self.works {
                self.opened.fetch_add(1, Ordering::SeqCst);
                Ok(())
            } else {
                Err(NavigationError::Unavailable(self.name.into()))
            }
        }
    }

    fn surface(name: &'static str, applicable: bool, works: bool) -> (FakeSurface, Arc<AtomicUsize>) {
        let opened = Arc::new(AtomicUsize::new(0));
        (
            FakeSurface {
                name,
                applicable,
                works,
                opened: opened.clone(),
            },
            opened,
        )
    }

    #[test]
    fn test_chain_skips_inapplicable_and_failing() {
        let (vendor, vendor_opened) = surface("vendor", false, true);
        let (details, details_opened) = surface("app-details", true, false);
        let (manager, manager_opened) = surface("app-manager", true, true);
        let chain = ChainedSettingsRedirector::new()
            .with_strategy(vendor)
            .with_strategy(details)
            .with_strategy(manager);
        let ctx = ManagedContext::new("test");

        chain.open_app_settings(ctx.as_ref(), RequestId::new(1)).unwrap();

        assert_eq!(vendor_opened.load(Ordering::SeqCst), 0);
        assert_eq!(details_opened.load(Ordering::SeqCst), 0);
        assert_eq!(manager_opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_chain_stops_at_first_success() {
        let (vendor, vendor_opened) = surface("vendor", true, true);
        let (details, details_opened) = surface("app-details", true, true);
        let chain = ChainedSettingsRedirector::new()
            .with_strategy(vendor)
            .with_strategy(details);
        let ctx = ManagedContext::new("test");

        chain.open_app_settings(ctx.as_ref(), RequestId::new(1)).unwrap();

        assert_eq!(vendor_opened.load(Ordering::SeqCst), 1);
        assert_eq!(details_opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_chain_exhausted() {
        let (details, _) = surface("app-details", true, false);
        let (manager, _) = surface("app-manager", true, false);
        let chain = ChainedSettingsRedirector::new()
            .with_strategy(details)
            .with_strategy(manager);
        let ctx = ManagedContext::new("test");

        match chain.open_app_settings(ctx.as_ref(), RequestId::new(1)) {
            Err(NavigationError::Exhausted { attempted }) => {
                assert_eq!(attempted, vec!["app-details", "app-manager"]);
            }
            other => panic!("Expected Exhausted, got {:?}", other),
        }
    }

    #[test]
    fn test_chain_requires_active_context() {
        let (manager, opened) = surface("app-manager", true, true);
        let chain = ChainedSettingsRedirector::new().with_strategy(manager);
        let ctx = ManagedContext::new("test");
        ctx.tear_down();

        let result = chain.open_app_settings(ctx.as_ref(), RequestId::new(1));
        assert!(matches!(result, Err(NavigationError::ContextInactive)));
        assert_eq!(opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_command_navigation_missing_program() {
        let nav = CommandNavigation::new("missing", "grantflow-definitely-not-a-program");
        let ctx = ManagedContext::new("test");

        let result = nav.open(ctx.as_ref(), RequestId::new(1));
        assert!(matches!(result, Err(NavigationError::Launch { .. })));
    }

    #[test]
    fn test_command_navigation_condition() {
        let nav = CommandNavigation::new("never", "true").applicable_when(|| false);
        assert!(!nav.is_applicable());
        assert!(CommandNavigation::new("always", "true").is_applicable());
    }

    #[test]
    fn test_recording_redirector() {
        let ctx = ManagedContext::new("test");
        let redirector = RecordingSettingsRedirector::new();
        redirector
            .open_app_settings(ctx.as_ref(), RequestId::new(9))
            .unwrap();
        assert_eq!(redirector.last_request(), Some(RequestId::new(9)));

        let failing = RecordingSettingsRedirector::failing();
        assert!(failing.open_app_settings(ctx.as_ref(), RequestId::new(9)).is_err());
        assert!(failing.opened().is_empty());
    }
}
