//! Rationale and denial prompts
//!
//! Provides trait-based prompt handling so embedders can render the two
//! orchestrator prompts with whatever UI they have.

use grantflow_api::CapabilityId;
use std::io::{self, BufRead, Write};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use super::{PromptContext, PromptContextHandle};
use crate::orchestrator::{ContextRequest, DenialReply, RationaleReply};

/// Rationale shown before the host is asked again
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RationalePrompt {
    pub message: String,
    pub button: String,
    /// Capabilities still pending, in request order
    pub capabilities: Vec<CapabilityId>,
}

/// Prompt shown after the host denied some capabilities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenialPrompt {
    pub message: String,
    pub close_button: String,
    pub settings_button: String,
    /// Exactly the denied capabilities, in request order
    pub capabilities: Vec<CapabilityId>,
}

/// Trait for showing orchestrator prompts
///
/// Every prompt carries a single-use reply token. Resolve it once the user
/// picks a button; drop it unresolved if the prompt can no longer be shown
/// (the orchestrator then abandons the cycle silently).
///
/// # Example
///
/// ```rust
/// use grantflow::collaborator::{DenialPrompt, PromptCollaborator, PromptContext, RationalePrompt};
/// use grantflow::{DenialReply, RationaleReply};
///
/// struct ToastPrompts;
///
/// impl PromptCollaborator for ToastPrompts {
///     fn show_rationale(&self, _ctx: &dyn PromptContext, prompt: RationalePrompt, reply: RationaleReply) {
///         println!("{}", prompt.message);
///         reply.acknowledge();
///     }
///
///     fn show_denial(&self, _ctx: &dyn PromptContext, prompt: DenialPrompt, reply: DenialReply) {
///         println!("{}", prompt.message);
///         reply.close();
///     }
/// }
/// ```
pub trait PromptCollaborator: Send + Sync {
    /// The orchestrator needs a prompt context and none is attached
    ///
    /// Open the surface and attach it through the request. The default does
    /// nothing; the embedder then calls
    /// [`Orchestrator::handle_prompt_context`](crate::Orchestrator::handle_prompt_context).
    fn request_context(&self, request: ContextRequest) {
        let _ = request;
    }

    /// Show the rationale prompt
    fn show_rationale(&self, ctx: &dyn PromptContext, prompt: RationalePrompt, reply: RationaleReply);

    /// Show the denial prompt
    fn show_denial(&self, ctx: &dyn PromptContext, prompt: DenialPrompt, reply: DenialReply);
}

// ============================================================================
// Auto Prompt Collaborator
// ============================================================================

/// Scripted answer to a rationale prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RationaleAnswer {
    #[default]
    Acknowledge,
    /// Drop the prompt unanswered
    Dismiss,
}

/// Scripted answer to a denial prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DenialAnswer {
    #[default]
    Close,
    OpenSettings,
    /// Drop the prompt unanswered
    Dismiss,
}

/// Collaborator that answers every prompt immediately
#[derive(Debug, Default)]
pub struct AutoPromptCollaborator {
    rationale: RationaleAnswer,
    denial: DenialAnswer,
    context: Option<PromptContextHandle>,
}

impl AutoPromptCollaborator {
    pub fn new(rationale: RationaleAnswer, denial: DenialAnswer) -> Self {
        Self {
            rationale,
            denial,
            context: None,
        }
    }

    /// Acknowledge rationales, close denials
    pub fn acknowledge_and_close() -> Self {
        Self::new(RationaleAnswer::Acknowledge, DenialAnswer::Close)
    }

    /// Drop every prompt unanswered
    pub fn dismiss_all() -> Self {
        Self::new(RationaleAnswer::Dismiss, DenialAnswer::Dismiss)
    }

    /// Attach this context whenever the orchestrator asks for one
    pub fn with_context(mut self, ctx: PromptContextHandle) -> Self {
        self.context = Some(ctx);
        self
    }
}

impl PromptCollaborator for AutoPromptCollaborator {
    fn request_context(&self, request: ContextRequest) {
        if let Some(ctx) = &self.context {
            request.attach(ctx.clone());
        }
    }

    fn show_rationale(&self, _ctx: &dyn PromptContext, _prompt: RationalePrompt, reply: RationaleReply) {
        match self.rationale {
            RationaleAnswer::Acknowledge => reply.acknowledge(),
            RationaleAnswer::Dismiss => drop(reply),
        }
    }

    fn show_denial(&self, _ctx: &dyn PromptContext, _prompt: DenialPrompt, reply: DenialReply) {
        match self.denial {
            DenialAnswer::Close => reply.close(),
            DenialAnswer::OpenSettings => reply.open_settings(),
            DenialAnswer::Dismiss => drop(reply),
        }
    }
}

// ============================================================================
// Recording Prompt Collaborator (for testing)
// ============================================================================

/// Kind of a recorded prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Rationale,
    Denial,
}

/// A recorded prompt
#[derive(Debug, Clone)]
pub struct RecordedPrompt {
    pub kind: PromptKind,
    pub message: String,
    pub capabilities: Vec<CapabilityId>,
}

/// A prompt waiting for the test to resolve it
#[derive(Debug)]
pub enum PendingPrompt {
    Rationale {
        prompt: RationalePrompt,
        reply: RationaleReply,
    },
    Denial {
        prompt: DenialPrompt,
        reply: DenialReply,
    },
}

/// Collaborator that parks prompts so tests can resolve them later
#[derive(Debug, Default)]
pub struct RecordingPromptCollaborator {
    pending: Mutex<Vec<PendingPrompt>>,
    history: Mutex<Vec<RecordedPrompt>>,
    context_requests: Mutex<Vec<ContextRequest>>,
    context: Option<PromptContextHandle>,
}

impl RecordingPromptCollaborator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach this context whenever the orchestrator asks for one
    pub fn with_context(mut self, ctx: PromptContextHandle) -> Self {
        self.context = Some(ctx);
        self
    }

    /// Take the most recent unresolved rationale prompt
    pub fn take_rationale(&self) -> Option<(RationalePrompt, RationaleReply)> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let pos = pending
            .iter()
            .rposition(|p| matches!(p, PendingPrompt::Rationale { .. }))?;
        match pending.remove(pos) {
            PendingPrompt::Rationale { prompt, reply } => Some((prompt, reply)),
            PendingPrompt::Denial { .. } => None,
        }
    }

    /// Take the most recent unresolved denial prompt
    pub fn take_denial(&self) -> Option<(DenialPrompt, DenialReply)> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let pos = pending
            .iter()
            .rposition(|p| matches!(p, PendingPrompt::Denial { .. }))?;
        match pending.remove(pos) {
            PendingPrompt::Denial { prompt, reply } => Some((prompt, reply)),
            PendingPrompt::Rationale { .. } => None,
        }
    }

    /// Take the most recent unanswered context request
    pub fn take_context_request(&self) -> Option<ContextRequest> {
        self.context_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
    }

    /// Every prompt shown so far
    pub fn prompts(&self) -> Vec<RecordedPrompt> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn rationale_count(&self) -> usize {
        self.count(PromptKind::Rationale)
    }

    pub fn denial_count(&self) -> usize {
        self.count(PromptKind::Denial)
    }

    fn count(&self, kind: PromptKind) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|p| p.kind == kind)
            .count()
    }

    fn record(&self, kind: PromptKind, message: &str, capabilities: &[CapabilityId]) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedPrompt {
                kind,
                message: message.to_string(),
                capabilities: capabilities.to_vec(),
            });
    }
}

impl PromptCollaborator for RecordingPromptCollaborator {
    fn request_context(&self, request: ContextRequest) {
        match &self.context {
            Some(ctx) => request.attach(ctx.clone()),
            None => self
                .context_requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request),
        }
    }

    fn show_rationale(&self, _ctx: &dyn PromptContext, prompt: RationalePrompt, reply: RationaleReply) {
        self.record(PromptKind::Rationale, &prompt.message, &prompt.capabilities);
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PendingPrompt::Rationale { prompt, reply });
    }

    fn show_denial(&self, _ctx: &dyn PromptContext, prompt: DenialPrompt, reply: DenialReply) {
        self.record(PromptKind::Denial, &prompt.message, &prompt.capabilities);
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PendingPrompt::Denial { prompt, reply });
    }
}

// ============================================================================
// Terminal Prompt Collaborator
// ============================================================================

/// Line input shared between the prompt collaborator and whoever else reads
/// answers from the same source
pub type SharedInput = Arc<Mutex<dyn BufRead + Send>>;

/// Terminal-based prompts
///
/// Blocks on its input while a prompt is open. Stdin is locked only for the
/// duration of a single read. In a non-interactive environment every prompt
/// is dropped unanswered unless an explicit input is attached.
pub struct TerminalPromptCollaborator {
    /// Whether to list the capabilities under the message
    verbose: bool,
    input: Option<SharedInput>,
}

impl TerminalPromptCollaborator {
    pub fn new() -> Self {
        Self {
            verbose: true,
            input: None,
        }
    }

    /// Show only the message and the buttons
    pub fn minimal() -> Self {
        Self {
            verbose: false,
            input: None,
        }
    }

    /// Read answers from `input` instead of stdin; the tty check is skipped
    pub fn with_input(mut self, input: SharedInput) -> Self {
        self.input = Some(input);
        self
    }

    fn is_interactive(&self) -> bool {
        self.input.is_some() || atty_check()
    }

    fn format_capabilities(&self, caps: &[CapabilityId]) -> String {
        caps.iter()
            .map(|c| format!("  - {}", c))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn read_answer(&self) -> io::Result<Option<String>> {
        let mut input = String::new();
        let read = match &self.input {
            Some(shared) => shared
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .read_line(&mut input)?,
            None => io::stdin().lock().read_line(&mut input)?,
        };
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(input.trim().to_lowercase()))
    }

    fn rationale_dialog(&self, prompt: &RationalePrompt) -> io::Result<bool> {
        let mut stdout = io::stdout();

        writeln!(stdout)?;
        writeln!(stdout, "{}", prompt.message)?;
        if self.verbose {
            writeln!(stdout, "{}", self.format_capabilities(&prompt.capabilities))?;
        }
        write!(stdout, "[{}] (press Enter) ", prompt.button)?;
        stdout.flush()?;

        Ok(self.read_answer()?.is_some())
    }

    fn denial_dialog(&self, prompt: &DenialPrompt) -> io::Result<Option<DenialAnswer>> {
        let mut stdout = io::stdout();

        writeln!(stdout)?;
        writeln!(stdout, "{}", prompt.message)?;
        if self.verbose {
            writeln!(stdout, "{}", self.format_capabilities(&prompt.capabilities))?;
        }
        write!(
            stdout,
            "[c] {} / [s] {}: ",
            prompt.close_button, prompt.settings_button
        )?;
        stdout.flush()?;

        Ok(self.read_answer()?.map(|input| parse_denial_answer(&input)))
    }
}

impl fmt::Debug for TerminalPromptCollaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalPromptCollaborator")
            .field("verbose", &self.verbose)
            .field("shared_input", &self.input.is_some())
            .finish()
    }
}

impl Default for TerminalPromptCollaborator {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptCollaborator for TerminalPromptCollaborator {
    fn show_rationale(&self, ctx: &dyn PromptContext, prompt: RationalePrompt, reply: RationaleReply) {
        if !self.is_interactive() || !ctx.is_active() {
            tracing::warn!("Terminal not interactive, rationale prompt dropped");
            return;
        }
        match self.rationale_dialog(&prompt) {
            Ok(true) => reply.acknowledge(),
            Ok(false) => tracing::info!("Rationale prompt closed without answer"),
            Err(e) => tracing::warn!(error = %e, "Rationale prompt failed"),
        }
    }

    fn show_denial(&self, ctx: &dyn PromptContext, prompt: DenialPrompt, reply: DenialReply) {
        if !self.is_interactive() || !ctx.is_active() {
            tracing::warn!("Terminal not interactive, denial prompt dropped");
            return;
        }
        match self.denial_dialog(&prompt) {
            Ok(Some(DenialAnswer::OpenSettings)) => reply.open_settings(),
            Ok(Some(_)) => reply.close(),
            Ok(None) => tracing::info!("Denial prompt closed without answer"),
            Err(e) => tracing::warn!(error = %e, "Denial prompt failed"),
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Interpret terminal input for the denial prompt; anything unknown closes
fn parse_denial_answer(input: &str) -> DenialAnswer {
    match input {
        "s" | "settings" => DenialAnswer::OpenSettings,
        _ => DenialAnswer::Close,
    }
}

/// Check if stdout is connected to a terminal
fn atty_check() -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: isatty is safe to call with any file descriptor
        unsafe { libc::isatty(std::io::stdout().as_raw_fd()) != 0 }
    }

    #[cfg(windows)]
    {
        use std::os::windows::io::AsRawHandle;
        use windows_sys::Win32::System::Console::{GetConsoleMode, CONSOLE_MODE};
        let handle = std::io::stdout().as_raw_handle();
        let mut mode: CONSOLE_MODE = 0;
        // SAFETY: GetConsoleMode is safe with valid handle
        unsafe { GetConsoleMode(handle as _, &mut mode) != 0 }
    }

    #[cfg(not(any(unix, windows)))]
    {
        std::env::var("TERM").is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_denial_answer() {
        assert_eq!(parse_denial_answer("s"), DenialAnswer::OpenSettings);
        assert_eq!(parse_denial_answer("settings"), DenialAnswer::OpenSettings);
        assert_eq!(parse_denial_answer("c"), DenialAnswer::Close);
        assert_eq!(parse_denial_answer(""), DenialAnswer::Close);
        assert_eq!(parse_denial_answer("maybe"), DenialAnswer::Close);
    }

    #[test]
    fn test_format_capabilities() {
        let terminal = TerminalPromptCollaborator::new();
        let formatted = terminal.format_capabilities(&["CAMERA".into(), "LOCATION".into()]);
        assert_eq!(formatted, "  - CAMERA\n  - LOCATION");
    }

    #[test]
    fn test_terminal_reads_shared_input() {
        let input: SharedInput = Arc::new(Mutex::new(io::Cursor::new("  Settings \n")));
        let terminal = TerminalPromptCollaborator::minimal().with_input(input.clone());

        assert!(terminal.is_interactive());
        assert_eq!(terminal.read_answer().unwrap().as_deref(), Some("settings"));
        assert_eq!(terminal.read_answer().unwrap(), None);

        // the shared reader is free again after each read
        let mut rest = String::new();
        assert_eq!(input.lock().unwrap().read_line(&mut rest).unwrap(), 0);
    }

    #[test]
    fn test_auto_defaults() {
        let auto = AutoPromptCollaborator::default();
        assert_eq!(auto.rationale, RationaleAnswer::Acknowledge);
        assert_eq!(auto.denial, DenialAnswer::Close);
        assert!(auto.context.is_none());
    }

    #[test]
    fn test_recording_starts_empty() {
        let recording = RecordingPromptCollaborator::new();
        assert!(recording.take_rationale().is_none());
        assert!(recording.take_denial().is_none());
        assert!(recording.take_context_request().is_none());
        assert_eq!(recording.rationale_count(), 0);
    }
}
