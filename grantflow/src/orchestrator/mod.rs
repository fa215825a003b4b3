//! The permission request state machine
//!
//! # States
//!
//! ```text
//!   request()
//!      │
//!      ▼
//!  ┌──────────┐  legacy host / nothing pending       ┌─────────┐
//!  │ Checking │────────────────────────────────────► │ Granted │
//!  └────┬─────┘                                      └─────────┘
//!       │ pending, first pass          pending, re-check
//!       ▼                                   │
//!  AwaitingContext ─► AwaitingRationale     │
//!       │                   │ ack           │
//!       └──────────────►────┴──► AwaitingHostResult
//!                                     │ some denied
//!                                     ▼
//!                         AwaitingDenialChoice ◄───────┘
//!                           │ close          │ settings
//!                           ▼                ▼
//!                       ┌────────┐   AwaitingSettingsReturn ──► Checking
//!                       │ Denied │
//!                       └────────┘
//! ```
//!
//! # Locking
//!
//! Every entry point takes the orchestrator's single lock, runs the
//! transition, and collects [`Effect`]s. Effects (collaborator calls, the
//! outcome callback, context releases) run after the lock is dropped, so a
//! collaborator may answer synchronously from inside its own call.

mod reply;
mod session;

pub use reply::{ContextRequest, DenialReply, RationaleReply};
pub use session::{CycleId, OutcomeCallback};

use grantflow_api::{CapabilityId, Outcome, RequestId, RequestOptions};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::audit::{AuditEvent, AuditEventType, AuditSink};
use crate::catalog::CapabilityCatalog;
use crate::collaborator::{
    DenialPrompt, HostGrantGateway, PromptCollaborator, PromptContextHandle, RationalePrompt,
    SettingsRedirector,
};
use crate::presets::OrchestratorConfig;
use session::{Phase, RequestSession};

/// Error type for orchestrator operations
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The cycle ended without an outcome (superseded, UI gone, stale event)
    #[error("Grant cycle was abandoned before reaching an outcome")]
    Abandoned,
}

/// Observable state of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Checking,
    AwaitingContext,
    AwaitingRationale,
    AwaitingHostResult,
    AwaitingDenialChoice,
    AwaitingSettingsReturn,
}

/// Runtime permission request orchestrator
///
/// Cheap to clone; all clones drive the same state machine. At most one
/// grant cycle is active: a new request silently abandons the previous one.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use grantflow::collaborator::{AutoPromptCollaborator, ManagedContext, MemoryHostGateway};
/// use grantflow::{OrchestratorBuilder, StaticMetadata};
/// use grantflow_api::RequestOptions;
///
/// let host = Arc::new(MemoryHostGateway::new());
/// host.grant("CAMERA");
///
/// let orchestrator = OrchestratorBuilder::new()
///     .metadata(StaticMetadata::new(["CAMERA"]))
///     .gateway_arc(host)
///     .prompt(AutoPromptCollaborator::default().with_context(ManagedContext::new("main")))
///     .build()
///     .unwrap();
///
/// let options = RequestOptions::for_capabilities(["CAMERA"]).unwrap();
/// orchestrator.request(options, |outcome| assert!(outcome.is_granted()));
/// ```
#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    catalog: CapabilityCatalog,
    gateway: Arc<dyn HostGrantGateway>,
    prompt: Arc<dyn PromptCollaborator>,
    settings: Arc<dyn SettingsRedirector>,
    audit: Arc<dyn AuditSink>,
    machine: Mutex<Machine>,
}

#[derive(Debug, Default)]
struct Machine {
    session: Option<RequestSession>,
    cycles: u64,
    request_codes: u16,
}

impl Machine {
    fn next_cycle(&mut self) -> CycleId {
        self.cycles += 1;
        CycleId::new(self.cycles)
    }

    // hosts commonly accept only 16-bit request codes
    fn next_request_id(&mut self) -> RequestId {
        self.request_codes = self.request_codes.checked_add(1).unwrap_or(1);
        RequestId::new(u32::from(self.request_codes))
    }

    fn state(&self) -> OrchestratorState {
        match self.session.as_ref().map(|s| &s.phase) {
            None => OrchestratorState::Idle,
            Some(Phase::Checking) => OrchestratorState::Checking,
            Some(Phase::AwaitingContext) => OrchestratorState::AwaitingContext,
            Some(Phase::AwaitingRationale) => OrchestratorState::AwaitingRationale,
            Some(Phase::AwaitingHostResult(_)) => OrchestratorState::AwaitingHostResult,
            Some(Phase::AwaitingDenialChoice(_)) => OrchestratorState::AwaitingDenialChoice,
            Some(Phase::AwaitingSettingsReturn(_)) => OrchestratorState::AwaitingSettingsReturn,
        }
    }

    /// Active session if it belongs to `cycle`
    fn session_for(&mut self, cycle: CycleId) -> Option<&mut RequestSession> {
        self.session.as_mut().filter(|s| s.cycle == cycle)
    }
}

/// Work deferred until the lock is released
enum Effect {
    Deliver {
        cycle: CycleId,
        callback: OutcomeCallback,
        outcome: Outcome,
    },
    /// Callback of an abandoned cycle, dropped unused
    Discard(OutcomeCallback),
    Release(PromptContextHandle),
    RequestContext(CycleId),
    ShowRationale {
        cycle: CycleId,
        ctx: PromptContextHandle,
        prompt: RationalePrompt,
    },
    AskHost {
        cycle: CycleId,
        ctx: PromptContextHandle,
        capabilities: Vec<CapabilityId>,
        request_id: RequestId,
    },
    ShowDenial {
        cycle: CycleId,
        ctx: PromptContextHandle,
        prompt: DenialPrompt,
    },
    OpenSettings {
        cycle: CycleId,
        ctx: PromptContextHandle,
        request_id: RequestId,
    },
}

type Effects = Vec<Effect>;

impl Orchestrator {
    /// Build an orchestrator from an assembled configuration
    ///
    /// Prefer [`OrchestratorBuilder`](crate::OrchestratorBuilder), which loads
    /// the catalog from a metadata source.
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                catalog: config.catalog,
                gateway: config.gateway,
                prompt: config.prompt,
                settings: config.settings,
                audit: config.audit,
                machine: Mutex::new(Machine::default()),
            }),
        }
    }

    /// Start a grant cycle; `callback` receives its single outcome
    pub fn request<F>(&self, options: RequestOptions, callback: F)
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        self.shared.start(options, None, Box::new(callback));
    }

    /// Start a grant cycle with a prompt context already attached
    pub fn request_with_context<F>(&self, options: RequestOptions, ctx: PromptContextHandle, callback: F)
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        self.shared.start(options, Some(ctx), Box::new(callback));
    }

    /// Start a grant cycle and wait for its outcome
    ///
    /// Resolves to [`OrchestratorError::Abandoned`] when the cycle ends
    /// without an outcome. There is no timeout: a cycle parked on a prompt
    /// or on the host stays pending.
    pub async fn request_async(&self, options: RequestOptions) -> Result<Outcome, OrchestratorError> {
        let (tx, rx) = oneshot::channel();
        self.request(options, move |outcome| {
            let _ = tx.send(outcome);
        });
        rx.await.map_err(|_| OrchestratorError::Abandoned)
    }

    /// Attach the host UI surface prompts are shown against
    pub fn handle_prompt_context(&self, ctx: PromptContextHandle) {
        self.shared.attach_context(None, ctx);
    }

    /// Deliver the host's answer to a grant request
    ///
    /// `grants` is order-aligned with `capabilities`; missing flags count as
    /// denied. Answers for anything but the outstanding request are ignored.
    pub fn notify_host_grant_result(
        &self,
        request_id: RequestId,
        capabilities: &[CapabilityId],
        grants: &[bool],
    ) {
        self.shared.on_host_result(request_id, capabilities, grants);
    }

    /// Report the return from the settings surface
    pub fn notify_settings_return(&self, request_id: RequestId, result_code: i32) {
        self.shared.on_settings_return(request_id, result_code);
    }

    pub fn state(&self) -> OrchestratorState {
        self.shared.lock().state()
    }

    /// Capabilities of the active cycle still known to be denied
    pub fn pending_denials(&self) -> Vec<CapabilityId> {
        self.shared
            .lock()
            .session
            .as_ref()
            .map(|s| s.pending.clone())
            .unwrap_or_default()
    }

    pub fn catalog(&self) -> &CapabilityCatalog {
        &self.shared.catalog
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("declared", &self.shared.catalog.len())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Machine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn audit(&self, event: AuditEvent) {
        if let Err(e) = self.audit.record(event) {
            tracing::warn!(error = %e, "Failed to record audit event");
        }
    }

    // ------------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------------

    fn start(
        self: &Arc<Self>,
        options: RequestOptions,
        ctx: Option<PromptContextHandle>,
        callback: OutcomeCallback,
    ) {
        let mut fx = Effects::new();
        {
            let mut machine = self.lock();
            if let Some(prior) = machine.session.take() {
                let keep = ctx.as_ref();
                self.abandon_session(prior, "superseded by a new request", keep, &mut fx);
            }

            let cycle = machine.next_cycle();
            tracing::info!(%cycle, capabilities = ?options.capabilities(), "Permission request started");
            self.audit(
                AuditEvent::new(AuditEventType::CycleStarted)
                    .with_cycle(cycle)
                    .with_capabilities(options.capabilities()),
            );
            machine.session = Some(RequestSession::new(cycle, options, callback, ctx));
            self.check(&mut machine, &mut fx);
        }
        self.run(fx);
    }

    pub(crate) fn attach_context(self: &Arc<Self>, cycle: Option<CycleId>, ctx: PromptContextHandle) {
        let mut fx = Effects::new();
        {
            let mut machine = self.lock();
            let matches = machine
                .session
                .as_ref()
                .is_some_and(|s| cycle.map_or(true, |c| c == s.cycle));

            if !matches {
                tracing::debug!(?cycle, "Prompt context attached with no matching request, released");
                fx.push(Effect::Release(ctx));
            } else if let Some(session) = machine.session.as_mut() {
                if let Some(old) = session.context.replace(ctx.clone()) {
                    if !Arc::ptr_eq(&old, &ctx) {
                        fx.push(Effect::Release(old));
                    }
                }
                tracing::debug!(cycle = %session.cycle, "Prompt context attached");
                if session.phase == Phase::AwaitingContext {
                    self.prepare_host_ask(&mut machine, &mut fx);
                }
            }
        }
        self.run(fx);
    }

    pub(crate) fn on_rationale_acknowledged(self: &Arc<Self>, cycle: CycleId) {
        let mut fx = Effects::new();
        {
            let mut machine = self.lock();
            let awaiting = matches!(
                machine.session_for(cycle).map(|s| &s.phase),
                Some(Phase::AwaitingRationale)
            );
            if awaiting {
                tracing::debug!(%cycle, "Rationale acknowledged");
                self.ask_host(&mut machine, &mut fx);
            } else {
                self.ignored(Some(cycle), None, "rationale acknowledged for an inactive cycle");
            }
        }
        self.run(fx);
    }

    pub(crate) fn on_denial_closed(self: &Arc<Self>, cycle: CycleId) {
        let mut fx = Effects::new();
        {
            let mut machine = self.lock();
            let denied = match machine.session_for(cycle).map(|s| &s.phase) {
                Some(Phase::AwaitingDenialChoice(denied)) => Some(denied.clone()),
                _ => None,
            };
            match denied {
                Some(denied) => self.finish(&mut machine, Outcome::Denied(denied), &mut fx),
                None => self.ignored(Some(cycle), None, "denial closed for an inactive cycle"),
            }
        }
        self.run(fx);
    }

    pub(crate) fn on_denial_settings(self: &Arc<Self>, cycle: CycleId) {
        let mut fx = Effects::new();
        {
            let mut machine = self.lock();
            let awaiting = matches!(
                machine.session_for(cycle).map(|s| &s.phase),
                Some(Phase::AwaitingDenialChoice(_))
            );
            if awaiting {
                self.open_settings(&mut machine, &mut fx);
            } else {
                self.ignored(Some(cycle), None, "settings chosen for an inactive cycle");
            }
        }
        self.run(fx);
    }

    pub(crate) fn on_prompt_dismissed(self: &Arc<Self>, cycle: CycleId, reason: &str) {
        let mut fx = Effects::new();
        {
            let mut machine = self.lock();
            let prompting = matches!(
                machine.session_for(cycle).map(|s| &s.phase),
                Some(Phase::AwaitingRationale) | Some(Phase::AwaitingDenialChoice(_))
            );
            if prompting {
                if let Some(session) = machine.session.take() {
                    self.abandon_session(session, reason, None, &mut fx);
                }
            }
        }
        self.run(fx);
    }

    fn on_host_result(self: &Arc<Self>, request_id: RequestId, capabilities: &[CapabilityId], grants: &[bool]) {
        let mut fx = Effects::new();
        {
            let mut machine = self.lock();
            let session = match machine.session.as_mut() {
                Some(s) if s.phase == Phase::AwaitingHostResult(request_id) => s,
                other => {
                    let cycle = other.map(|s| s.cycle);
                    self.ignored(cycle, Some(request_id), "host result does not match an outstanding request");
                    return;
                }
            };
            let cycle = session.cycle;

            let mut denied = Vec::new();
            for (i, capability) in capabilities.iter().enumerate() {
                if !grants.get(i).copied().unwrap_or(false) {
                    denied.push(capability.clone());
                }
            }
            tracing::info!(
                %cycle,
                %request_id,
                granted = capabilities.len() - denied.len(),
                denied = denied.len(),
                "Host grant result received"
            );
            self.audit(
                AuditEvent::new(AuditEventType::HostResult)
                    .with_cycle(cycle)
                    .with_request_id(request_id)
                    .with_capabilities(&denied),
            );

            // an empty result (interrupted dialog) has nothing denied
            if denied.is_empty() {
                self.finish(&mut machine, Outcome::Granted, &mut fx);
            } else {
                self.show_denial(&mut machine, denied, &mut fx);
            }
        }
        self.run(fx);
    }

    fn on_settings_return(self: &Arc<Self>, request_id: RequestId, result_code: i32) {
        let mut fx = Effects::new();
        {
            let mut machine = self.lock();
            let expected = match machine.session.as_ref().map(|s| (s.cycle, &s.phase)) {
                None => {
                    self.ignored(None, Some(request_id), "settings return with no active request");
                    return;
                }
                Some((_, Phase::AwaitingSettingsReturn(expected))) => *expected,
                Some((cycle, _)) => {
                    self.ignored(Some(cycle), Some(request_id), "settings return while not awaiting one");
                    return;
                }
            };

            if expected != request_id {
                if let Some(session) = machine.session.take() {
                    self.abandon_session(session, "settings return carried an unexpected request id", None, &mut fx);
                }
            } else if let Some(session) = machine.session.as_mut() {
                tracing::info!(cycle = %session.cycle, %request_id, result_code, "Returned from settings");
                self.audit(
                    AuditEvent::new(AuditEventType::SettingsReturned)
                        .with_cycle(session.cycle)
                        .with_request_id(request_id),
                );
                session.from_settings = true;
                self.check(&mut machine, &mut fx);
            }
        }
        self.run(fx);
    }

    // ------------------------------------------------------------------------
    // Transitions (lock held)
    // ------------------------------------------------------------------------

    fn check(&self, machine: &mut Machine, fx: &mut Effects) {
        let Some(session) = machine.session.as_mut() else {
            return;
        };
        session.phase = Phase::Checking;

        if !self.gateway.supports_runtime_grants() {
            // Such hosts grant everything at install time. The first requested
            // capability is still looked up, for the log and audit trail only.
            let first = session.options.capabilities().first().cloned();
            let cycle = session.cycle;
            let mut event = AuditEvent::new(AuditEventType::LegacyBypass).with_cycle(cycle);
            match first {
                Some(first) if !self.gateway.check_granted(&first) => {
                    tracing::warn!(%cycle, capability = %first, "Legacy host reports first capability not granted");
                    event = event
                        .with_capabilities(std::slice::from_ref(&first))
                        .with_reason("first capability not granted");
                }
                _ => tracing::info!(%cycle, "Host predates runtime grants, legacy check applied"),
            }
            self.audit(event);
            self.finish(machine, Outcome::Granted, fx);
            return;
        }

        session.recompute_pending(&self.catalog, self.gateway.as_ref());
        tracing::debug!(cycle = %session.cycle, pending = ?session.pending, "Grant state checked");

        if session.pending.is_empty() {
            self.finish(machine, Outcome::Granted, fx);
        } else if session.from_settings {
            let denied = session.pending.clone();
            self.show_denial(machine, denied, fx);
        } else {
            self.prepare_host_ask(machine, fx);
        }
    }

    fn prepare_host_ask(&self, machine: &mut Machine, fx: &mut Effects) {
        let Some(session) = machine.session.as_mut() else {
            return;
        };
        let cycle = session.cycle;

        if session.context.is_none() {
            session.phase = Phase::AwaitingContext;
            tracing::debug!(%cycle, "Waiting for a prompt context");
            self.audit(AuditEvent::new(AuditEventType::ContextRequested).with_cycle(cycle));
            fx.push(Effect::RequestContext(cycle));
            return;
        }
        let Some(ctx) = session.live_context() else {
            self.abandon_active(machine, "prompt context is no longer active", fx);
            return;
        };

        let rationale = session
            .pending
            .iter()
            .any(|capability| self.gateway.should_show_rationale(ctx.as_ref(), capability));

        if rationale {
            session.phase = Phase::AwaitingRationale;
            let prompt = RationalePrompt {
                message: session.options.rationale_message().to_string(),
                button: session.options.rationale_button().to_string(),
                capabilities: session.pending.clone(),
            };
            tracing::debug!(%cycle, "Showing rationale");
            self.audit(
                AuditEvent::new(AuditEventType::RationaleShown)
                    .with_cycle(cycle)
                    .with_capabilities(&prompt.capabilities),
            );
            fx.push(Effect::ShowRationale { cycle, ctx, prompt });
        } else {
            self.ask_host(machine, fx);
        }
    }

    fn ask_host(&self, machine: &mut Machine, fx: &mut Effects) {
        let request_id = machine.next_request_id();
        let Some(session) = machine.session.as_mut() else {
            return;
        };
        let Some(ctx) = session.live_context() else {
            self.abandon_active(machine, "prompt context is no longer active", fx);
            return;
        };

        let cycle = session.cycle;
        session.phase = Phase::AwaitingHostResult(request_id);
        let capabilities = session.pending.clone();
        tracing::info!(%cycle, %request_id, capabilities = ?capabilities, "Asking host for grants");
        self.audit(
            AuditEvent::new(AuditEventType::HostAsked)
                .with_cycle(cycle)
                .with_request_id(request_id)
                .with_capabilities(&capabilities),
        );
        fx.push(Effect::AskHost {
            cycle,
            ctx,
            capabilities,
            request_id,
        });
    }

    fn show_denial(&self, machine: &mut Machine, denied: Vec<CapabilityId>, fx: &mut Effects) {
        let Some(session) = machine.session.as_mut() else {
            return;
        };
        let Some(ctx) = session.live_context() else {
            self.abandon_active(machine, "no live prompt context for the denial prompt", fx);
            return;
        };

        let cycle = session.cycle;
        let prompt = DenialPrompt {
            message: session.options.denied_message().to_string(),
            close_button: session.options.denied_close_button().to_string(),
            settings_button: session.options.denied_settings_button().to_string(),
            capabilities: denied.clone(),
        };
        session.pending = denied.clone();
        session.phase = Phase::AwaitingDenialChoice(denied);
        tracing::debug!(%cycle, denied = ?prompt.capabilities, "Showing denial prompt");
        self.audit(
            AuditEvent::new(AuditEventType::DenialShown)
                .with_cycle(cycle)
                .with_capabilities(&prompt.capabilities),
        );
        fx.push(Effect::ShowDenial { cycle, ctx, prompt });
    }

    fn open_settings(&self, machine: &mut Machine, fx: &mut Effects) {
        let request_id = machine.next_request_id();
        let Some(session) = machine.session.as_mut() else {
            return;
        };
        let Some(ctx) = session.live_context() else {
            self.abandon_active(machine, "prompt context is no longer active", fx);
            return;
        };

        let cycle = session.cycle;
        session.phase = Phase::AwaitingSettingsReturn(request_id);
        tracing::info!(%cycle, %request_id, "Redirecting to settings");
        fx.push(Effect::OpenSettings {
            cycle,
            ctx,
            request_id,
        });
    }

    fn finish(&self, machine: &mut Machine, outcome: Outcome, fx: &mut Effects) {
        let Some(mut session) = machine.session.take() else {
            return;
        };
        let cycle = session.cycle;

        match &outcome {
            Outcome::Granted => {
                tracing::info!(%cycle, "Permissions granted");
                self.audit(AuditEvent::new(AuditEventType::Granted).with_cycle(cycle));
            }
            Outcome::Denied(denied) => {
                tracing::info!(%cycle, denied = ?denied, "Permissions denied");
                self.audit(
                    AuditEvent::new(AuditEventType::Denied)
                        .with_cycle(cycle)
                        .with_capabilities(denied),
                );
            }
        }

        if let Some(callback) = session.callback.take() {
            fx.push(Effect::Deliver {
                cycle,
                callback,
                outcome,
            });
        }
        if let Some(ctx) = session.context.take() {
            fx.push(Effect::Release(ctx));
        }
    }

    fn abandon_active(&self, machine: &mut Machine, reason: &str, fx: &mut Effects) {
        if let Some(session) = machine.session.take() {
            self.abandon_session(session, reason, None, fx);
        }
    }

    /// End a session without an outcome
    fn abandon_session(
        &self,
        mut session: RequestSession,
        reason: &str,
        keep: Option<&PromptContextHandle>,
        fx: &mut Effects,
    ) {
        tracing::warn!(cycle = %session.cycle, reason, "Grant cycle abandoned");
        self.audit(
            AuditEvent::new(AuditEventType::Abandoned)
                .with_cycle(session.cycle)
                .with_reason(reason),
        );
        if let Some(callback) = session.callback.take() {
            fx.push(Effect::Discard(callback));
        }
        if let Some(ctx) = session.context.take() {
            if !keep.is_some_and(|kept| Arc::ptr_eq(kept, &ctx)) {
                fx.push(Effect::Release(ctx));
            }
        }
    }

    fn ignored(&self, cycle: Option<CycleId>, request_id: Option<RequestId>, reason: &str) {
        tracing::debug!(?cycle, ?request_id, reason, "Event ignored");
        let mut event = AuditEvent::new(AuditEventType::EventIgnored).with_reason(reason);
        event.cycle = cycle;
        event.request_id = request_id;
        self.audit(event);
    }

    // ------------------------------------------------------------------------
    // Effects (lock released)
    // ------------------------------------------------------------------------

    fn run(self: &Arc<Self>, effects: Effects) {
        for effect in effects {
            match effect {
                Effect::Deliver {
                    cycle,
                    callback,
                    outcome,
                } => {
                    tracing::debug!(%cycle, granted = outcome.is_granted(), "Delivering outcome");
                    callback(outcome);
                }
                Effect::Discard(callback) => drop(callback),
                Effect::Release(ctx) => ctx.release(),
                Effect::RequestContext(cycle) => {
                    self.prompt
                        .request_context(ContextRequest::new(Arc::downgrade(self), cycle));
                }
                Effect::ShowRationale { cycle, ctx, prompt } => {
                    let reply = RationaleReply::new(Arc::downgrade(self), cycle);
                    self.prompt.show_rationale(ctx.as_ref(), prompt, reply);
                }
                Effect::AskHost {
                    cycle,
                    ctx,
                    capabilities,
                    request_id,
                } => {
                    tracing::trace!(%cycle, %request_id, "Dispatching host grant request");
                    self.gateway
                        .request_grant(ctx.as_ref(), &capabilities, request_id);
                }
                Effect::ShowDenial { cycle, ctx, prompt } => {
                    let reply = DenialReply::new(Arc::downgrade(self), cycle);
                    self.prompt.show_denial(ctx.as_ref(), prompt, reply);
                }
                Effect::OpenSettings {
                    cycle,
                    ctx,
                    request_id,
                } => match self.settings.open_app_settings(ctx.as_ref(), request_id) {
                    Ok(()) => self.audit(
                        AuditEvent::new(AuditEventType::SettingsOpened)
                            .with_cycle(cycle)
                            .with_request_id(request_id),
                    ),
                    Err(e) => {
                        // the cycle stays parked waiting for a return
                        tracing::error!(%cycle, %request_id, error = %e, "Settings surface could not be opened");
                        self.audit(
                            AuditEvent::new(AuditEventType::NavigationFailed)
                                .with_cycle(cycle)
                                .with_request_id(request_id)
                                .with_reason(e.to_string()),
                        );
                    }
                },
            }
        }
    }
}
