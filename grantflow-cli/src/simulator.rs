//! Terminal stand-in for a host with runtime grants
//!
//! The orchestrator drives rationale and denial prompts itself. This module
//! plays the two parts a real host would: the grant dialog and the settings
//! surface, both answered from stdin.

use std::io::{self, Write};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{bail, Context, Result};
use grantflow::collaborator::{
    ManagedContext, MemoryHostGateway, RecordingSettingsRedirector, SharedInput,
};
use grantflow::{CapabilityId, Orchestrator, OrchestratorState, Outcome, RequestOptions};

/// How a simulated cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationResult {
    Finished(Outcome),
    /// No outcome: a prompt was dismissed or the terminal went away
    Abandoned,
    /// Settings could not be opened; a real host would wait forever here
    Stalled,
}

impl SimulationResult {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Finished(Outcome::Granted) => 0,
            Self::Finished(Outcome::Denied(_)) => 1,
            Self::Abandoned => 2,
            Self::Stalled => 3,
        }
    }
}

/// Answers the host-side questions of a cycle
pub trait HostDriver {
    /// Whether the user allows `capability` in the host dialog
    fn allow(&mut self, capability: &CapabilityId) -> Result<bool>;

    /// Whether the user flips `capability` on in the settings surface
    fn toggle_in_settings(&mut self, capability: &CapabilityId) -> Result<bool>;
}

/// Reads answers from a line source shared with the terminal prompts
///
/// The source is locked per answer, never across an orchestrator call, so
/// prompts raised while a notification is processed can read from it too.
pub struct LineDriver {
    input: SharedInput,
}

impl LineDriver {
    pub fn new(input: SharedInput) -> Self {
        Self { input }
    }

    /// Shared reader over the process stdin
    pub fn stdin_input() -> SharedInput {
        Arc::new(Mutex::new(io::BufReader::new(io::stdin())))
    }

    fn ask(&mut self, question: &str) -> Result<bool> {
        let mut stdout = io::stdout();
        write!(stdout, "{} [y/N] ", question)?;
        stdout.flush()?;

        let mut line = String::new();
        let read = self
            .input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .read_line(&mut line)?;
        if read == 0 {
            return Ok(false);
        }
        Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}

impl HostDriver for LineDriver {
    fn allow(&mut self, capability: &CapabilityId) -> Result<bool> {
        self.ask(&format!("[host] Allow {}?", capability))
    }

    fn toggle_in_settings(&mut self, capability: &CapabilityId) -> Result<bool> {
        self.ask(&format!("[settings] Turn on {}?", capability))
    }
}

/// One orchestrator wired to a simulated host
pub struct Simulator {
    pub orchestrator: Orchestrator,
    pub host: Arc<MemoryHostGateway>,
    pub settings: Arc<RecordingSettingsRedirector>,
}

impl Simulator {
    /// Run a single cycle to completion
    pub fn run(&self, options: RequestOptions, driver: &mut dyn HostDriver) -> Result<SimulationResult> {
        let requested = options.capabilities().to_vec();
        let (tx, rx) = mpsc::channel();
        let ctx = ManagedContext::new("terminal");

        self.orchestrator
            .request_with_context(options, ctx.clone(), move |outcome| {
                let _ = tx.send(outcome);
            });

        let mut seen_settings = 0;
        loop {
            if let Ok(outcome) = rx.try_recv() {
                return Ok(SimulationResult::Finished(outcome));
            }

            match self.orchestrator.state() {
                OrchestratorState::Idle => return Ok(SimulationResult::Abandoned),
                OrchestratorState::AwaitingHostResult => {
                    let ask = self
                        .host
                        .last_ask()
                        .context("orchestrator awaits a host result but never asked")?;
                    let mut grants = Vec::with_capacity(ask.capabilities.len());
                    for capability in &ask.capabilities {
                        let allowed = driver.allow(capability)?;
                        if allowed {
                            self.host.grant(capability.clone());
                        }
                        grants.push(allowed);
                    }
                    self.orchestrator
                        .notify_host_grant_result(ask.request_id, &ask.capabilities, &grants);
                }
                OrchestratorState::AwaitingSettingsReturn => {
                    let opened = self.settings.opened();
                    if opened.len() == seen_settings {
                        return Ok(SimulationResult::Stalled);
                    }
                    seen_settings = opened.len();
                    let request_id = opened[seen_settings - 1];

                    for capability in self.denied_now(&requested) {
                        if driver.toggle_in_settings(&capability)? {
                            self.host.grant(capability);
                        }
                    }
                    self.orchestrator.notify_settings_return(request_id, 0);
                }
                state => bail!("simulated cycle stuck in {:?}", state),
            }
        }
    }

    fn denied_now(&self, requested: &[CapabilityId]) -> Vec<CapabilityId> {
        let catalog = self.orchestrator.catalog();
        let mut denied: Vec<CapabilityId> = Vec::new();
        for capability in requested {
            if catalog.contains(capability)
                && !self.host.is_granted(capability)
                && !denied.contains(capability)
            {
                denied.push(capability.clone());
            }
        }
        denied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grantflow::collaborator::{
        AutoPromptCollaborator, DenialAnswer, RationaleAnswer, TerminalPromptCollaborator,
    };
    use grantflow::{OrchestratorBuilder, StaticMetadata};

    struct Scripted {
        allow: Vec<bool>,
        toggle: Vec<bool>,
    }

    impl HostDriver for Scripted {
        fn allow(&mut self, _capability: &CapabilityId) -> Result<bool> {
            Ok(if self.allow.is_empty() { false } else { self.allow.remove(0) })
        }

        fn toggle_in_settings(&mut self, _capability: &CapabilityId) -> Result<bool> {
            Ok(if self.toggle.is_empty() { false } else { self.toggle.remove(0) })
        }
    }

    fn simulator(denial: DenialAnswer, settings: RecordingSettingsRedirector) -> Simulator {
        let host = Arc::new(MemoryHostGateway::new());
        let settings = Arc::new(settings);
        let orchestrator = OrchestratorBuilder::new()
            .metadata(StaticMetadata::new(["CAMERA", "MICROPHONE"]))
            .gateway_arc(host.clone())
            .prompt(AutoPromptCollaborator::new(RationaleAnswer::Acknowledge, denial))
            .settings_arc(settings.clone())
            .build()
            .unwrap();
        Simulator {
            orchestrator,
            host,
            settings,
        }
    }

    fn options() -> RequestOptions {
        RequestOptions::for_capabilities(["CAMERA", "MICROPHONE"]).unwrap()
    }

    #[test]
    fn test_host_allows_everything() {
        let sim = simulator(DenialAnswer::Close, RecordingSettingsRedirector::new());
        let mut driver = Scripted {
            allow: vec![true, true],
            toggle: vec![],
        };

        let result = sim.run(options(), &mut driver).unwrap();
        assert_eq!(result, SimulationResult::Finished(Outcome::Granted));
        assert_eq!(result.exit_code(), 0);
    }

    #[test]
    fn test_denied_and_closed() {
        let sim = simulator(DenialAnswer::Close, RecordingSettingsRedirector::new());
        let mut driver = Scripted {
            allow: vec![true, false],
            toggle: vec![],
        };

        let result = sim.run(options(), &mut driver).unwrap();
        assert_eq!(
            result,
            SimulationResult::Finished(Outcome::Denied(vec!["MICROPHONE".into()]))
        );
        assert_eq!(result.exit_code(), 1);
    }

    #[test]
    fn test_settings_toggle_grants() {
        let sim = simulator(DenialAnswer::OpenSettings, RecordingSettingsRedirector::new());
        let mut driver = Scripted {
            allow: vec![false, false],
            toggle: vec![true, true],
        };

        let result = sim.run(options(), &mut driver).unwrap();
        assert_eq!(result, SimulationResult::Finished(Outcome::Granted));
    }

    #[test]
    fn test_failed_navigation_stalls() {
        let sim = simulator(DenialAnswer::OpenSettings, RecordingSettingsRedirector::failing());
        let mut driver = Scripted {
            allow: vec![false],
            toggle: vec![],
        };

        let result = sim.run(options(), &mut driver).unwrap();
        assert_eq!(result, SimulationResult::Stalled);
        assert_eq!(result.exit_code(), 3);
    }

    #[test]
    fn test_dismissed_denial_abandons() {
        let sim = simulator(DenialAnswer::Dismiss, RecordingSettingsRedirector::new());
        let mut driver = Scripted {
            allow: vec![false, false],
            toggle: vec![],
        };

        let result = sim.run(options(), &mut driver).unwrap();
        assert_eq!(result, SimulationResult::Abandoned);
    }

    fn shared(text: &'static str) -> SharedInput {
        Arc::new(Mutex::new(io::Cursor::new(text)))
    }

    fn terminal_simulator(input: SharedInput, host: MemoryHostGateway) -> Simulator {
        let host = Arc::new(host);
        let settings = Arc::new(RecordingSettingsRedirector::new());
        let orchestrator = OrchestratorBuilder::new()
            .metadata(StaticMetadata::new(["CAMERA"]))
            .gateway_arc(host.clone())
            .prompt(TerminalPromptCollaborator::minimal().with_input(input))
            .settings_arc(settings.clone())
            .build()
            .unwrap();
        Simulator {
            orchestrator,
            host,
            settings,
        }
    }

    #[test]
    fn test_terminal_rationale_and_driver_share_input() {
        let host = MemoryHostGateway::new();
        host.set_rationale("CAMERA", true);
        let input = shared("\ny\n");
        let sim = terminal_simulator(input.clone(), host);

        let options = RequestOptions::for_capabilities(["CAMERA"]).unwrap();
        let result = sim.run(options, &mut LineDriver::new(input)).unwrap();
        assert_eq!(result, SimulationResult::Finished(Outcome::Granted));
    }

    #[test]
    fn test_terminal_denial_close_reads_after_host_answer() {
        let input = shared("n\nc\n");
        let sim = terminal_simulator(input.clone(), MemoryHostGateway::new());

        let options = RequestOptions::for_capabilities(["CAMERA"]).unwrap();
        let result = sim.run(options, &mut LineDriver::new(input)).unwrap();
        assert_eq!(
            result,
            SimulationResult::Finished(Outcome::Denied(vec!["CAMERA".into()]))
        );
    }

    #[test]
    fn test_terminal_settings_detour_on_one_input() {
        let input = shared("n\ns\ny\n");
        let sim = terminal_simulator(input.clone(), MemoryHostGateway::new());

        let options = RequestOptions::for_capabilities(["CAMERA"]).unwrap();
        let result = sim.run(options, &mut LineDriver::new(input)).unwrap();
        assert_eq!(result, SimulationResult::Finished(Outcome::Granted));
        assert_eq!(sim.settings.opened().len(), 1);
    }

    #[test]
    fn test_line_driver_reads_answers() {
        let mut driver = LineDriver::new(shared("y\nno\n"));
        let cam = CapabilityId::from("CAMERA");

        assert!(driver.allow(&cam).unwrap());
        assert!(!driver.allow(&cam).unwrap());
        assert!(!driver.allow(&cam).unwrap());
    }
}
