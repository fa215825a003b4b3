//! grantflow: run one permission cycle against a simulated host
//!
//! ```text
//! grantflow --manifest capabilities.json --host-state host.json CAMERA MICROPHONE
//! ```

mod simulator;
mod tracing_support;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use grantflow::audit::{AuditSink, FileAuditSink, NullAuditSink};
use grantflow::collaborator::{
    HostSnapshot, MemoryHostGateway, RecordingSettingsRedirector, TerminalPromptCollaborator,
};
use grantflow::{ManifestFile, OrchestratorBuilder, RequestOptions};

use simulator::{LineDriver, SimulationResult, Simulator};
use tracing_support::{TracingConfig, TracingFormat};

#[derive(Debug, Parser)]
#[command(name = "grantflow", version, about = "Simulate a runtime permission request cycle")]
struct Cli {
    /// Manifest declaring the application's capabilities (`{"capabilities": [...]}`)
    #[arg(long, env = "GRANTFLOW_MANIFEST")]
    manifest: PathBuf,

    /// Initial host state (`{"granted": [...], "rationale": [...]}`)
    #[arg(long)]
    host_state: Option<PathBuf>,

    /// Request options file; overrides positional capabilities
    #[arg(long)]
    options: Option<PathBuf>,

    /// Simulate a host that predates runtime grants
    #[arg(long)]
    legacy_host: bool,

    /// Append audit events to this JSONL file
    #[arg(long)]
    audit_log: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = TracingFormat::Compact)]
    log_format: TracingFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Capabilities to request
    capabilities: Vec<String>,
}

fn main() {
    let cli = Cli::parse();

    tracing_support::init_subscriber(
        TracingConfig {
            format: cli.log_format,
            ..TracingConfig::default()
        }
        .with_verbosity(cli.verbose),
    );

    match run(cli) {
        Ok(result) => {
            report(&result);
            std::process::exit(result.exit_code());
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(64);
        }
    }
}

fn run(cli: Cli) -> Result<SimulationResult> {
    let options = load_options(cli.options.as_deref(), &cli.capabilities)?;

    let mut snapshot = match &cli.host_state {
        Some(path) => load_host_state(path)?,
        None => HostSnapshot::default(),
    };
    if cli.legacy_host {
        snapshot.runtime_grants = false;
    }

    let audit: Arc<dyn AuditSink> = match &cli.audit_log {
        Some(path) => Arc::new(
            FileAuditSink::new(path)
                .with_context(|| format!("opening audit log {}", path.display()))?,
        ),
        None => Arc::new(NullAuditSink),
    };

    // prompts and host answers read one buffered stdin, one line at a time
    let input = LineDriver::stdin_input();
    let host = Arc::new(MemoryHostGateway::from_snapshot(snapshot));
    let settings = Arc::new(RecordingSettingsRedirector::new());
    let orchestrator = OrchestratorBuilder::new()
        .metadata(ManifestFile::new(&cli.manifest))
        .gateway_arc(host.clone())
        .prompt(TerminalPromptCollaborator::new().with_input(input.clone()))
        .settings_arc(settings.clone())
        .audit_arc(audit.clone())
        .build()?;

    tracing::info!(
        declared = orchestrator.catalog().len(),
        requested = options.capabilities().len(),
        "Starting simulated cycle"
    );

    let sim = Simulator {
        orchestrator,
        host,
        settings,
    };
    let result = sim.run(options, &mut LineDriver::new(input));

    if let Err(e) = audit.flush() {
        tracing::warn!(error = %e, "Failed to flush audit log");
    }
    result
}

fn load_options(path: Option<&Path>, capabilities: &[String]) -> Result<RequestOptions> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading options {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing options {}", path.display()))
        }
        None => RequestOptions::for_capabilities(capabilities.iter().map(String::as_str))
            .context("no capabilities requested"),
    }
}

fn load_host_state(path: &Path) -> Result<HostSnapshot> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading host state {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing host state {}", path.display()))
}

fn report(result: &SimulationResult) {
    match result {
        SimulationResult::Finished(outcome) => match serde_json::to_string(outcome) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::error!(error = %e, "Failed to encode outcome"),
        },
        SimulationResult::Abandoned => println!(r#"{{"status":"abandoned"}}"#),
        SimulationResult::Stalled => println!(r#"{{"status":"stalled"}}"#),
    }
}
