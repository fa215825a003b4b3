//! Pre-configured orchestrator setups for common use cases
//!
//! Provides ready-to-use configurations that embedders can use directly or
//! as starting points for customization.

use std::path::PathBuf;
use std::sync::Arc;

use crate::audit::{AuditSink, FileAuditSink, MemoryAuditSink, NullAuditSink};
use crate::catalog::{CapabilityCatalog, MetadataSource};
use crate::collaborator::{
    AutoPromptCollaborator, ChainedSettingsRedirector, HostGrantGateway, PromptCollaborator,
    RecordingSettingsRedirector, SettingsRedirector, TerminalPromptCollaborator,
};
use crate::orchestrator::Orchestrator;

/// Complete orchestrator configuration bundle
pub struct OrchestratorConfig {
    /// Capabilities the application declares
    pub catalog: CapabilityCatalog,
    /// Host grant state and grant dialog
    pub gateway: Arc<dyn HostGrantGateway>,
    /// Rationale and denial prompts
    pub prompt: Arc<dyn PromptCollaborator>,
    /// Settings detour
    pub settings: Arc<dyn SettingsRedirector>,
    /// Audit sink
    pub audit: Arc<dyn AuditSink>,
}

impl std::fmt::Debug for OrchestratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorConfig")
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl OrchestratorConfig {
    pub fn into_orchestrator(self) -> Orchestrator {
        Orchestrator::new(self)
    }
}

/// Builder for orchestrator configurations
pub struct OrchestratorBuilder {
    catalog: Option<CapabilityCatalog>,
    gateway: Option<Arc<dyn HostGrantGateway>>,
    prompt: Option<Arc<dyn PromptCollaborator>>,
    settings: Option<Arc<dyn SettingsRedirector>>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            catalog: None,
            gateway: None,
            prompt: None,
            settings: None,
            audit: None,
        }
    }

    /// Load the declared capabilities from a metadata source
    ///
    /// An unreadable source yields an empty catalog, which makes every
    /// request resolve as granted.
    pub fn metadata(mut self, source: impl MetadataSource) -> Self {
        self.catalog = Some(CapabilityCatalog::load(&source));
        self
    }

    /// Use an already loaded catalog
    pub fn catalog(mut self, catalog: CapabilityCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn gateway(mut self, gateway: impl HostGrantGateway + 'static) -> Self {
        self.gateway = Some(Arc::new(gateway));
        self
    }

    /// Share a gateway the caller keeps a handle to
    pub fn gateway_arc(mut self, gateway: Arc<dyn HostGrantGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn prompt(mut self, prompt: impl PromptCollaborator + 'static) -> Self {
        self.prompt = Some(Arc::new(prompt));
        self
    }

    pub fn prompt_arc(mut self, prompt: Arc<dyn PromptCollaborator>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn settings(mut self, settings: impl SettingsRedirector + 'static) -> Self {
        self.settings = Some(Arc::new(settings));
        self
    }

    pub fn settings_arc(mut self, settings: Arc<dyn SettingsRedirector>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn audit(mut self, audit: impl AuditSink + 'static) -> Self {
        self.audit = Some(Arc::new(audit));
        self
    }

    pub fn audit_arc(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Build the configuration
    pub fn build_config(self) -> Result<OrchestratorConfig, BuildError> {
        let catalog = self.catalog.ok_or(BuildError::MissingMetadata)?;
        let gateway = self.gateway.ok_or(BuildError::MissingGateway)?;

        Ok(OrchestratorConfig {
            catalog,
            gateway,
            prompt: self
                .prompt
                .unwrap_or_else(|| Arc::new(TerminalPromptCollaborator::new())),
            // an empty chain fails every detour, so cycles stall there
            settings: self
                .settings
                .unwrap_or_else(|| Arc::new(ChainedSettingsRedirector::new())),
            audit: self.audit.unwrap_or_else(|| Arc::new(NullAuditSink)),
        })
    }

    /// Build the orchestrator
    pub fn build(self) -> Result<Orchestrator, BuildError> {
        self.build_config().map(Orchestrator::new)
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Error type for orchestrator construction
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("No host grant gateway configured")]
    MissingGateway,

    #[error("No capability metadata configured")]
    MissingMetadata,

    #[error("Failed to initialize audit: {0}")]
    AuditInit(String),
}

// ============================================================================
// Preset Configurations
// ============================================================================

/// Preset configurations for common use cases
pub struct OrchestratorPresets;

impl OrchestratorPresets {
    /// Interactive terminal mode
    ///
    /// - Terminal prompts
    /// - Desktop settings navigation chain
    /// - File-based audit log under the user's config directory
    pub fn interactive(
        app_name: &str,
        gateway: Arc<dyn HostGrantGateway>,
        metadata: &dyn MetadataSource,
    ) -> Result<OrchestratorConfig, BuildError> {
        let audit_path = default_audit_path(app_name);
        let audit = FileAuditSink::new(&audit_path)
            .map_err(|e| BuildError::AuditInit(e.to_string()))?;

        Ok(OrchestratorConfig {
            catalog: CapabilityCatalog::load(metadata),
            gateway,
            prompt: Arc::new(TerminalPromptCollaborator::new()),
            settings: Arc::new(ChainedSettingsRedirector::desktop_defaults()),
            audit: Arc::new(audit),
        })
    }

    /// Headless mode
    ///
    /// - Rationales acknowledged and denials closed without user input
    /// - No settings navigation
    /// - No audit
    pub fn headless(
        gateway: Arc<dyn HostGrantGateway>,
        metadata: &dyn MetadataSource,
    ) -> OrchestratorConfig {
        OrchestratorConfig {
            catalog: CapabilityCatalog::load(metadata),
            gateway,
            prompt: Arc::new(AutoPromptCollaborator::acknowledge_and_close()),
            settings: Arc::new(ChainedSettingsRedirector::new()),
            audit: Arc::new(NullAuditSink),
        }
    }

    /// Testing mode
    ///
    /// - Auto-answering prompts
    /// - Recording settings redirector that always succeeds
    /// - In-memory audit
    pub fn testing(
        gateway: Arc<dyn HostGrantGateway>,
        metadata: &dyn MetadataSource,
    ) -> OrchestratorConfig {
        OrchestratorConfig {
            catalog: CapabilityCatalog::load(metadata),
            gateway,
            prompt: Arc::new(AutoPromptCollaborator::acknowledge_and_close()),
            settings: Arc::new(RecordingSettingsRedirector::new()),
            audit: Arc::new(MemoryAuditSink::new()),
        }
    }
}

/// Default audit log location for an application
pub fn default_audit_path(app_name: &str) -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join(app_name)
        .join("audit.jsonl")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticMetadata;
    use crate::collaborator::MemoryHostGateway;
    use grantflow_api::{CapabilityId, Outcome, RequestOptions};
    use std::sync::Mutex;

    #[test]
    fn test_builder_requires_gateway() {
        let result = OrchestratorBuilder::new()
            .metadata(StaticMetadata::new(["CAMERA"]))
            .build();
        assert!(matches!(result, Err(BuildError::MissingGateway)));
    }

    #[test]
    fn test_builder_requires_metadata() {
        let result = OrchestratorBuilder::new()
            .gateway(MemoryHostGateway::new())
            .build();
        assert!(matches!(result, Err(BuildError::MissingMetadata)));
    }

    #[test]
    fn test_builder_loads_catalog() {
        let config = OrchestratorBuilder::new()
            .metadata(StaticMetadata::new(["CAMERA", "MICROPHONE"]))
            .gateway(MemoryHostGateway::new())
            .build_config()
            .unwrap();
        assert_eq!(config.catalog.len(), 2);
    }

    #[test]
    fn test_testing_preset_runs_to_denied() {
        let host = Arc::new(MemoryHostGateway::new());
        let config = OrchestratorPresets::testing(host.clone(), &StaticMetadata::new(["CAMERA"]));
        let orchestrator = config.into_orchestrator();
        let ctx = crate::collaborator::ManagedContext::new("test");

        let outcome = Arc::new(Mutex::new(None));
        let sink = outcome.clone();
        let options = RequestOptions::for_capabilities(["CAMERA"]).unwrap();
        orchestrator.request_with_context(options, ctx, move |o| {
            *sink.lock().unwrap() = Some(o);
        });

        let ask = host.last_ask().unwrap();
        orchestrator.notify_host_grant_result(ask.request_id, &ask.capabilities, &[false]);

        let outcome = outcome.lock().unwrap().take().unwrap();
        assert_eq!(outcome, Outcome::Denied(vec![CapabilityId::from("CAMERA")]));
    }

    #[test]
    fn test_default_audit_path() {
        let path = default_audit_path("grantflow-test");
        assert!(path.ends_with("grantflow-test/audit.jsonl"));
    }
}
