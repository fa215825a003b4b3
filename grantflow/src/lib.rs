//! # grantflow: runtime permission request orchestration
//!
//! Drives one "request capabilities" cycle against a host that grants
//! capabilities at runtime: checks what is already granted, explains why
//! when the host says a rationale is due, asks the host, and on denial
//! offers a detour through the host's settings surface before reporting a
//! single [`Outcome`] to the caller.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        Orchestrator                        │
//! │  request() ──► Checking ──► Rationale ──► Host ──► Denial  │
//! │                   ▲                                 │      │
//! │                   └──────── Settings return ◄───────┘      │
//! └──────┬──────────────┬──────────────┬──────────────┬────────┘
//!        │              │              │              │
//!        ▼              ▼              ▼              ▼
//!  CapabilityCatalog  HostGrant     Prompt        Settings
//!  (MetadataSource)   Gateway       Collaborator  Redirector
//! ```
//!
//! Every step that involves the outside world goes through a collaborator
//! trait in [`collaborator`]; every milestone lands in an [`audit`] sink.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use grantflow::{OrchestratorBuilder, ManifestFile};
//! use grantflow_api::RequestOptions;
//!
//! let orchestrator = OrchestratorBuilder::new()
//!     .metadata(ManifestFile::new("capabilities.json"))
//!     .gateway(MyHost::new())
//!     .build()?;
//!
//! let options = RequestOptions::builder()
//!     .capability("CAMERA")
//!     .rationale_message("Scanning receipts needs the camera.")
//!     .build()?;
//!
//! orchestrator.request(options, |outcome| {
//!     if outcome.is_granted() {
//!         start_scanner();
//!     }
//! });
//! ```

pub mod audit;
pub mod catalog;
pub mod collaborator;
pub mod orchestrator;
pub mod presets;

pub use catalog::{CapabilityCatalog, ManifestFile, MetadataError, MetadataSource, StaticMetadata};
pub use orchestrator::{
    ContextRequest, CycleId, DenialReply, Orchestrator, OrchestratorError, OrchestratorState,
    OutcomeCallback, RationaleReply,
};
pub use presets::{BuildError, OrchestratorBuilder, OrchestratorConfig, OrchestratorPresets};

pub use grantflow_api::{CapabilityId, OptionsError, Outcome, RequestId, RequestOptions};
