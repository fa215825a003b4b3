//! grantflow-api: Shared types for the grantflow permission orchestrator
//!
//! This crate defines the values exchanged between a caller, the orchestrator
//! and the host collaborators: capability identifiers, per-request options,
//! request identifiers and the terminal outcome of a grant cycle.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

/// Default rationale text shown before re-asking the host
pub const DEFAULT_RATIONALE_MESSAGE: &str =
    "This feature needs the requested permissions to work properly.";

/// Default label of the rationale acknowledge button
pub const DEFAULT_RATIONALE_BUTTON: &str = "OK";

/// Default text shown after the host denied some capabilities
pub const DEFAULT_DENIED_MESSAGE: &str =
    "Some permissions were denied. You can grant them from the settings screen.";

/// Default label of the denial close button
pub const DEFAULT_DENIED_CLOSE_BUTTON: &str = "Close";

/// Default label of the denial settings button
pub const DEFAULT_DENIED_SETTINGS_BUTTON: &str = "Settings";

/// Identifier of a host-mediated capability (e.g. "android.permission.CAMERA")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityId(String);

impl CapabilityId {
    /// Create a capability identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CapabilityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CapabilityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for CapabilityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Correlates a host grant request or a settings navigation with its later
/// asynchronous completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u32);

impl RequestId {
    /// Wrap a raw request code
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw request code as handed to the host
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Terminal result of one grant cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "capabilities")]
pub enum Outcome {
    /// Every declared, requested capability is granted
    Granted,
    /// These capabilities remain denied (request order preserved)
    Denied(Vec<CapabilityId>),
}

impl Outcome {
    /// Check if the cycle ended with every capability granted
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }

    /// Capabilities that remain denied (empty when granted)
    pub fn denied(&self) -> &[CapabilityId] {
        match self {
            Self::Granted => &[],
            Self::Denied(caps) => caps,
        }
    }
}

/// Error type for request option validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("at least one capability must be requested")]
    NoCapabilities,

    #[error("capability identifier at position {0} is blank")]
    BlankCapability(usize),
}

/// Per-request options: what to ask for and the texts of the prompts
///
/// Immutable once built. Construct it through [`RequestOptions::builder`]
/// or deserialize it from JSON; both paths reject an empty capability list.
///
/// # Example
///
/// ```rust
/// use grantflow_api::RequestOptions;
///
/// let options = RequestOptions::builder()
///     .capability("CAMERA")
///     .capability("LOCATION")
///     .rationale_message("Scanning needs the camera")
///     .build()
///     .unwrap();
///
/// assert_eq!(options.capabilities().len(), 2);
/// assert_eq!(options.rationale_button(), "OK");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRequestOptions", into = "RawRequestOptions")]
pub struct RequestOptions {
    capabilities: Vec<CapabilityId>,
    rationale_message: String,
    rationale_button: String,
    denied_message: String,
    denied_close_button: String,
    denied_settings_button: String,
}

impl RequestOptions {
    /// Start building options
    pub fn builder() -> RequestOptionsBuilder {
        RequestOptionsBuilder::default()
    }

    /// Build options for the given capabilities with default texts
    pub fn for_capabilities<I, C>(capabilities: I) -> Result<Self, OptionsError>
    where
        I: IntoIterator<Item = C>,
        C: Into<CapabilityId>,
    {
        Self::builder().capabilities(capabilities).build()
    }

    /// Requested capabilities in request order
    pub fn capabilities(&self) -> &[CapabilityId] {
        &self.capabilities
    }

    pub fn rationale_message(&self) -> &str {
        &self.rationale_message
    }

    pub fn rationale_button(&self) -> &str {
        &self.rationale_button
    }

    pub fn denied_message(&self) -> &str {
        &self.denied_message
    }

    pub fn denied_close_button(&self) -> &str {
        &self.denied_close_button
    }

    pub fn denied_settings_button(&self) -> &str {
        &self.denied_settings_button
    }
}

/// Builder for [`RequestOptions`]
#[derive(Debug, Clone)]
pub struct RequestOptionsBuilder {
    capabilities: Vec<CapabilityId>,
    rationale_message: String,
    rationale_button: String,
    denied_message: String,
    denied_close_button: String,
    denied_settings_button: String,
}

impl Default for RequestOptionsBuilder {
    fn default() -> Self {
        Self {
            capabilities: Vec::new(),
            rationale_message: DEFAULT_RATIONALE_MESSAGE.into(),
            rationale_button: DEFAULT_RATIONALE_BUTTON.into(),
            denied_message: DEFAULT_DENIED_MESSAGE.into(),
            denied_close_button: DEFAULT_DENIED_CLOSE_BUTTON.into(),
            denied_settings_button: DEFAULT_DENIED_SETTINGS_BUTTON.into(),
        }
    }
}

impl RequestOptionsBuilder {
    /// Add a capability to request
    pub fn capability(mut self, capability: impl Into<CapabilityId>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// Add several capabilities to request
    pub fn capabilities<I, C>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<CapabilityId>,
    {
        self.capabilities
            .extend(capabilities.into_iter().map(Into::into));
        self
    }

    /// Set the rationale message
    pub fn rationale_message(mut self, message: impl Into<String>) -> Self {
        self.rationale_message = message.into();
        self
    }

    /// Set the rationale acknowledge button label
    pub fn rationale_button(mut self, label: impl Into<String>) -> Self {
        self.rationale_button = label.into();
        self
    }

    /// Set the denial message
    pub fn denied_message(mut self, message: impl Into<String>) -> Self {
        self.denied_message = message.into();
        self
    }

    /// Set the denial close button label
    pub fn denied_close_button(mut self, label: impl Into<String>) -> Self {
        self.denied_close_button = label.into();
        self
    }

    /// Set the denial settings button label
    pub fn denied_settings_button(mut self, label: impl Into<String>) -> Self {
        self.denied_settings_button = label.into();
        self
    }

    /// Validate and build the options
    pub fn build(self) -> Result<RequestOptions, OptionsError> {
        if self.capabilities.is_empty() {
            return Err(OptionsError::NoCapabilities);
        }
        if let Some(pos) = self
            .capabilities
            .iter()
            .position(|c| c.as_str().trim().is_empty())
        {
            return Err(OptionsError::BlankCapability(pos));
        }

        Ok(RequestOptions {
            capabilities: self.capabilities,
            rationale_message: self.rationale_message,
            rationale_button: self.rationale_button,
            denied_message: self.denied_message,
            denied_close_button: self.denied_close_button,
            denied_settings_button: self.denied_settings_button,
        })
    }
}

/// Serialized shape of [`RequestOptions`]; every text falls back to its default
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRequestOptions {
    capabilities: Vec<CapabilityId>,
    #[serde(default = "default_rationale_message")]
    rationale_message: String,
    #[serde(default = "default_rationale_button")]
    rationale_button: String,
    #[serde(default = "default_denied_message")]
    denied_message: String,
    #[serde(default = "default_denied_close_button")]
    denied_close_button: String,
    #[serde(default = "default_denied_settings_button")]
    denied_settings_button: String,
}

fn default_rationale_message() -> String {
    DEFAULT_RATIONALE_MESSAGE.into()
}

fn default_rationale_button() -> String {
    DEFAULT_RATIONALE_BUTTON.into()
}

fn default_denied_message() -> String {
    DEFAULT_DENIED_MESSAGE.into()
}

fn default_denied_close_button() -> String {
    DEFAULT_DENIED_CLOSE_BUTTON.into()
}

fn default_denied_settings_button() -> String {
    DEFAULT_DENIED_SETTINGS_BUTTON.into()
}

impl TryFrom<RawRequestOptions> for RequestOptions {
    type Error = OptionsError;

    fn try_from(raw: RawRequestOptions) -> Result<Self, Self::Error> {
        RequestOptions::builder()
            .capabilities(raw.capabilities)
            .rationale_message(raw.rationale_message)
            .rationale_button(raw.rationale_button)
            .denied_message(raw.denied_message)
            .denied_close_button(raw.denied_close_button)
            .denied_settings_button(raw.denied_settings_button)
            .build()
    }
}

impl From<RequestOptions> for RawRequestOptions {
    fn from(options: RequestOptions) -> Self {
        Self {
            capabilities: options.capabilities,
            rationale_message: options.rationale_message,
            rationale_button: options.rationale_button,
            denied_message: options.denied_message,
            denied_close_button: options.denied_close_button,
            denied_settings_button: options.denied_settings_button,
        }
    }
}
