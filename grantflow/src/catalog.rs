//! Declared capability catalog
//!
//! The catalog is the snapshot of capabilities the application is statically
//! entitled to request. It is read once from a [`MetadataSource`] when the
//! orchestrator is built and never refreshed.

use grantflow_api::CapabilityId;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for metadata lookups
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Failed to read application manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse application manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Application metadata unavailable: {0}")]
    Unavailable(String),
}

/// Source of the application's declared capabilities
///
/// Implement this trait to read declarations from wherever the host keeps
/// them (package metadata, a bundled manifest, a service registry).
pub trait MetadataSource: Send + Sync {
    /// List every capability the application declares
    fn declared_capabilities(&self) -> Result<Vec<CapabilityId>, MetadataError>;
}

/// In-memory metadata, mostly for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    capabilities: Vec<CapabilityId>,
}

impl StaticMetadata {
    pub fn new<I, C>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<CapabilityId>,
    {
        Self {
            capabilities: capabilities.into_iter().map(Into::into).collect(),
        }
    }
}

impl MetadataSource for StaticMetadata {
    fn declared_capabilities(&self) -> Result<Vec<CapabilityId>, MetadataError> {
        Ok(self.capabilities.clone())
    }
}

/// JSON manifest on disk: `{ "capabilities": ["CAMERA", ...] }`
#[derive(Debug, Clone)]
pub struct ManifestFile {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ManifestData {
    #[serde(default)]
    capabilities: Vec<CapabilityId>,
}

impl ManifestFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetadataSource for ManifestFile {
    fn declared_capabilities(&self) -> Result<Vec<CapabilityId>, MetadataError> {
        let file = File::open(&self.path).map_err(|source| MetadataError::Read {
            path: self.path.clone(),
            source,
        })?;
        let data: ManifestData = serde_json::from_reader(BufReader::new(file))?;
        Ok(data.capabilities)
    }
}

/// Immutable set of declared capabilities
#[derive(Debug, Clone, Default)]
pub struct CapabilityCatalog {
    declared: HashSet<CapabilityId>,
}

impl CapabilityCatalog {
    /// Build the catalog by querying the source once
    ///
    /// A failing source yields an empty catalog: every requested capability
    /// is then treated as undeclared and skipped, so callers are never blocked.
    pub fn load(source: &dyn MetadataSource) -> Self {
        match source.declared_capabilities() {
            Ok(capabilities) => {
                let catalog: Self = capabilities.into_iter().collect();
                tracing::debug!(declared = catalog.len(), "Capability catalog loaded");
                catalog
            }
            Err(e) => {
                tracing::warn!(error = %e, "Application metadata unavailable, catalog is empty");
                Self::default()
            }
        }
    }

    pub fn contains(&self, id: &CapabilityId) -> bool {
        self.declared.contains(id)
    }

    pub fn len(&self) -> usize {
        self.declared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapabilityId> {
        self.declared.iter()
    }
}

impl FromIterator<CapabilityId> for CapabilityCatalog {
    fn from_iter<T: IntoIterator<Item = CapabilityId>>(iter: T) -> Self {
        Self {
            declared: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct BrokenSource;

    impl MetadataSource for BrokenSource {
        fn declared_capabilities(&self) -> Result<Vec<CapabilityId>, MetadataError> {
            Err(MetadataError::Unavailable("package not found".into()))
        }
    }

    #[test]
    fn test_static_catalog() {
        let catalog = CapabilityCatalog::load(&StaticMetadata::new(["CAM", "LOC", "CAM"]));
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains(&"CAM".into()));
        assert!(!catalog.contains(&"MIC".into()));
    }

    #[test]
    fn test_broken_source_yields_empty_catalog() {
        let catalog = CapabilityCatalog::load(&BrokenSource);
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let mut file = File::create(&path).unwrap();
        writeln!(file, r#"{{ "capabilities": ["CAMERA", "RECORD_AUDIO"] }}"#).unwrap();

        let catalog = CapabilityCatalog::load(&ManifestFile::new(&path));
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains(&"RECORD_AUDIO".into()));
    }

    #[test]
    fn test_missing_manifest_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = ManifestFile::new(dir.path().join("absent.json"));

        match source.declared_capabilities() {
            Err(MetadataError::Read { path, .. }) => assert!(path.ends_with("absent.json")),
            other => panic!("Expected read error, got {:?}", other),
        }
        assert!(CapabilityCatalog::load(&source).is_empty());
    }
}
