//! Injected Maven repository capability.
//!
//! The core owns references to these traits only; it never performs
//! repository I/O itself. Backends may block on the network and may fail
//! with transient errors; retry policy is the backend's concern.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::blocklist::BLOCKLIST_CLASSIFIER;
use crate::channel::Repository;
use crate::error::Transience;
use crate::manifest::{MANIFEST_CLASSIFIER, MANIFEST_EXTENSION};

/// Fully-specified Maven coordinate.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArtifactCoordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub extension: Option<String>,
    pub classifier: Option<String>,
    pub version: String,
}

impl ArtifactCoordinate {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        extension: Option<&str>,
        classifier: Option<&str>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            extension: extension.map(str::to_string),
            classifier: classifier.map(str::to_string),
            version: version.into(),
        }
    }
}

impl fmt::Display for ArtifactCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)?;
        if let Some(extension) = &self.extension {
            write!(f, ":{extension}")?;
        }
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        write!(f, ":{}", self.version)
    }
}

/// Coordinate of a channel metadata document (manifest or blocklist).
///
/// Manifests are published under classifier `manifest`, blocklists under
/// `blocklist`, both with extension `yaml`. A `None` version asks the
/// backend for the latest available document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataCoordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub classifier: String,
    pub extension: String,
}

impl MetadataCoordinate {
    pub fn manifest(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: Option<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version,
            classifier: MANIFEST_CLASSIFIER.to_string(),
            extension: MANIFEST_EXTENSION.to_string(),
        }
    }

    pub fn blocklist(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: Option<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version,
            classifier: BLOCKLIST_CLASSIFIER.to_string(),
            extension: MANIFEST_EXTENSION.to_string(),
        }
    }
}

impl fmt::Display for MetadataCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.classifier)?;
        if let Some(version) = &self.version {
            write!(f, ":{version}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    #[error("artifact `{coordinate}` was not found in the configured repositories")]
    ArtifactNotFound { coordinate: String },

    #[error("channel metadata `{coordinate}` could not be resolved")]
    MetadataNotFound { coordinate: String },

    #[error("repository request failed: {reason}")]
    Request { reason: String, retryable: bool },
}

impl BackendError {
    pub fn transience(&self) -> Transience {
        match self {
            BackendError::ArtifactNotFound { .. } | BackendError::MetadataNotFound { .. } => {
                Transience::Permanent
            }
            BackendError::Request { retryable, .. } => {
                if *retryable {
                    Transience::Retryable
                } else {
                    Transience::Unknown
                }
            }
        }
    }
}

/// Resolves versions and artifact files against a fixed set of repositories.
pub trait ArtifactBackend {
    fn resolve_artifact(
        &self,
        group_id: &str,
        artifact_id: &str,
        extension: Option<&str>,
        classifier: Option<&str>,
        version: &str,
    ) -> Result<PathBuf, BackendError>;

    /// Results are returned in the same order as the request list.
    fn resolve_artifacts(
        &self,
        coordinates: &[ArtifactCoordinate],
    ) -> Result<Vec<PathBuf>, BackendError>;

    /// Every version of the artifact known to the backend's repositories.
    fn all_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
        extension: Option<&str>,
        classifier: Option<&str>,
    ) -> Result<BTreeSet<String>, BackendError>;

    /// The `latest` marker from the repository Maven metadata, if any.
    fn metadata_latest_version(
        &self,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Option<String>, BackendError>;

    /// The `release` marker from the repository Maven metadata, if any.
    fn metadata_release_version(
        &self,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Option<String>, BackendError>;

    /// Downloads channel metadata documents and returns local URLs for
    /// them, in request order.
    fn resolve_metadata(
        &self,
        coordinates: &[MetadataCoordinate],
    ) -> Result<Vec<Url>, BackendError>;

    /// Releases any resources held by the backend. Called at most once.
    fn close(&mut self) {}
}

/// Creates backends bound to a repository set.
///
/// The session calls this once for the union of all channel repositories
/// and once per channel instance with that channel's effective repositories.
pub trait BackendFactory {
    fn create(&self, repositories: &[Repository]) -> Result<Box<dyn ArtifactBackend>, BackendError>;
}
