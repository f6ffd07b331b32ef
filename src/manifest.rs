//! Channel manifests: the streams a channel endorses.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::version::{latest_of, VersionPattern};
use crate::Result;

/// Schema version written when serializing manifests.
pub const MANIFEST_SCHEMA_VERSION: &str = "1.1.0";
/// Maven classifier under which manifests are published.
pub const MANIFEST_CLASSIFIER: &str = "manifest";
/// Maven extension under which manifests are published.
pub const MANIFEST_EXTENSION: &str = "yaml";

const SUPPORTED_MANIFEST_SCHEMAS: [&str; 2] = ["1.0.0", "1.1.0"];

/// How a stream picks the version for its coordinate.
///
/// Exactly one selector is populated; the YAML form sets exactly one of
/// `version`, `versionPattern`, `versions`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum VersionSelector {
    /// The version is exactly this literal, whether or not any repository
    /// knows it.
    Fixed(String),
    /// The greatest repository version matching the pattern.
    Pattern(VersionPattern),
    /// The greatest repository version contained in this set.
    Versions(BTreeSet<String>),
}

/// Rule mapping a Maven coordinate to a version selector.
///
/// `artifact_id` may be the wildcard `"*"`, covering every artifact in the
/// group that no other stream matches more specifically. A wildcard
/// `group_id` is rejected.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "StreamSpec", into = "StreamSpec")]
pub struct Stream {
    group_id: String,
    artifact_id: String,
    selector: VersionSelector,
}

impl Stream {
    pub fn fixed(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self> {
        Self::new(group_id, artifact_id, VersionSelector::Fixed(version.into()))
    }

    pub fn pattern(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        pattern: &str,
    ) -> Result<Self> {
        Self::new(
            group_id,
            artifact_id,
            VersionSelector::Pattern(VersionPattern::new(pattern)?),
        )
    }

    pub fn versions(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        versions: BTreeSet<String>,
    ) -> Result<Self> {
        Self::new(group_id, artifact_id, VersionSelector::Versions(versions))
    }

    fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        selector: VersionSelector,
    ) -> Result<Self> {
        let group_id = group_id.into();
        let artifact_id = artifact_id.into();
        if group_id == "*" {
            return Err(Error::InvalidChannel {
                reason: format!("stream for `{group_id}:{artifact_id}` has a wildcard groupId"),
            });
        }
        Ok(Self {
            group_id,
            artifact_id,
            selector,
        })
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    pub fn selector(&self) -> &VersionSelector {
        &self.selector
    }

    /// Whether this stream covers the coordinate, counting the wildcard.
    pub fn matches(&self, group_id: &str, artifact_id: &str) -> bool {
        self.group_id == group_id && (self.artifact_id == artifact_id || self.artifact_id == "*")
    }

    /// Apply the selector against the versions known to a repository.
    pub fn select(&self, known: &BTreeSet<String>) -> Option<String> {
        match &self.selector {
            VersionSelector::Fixed(version) => Some(version.clone()),
            VersionSelector::Pattern(pattern) => latest_of(
                known
                    .iter()
                    .map(String::as_str)
                    .filter(|version| pattern.matches(version)),
            )
            .map(str::to_string),
            VersionSelector::Versions(versions) => {
                latest_of(known.intersection(versions).map(String::as_str)).map(str::to_string)
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamSpec {
    group_id: String,
    artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    versions: Option<BTreeSet<String>>,
}

impl TryFrom<StreamSpec> for Stream {
    type Error = Error;

    fn try_from(spec: StreamSpec) -> Result<Self> {
        let selector = match (spec.version, spec.version_pattern, spec.versions) {
            (Some(version), None, None) => VersionSelector::Fixed(version),
            (None, Some(pattern), None) => VersionSelector::Pattern(VersionPattern::new(pattern)?),
            (None, None, Some(versions)) => VersionSelector::Versions(versions),
            _ => {
                return Err(Error::InvalidChannel {
                    reason: format!(
                        "stream for `{}:{}` must set exactly one of version, versionPattern, versions",
                        spec.group_id, spec.artifact_id
                    ),
                })
            }
        };
        Stream::new(spec.group_id, spec.artifact_id, selector)
    }
}

impl From<Stream> for StreamSpec {
    fn from(stream: Stream) -> Self {
        let (version, version_pattern, versions) = match stream.selector {
            VersionSelector::Fixed(version) => (Some(version), None, None),
            VersionSelector::Pattern(pattern) => (None, Some(pattern.as_str().to_string()), None),
            VersionSelector::Versions(versions) => (None, None, Some(versions)),
        };
        Self {
            group_id: stream.group_id,
            artifact_id: stream.artifact_id,
            version,
            version_pattern,
            versions,
        }
    }
}

/// Reference to another manifest this one requires.
///
/// Resolved by sibling channel id within the session, or by Maven
/// coordinates when no sibling carries the id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRequirement {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maven: Option<ManifestCoordinate>,
}

/// Maven coordinates of a manifest document. A missing version means the
/// latest available.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestCoordinate {
    pub group_id: String,
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Named collection of streams plus the manifests it requires.
///
/// Streams are ordered by `(group_id, artifact_id)`; two streams for the
/// same coordinate within one manifest are rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ManifestSpec", into = "ManifestSpec")]
pub struct ChannelManifest {
    schema_version: String,
    id: Option<String>,
    name: Option<String>,
    logical_version: Option<String>,
    description: Option<String>,
    requires: Vec<ManifestRequirement>,
    streams: BTreeSet<Stream>,
}

impl ChannelManifest {
    pub fn new(streams: Vec<Stream>) -> Result<Self> {
        Ok(Self {
            schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
            id: None,
            name: None,
            logical_version: None,
            description: None,
            requires: Vec::new(),
            streams: build_streams(streams)?,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_logical_version(mut self, logical_version: impl Into<String>) -> Self {
        self.logical_version = Some(logical_version.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_requires(mut self, requires: Vec<ManifestRequirement>) -> Self {
        self.requires = requires;
        self
    }

    /// Build the recorder's replay manifest. Streams were already deduped
    /// by coordinate, so no validation pass runs here.
    pub(crate) fn from_recorded(streams: BTreeSet<Stream>) -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION.to_string(),
            id: None,
            name: None,
            logical_version: None,
            description: None,
            requires: Vec::new(),
            streams,
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| Error::InvalidChannel {
            reason: format!("failed to parse manifest: {e}"),
        })
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::InvalidChannel {
            reason: format!("failed to render manifest: {e}"),
        })
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn logical_version(&self) -> Option<&str> {
        self.logical_version.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn requires(&self) -> &[ManifestRequirement] {
        &self.requires
    }

    pub fn streams(&self) -> &BTreeSet<Stream> {
        &self.streams
    }

    /// Find the stream covering a coordinate: an exact `(group, artifact)`
    /// stream wins over the group's `"*"` stream.
    pub fn find_stream(&self, group_id: &str, artifact_id: &str) -> Option<&Stream> {
        self.streams
            .iter()
            .find(|s| s.group_id() == group_id && s.artifact_id() == artifact_id)
            .or_else(|| {
                self.streams
                    .iter()
                    .find(|s| s.group_id() == group_id && s.artifact_id() == "*")
            })
    }
}

fn build_streams(streams: Vec<Stream>) -> Result<BTreeSet<Stream>> {
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    let mut set = BTreeSet::new();
    for stream in streams {
        let key = (
            stream.group_id().to_string(),
            stream.artifact_id().to_string(),
        );
        if !seen.insert(key) {
            return Err(Error::InvalidChannel {
                reason: format!(
                    "manifest defines more than one stream for `{}:{}`",
                    stream.group_id(),
                    stream.artifact_id()
                ),
            });
        }
        set.insert(stream);
    }
    Ok(set)
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestSpec {
    schema_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(
        rename = "logical-version",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    logical_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    requires: Vec<ManifestRequirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    streams: Vec<Stream>,
}

impl TryFrom<ManifestSpec> for ChannelManifest {
    type Error = Error;

    fn try_from(spec: ManifestSpec) -> Result<Self> {
        if !SUPPORTED_MANIFEST_SCHEMAS.contains(&spec.schema_version.as_str()) {
            return Err(Error::InvalidChannel {
                reason: format!("unsupported manifest schema version `{}`", spec.schema_version),
            });
        }
        Ok(Self {
            schema_version: spec.schema_version,
            id: spec.id,
            name: spec.name,
            logical_version: spec.logical_version,
            description: spec.description,
            requires: spec.requires,
            streams: build_streams(spec.streams)?,
        })
    }
}

impl From<ChannelManifest> for ManifestSpec {
    fn from(manifest: ChannelManifest) -> Self {
        Self {
            schema_version: manifest.schema_version,
            id: manifest.id,
            name: manifest.name,
            logical_version: manifest.logical_version,
            description: manifest.description,
            requires: manifest.requires,
            streams: manifest.streams.into_iter().collect(),
        }
    }
}
