//! Channel definitions: a manifest source plus the repositories to fetch
//! its artifacts from.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::manifest::ManifestCoordinate;
use crate::Result;

/// Schema version written when serializing channels.
pub const CHANNEL_SCHEMA_VERSION: &str = "2.1.0";

const SUPPORTED_CHANNEL_SCHEMAS: [&str; 2] = ["2.0.0", "2.1.0"];

/// A named Maven repository. The URL is opaque to the core; the artifact
/// backend interprets it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub url: String,
}

impl Repository {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

/// Location of a channel metadata document (manifest or blocklist).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetadataSource {
    /// Inline location. Only `file:` URLs are read by the core; remote
    /// documents are the backend's concern.
    Url { url: Url, signature: Option<Url> },
    /// Published under Maven coordinates; a missing version means latest.
    Maven(ManifestCoordinate),
}

impl MetadataSource {
    pub fn url(url: Url) -> Self {
        Self::Url {
            url,
            signature: None,
        }
    }

    pub fn maven(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: Option<String>,
    ) -> Self {
        Self::Maven(ManifestCoordinate {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version,
        })
    }
}

/// Fallback when no stream in the channel or its required manifests covers
/// a coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoStreamStrategy {
    /// No fallback; the session moves on to the next channel.
    #[default]
    None,
    /// Greatest non-blocklisted version the repositories know.
    Latest,
    /// The `latest` marker from the repository Maven metadata.
    MavenLatest,
    /// The `release` marker from the repository Maven metadata.
    MavenRelease,
    /// The base version the caller asked about, unchanged.
    Original,
}

/// A channel definition, as declared by the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ChannelSpec", into = "ChannelSpec")]
pub struct Channel {
    schema_version: String,
    name: Option<String>,
    description: Option<String>,
    manifest: MetadataSource,
    repositories: Vec<Repository>,
    blocklist: Option<MetadataSource>,
    no_stream_strategy: NoStreamStrategy,
    gpg_check: bool,
    gpg_urls: Vec<Url>,
}

impl Channel {
    pub fn new(manifest: MetadataSource, repositories: Vec<Repository>) -> Result<Self> {
        if repositories.is_empty() {
            return Err(Error::InvalidChannel {
                reason: "channel defines no repositories".to_string(),
            });
        }
        Ok(Self {
            schema_version: CHANNEL_SCHEMA_VERSION.to_string(),
            name: None,
            description: None,
            manifest,
            repositories,
            blocklist: None,
            no_stream_strategy: NoStreamStrategy::default(),
            gpg_check: false,
            gpg_urls: Vec::new(),
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_blocklist(mut self, blocklist: MetadataSource) -> Self {
        self.blocklist = Some(blocklist);
        self
    }

    pub fn with_no_stream_strategy(mut self, strategy: NoStreamStrategy) -> Self {
        self.no_stream_strategy = strategy;
        self
    }

    pub fn with_gpg_check(mut self, urls: Vec<Url>) -> Self {
        self.gpg_check = true;
        self.gpg_urls = urls;
        self
    }

    /// Definition of the private child channel spawned for a maven-resolved
    /// manifest requirement. It inherits this channel's repositories and
    /// never falls back past its own streams.
    pub(crate) fn derive_required(&self, coordinate: ManifestCoordinate) -> Self {
        Self {
            schema_version: self.schema_version.clone(),
            name: None,
            description: None,
            manifest: MetadataSource::Maven(coordinate),
            repositories: self.repositories.clone(),
            blocklist: None,
            no_stream_strategy: NoStreamStrategy::None,
            gpg_check: self.gpg_check,
            gpg_urls: self.gpg_urls.clone(),
        }
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn manifest(&self) -> &MetadataSource {
        &self.manifest
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    pub fn blocklist(&self) -> Option<&MetadataSource> {
        self.blocklist.as_ref()
    }

    pub fn no_stream_strategy(&self) -> NoStreamStrategy {
        self.no_stream_strategy
    }

    pub fn gpg_check(&self) -> bool {
        self.gpg_check
    }

    pub fn gpg_urls(&self) -> &[Url] {
        &self.gpg_urls
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| Error::InvalidChannel {
            reason: format!("failed to parse channel: {e}"),
        })
    }

    /// Parse a YAML sequence of channel definitions.
    pub fn list_from_yaml(text: &str) -> Result<Vec<Self>> {
        serde_yaml::from_str(text).map_err(|e| Error::InvalidChannel {
            reason: format!("failed to parse channel list: {e}"),
        })
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::InvalidChannel {
            reason: format!("failed to render channel: {e}"),
        })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SourceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    maven: Option<ManifestCoordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<Url>,
    #[serde(
        rename = "signature-url",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    signature_url: Option<Url>,
}

impl SourceSpec {
    fn into_source(self, field: &str) -> Result<MetadataSource> {
        match (self.maven, self.url) {
            (Some(coordinate), None) => Ok(MetadataSource::Maven(coordinate)),
            (None, Some(url)) => Ok(MetadataSource::Url {
                url,
                signature: self.signature_url,
            }),
            _ => Err(Error::InvalidChannel {
                reason: format!("channel {field} must set exactly one of url, maven"),
            }),
        }
    }
}

impl From<MetadataSource> for SourceSpec {
    fn from(source: MetadataSource) -> Self {
        match source {
            MetadataSource::Maven(coordinate) => Self {
                maven: Some(coordinate),
                url: None,
                signature_url: None,
            },
            MetadataSource::Url { url, signature } => Self {
                maven: None,
                url: Some(url),
                signature_url: signature,
            },
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelSpec {
    schema_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    manifest: SourceSpec,
    #[serde(default)]
    repositories: Vec<Repository>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    blocklist: Option<SourceSpec>,
    #[serde(
        rename = "resolve-if-no-stream",
        default,
        skip_serializing_if = "is_default_strategy"
    )]
    resolve_if_no_stream: NoStreamStrategy,
    #[serde(rename = "gpg-check", default, skip_serializing_if = "is_false")]
    gpg_check: bool,
    #[serde(rename = "gpg-urls", default, skip_serializing_if = "Vec::is_empty")]
    gpg_urls: Vec<Url>,
}

fn is_default_strategy(strategy: &NoStreamStrategy) -> bool {
    *strategy == NoStreamStrategy::None
}

fn is_false(value: &bool) -> bool {
    !value
}

impl TryFrom<ChannelSpec> for Channel {
    type Error = Error;

    fn try_from(spec: ChannelSpec) -> Result<Self> {
        if !SUPPORTED_CHANNEL_SCHEMAS.contains(&spec.schema_version.as_str()) {
            return Err(Error::InvalidChannel {
                reason: format!("unsupported channel schema version `{}`", spec.schema_version),
            });
        }
        if spec.repositories.is_empty() {
            return Err(Error::InvalidChannel {
                reason: "channel defines no repositories".to_string(),
            });
        }
        let blocklist = match spec.blocklist {
            Some(source) => Some(source.into_source("blocklist")?),
            None => None,
        };
        Ok(Self {
            schema_version: spec.schema_version,
            name: spec.name,
            description: spec.description,
            manifest: spec.manifest.into_source("manifest")?,
            repositories: spec.repositories,
            blocklist,
            no_stream_strategy: spec.resolve_if_no_stream,
            gpg_check: spec.gpg_check,
            gpg_urls: spec.gpg_urls,
        })
    }
}

impl From<Channel> for ChannelSpec {
    fn from(channel: Channel) -> Self {
        Self {
            schema_version: channel.schema_version,
            name: channel.name,
            description: channel.description,
            manifest: channel.manifest.into(),
            repositories: channel.repositories,
            blocklist: channel.blocklist.map(Into::into),
            resolve_if_no_stream: channel.no_stream_strategy,
            gpg_check: channel.gpg_check,
            gpg_urls: channel.gpg_urls,
        }
    }
}
