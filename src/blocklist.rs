//! Per-channel blocklists.
//!
//! A blocklist removes versions from consideration before a stream selector
//! runs and filters the `latest` no-stream fallback. An exact version
//! always blocks; the pattern form is matched in full against the version.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::version::VersionPattern;
use crate::Result;

/// Schema version written when serializing blocklists.
pub const BLOCKLIST_SCHEMA_VERSION: &str = "1.0.0";
/// Maven classifier under which blocklists are published.
pub const BLOCKLIST_CLASSIFIER: &str = "blocklist";

const SUPPORTED_BLOCKLIST_SCHEMAS: [&str; 1] = ["1.0.0"];

/// Versions of one coordinate a channel refuses to resolve.
///
/// `artifact_id` may be `"*"`, blocking the listed versions for every
/// artifact in the group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BlocklistEntrySpec", into = "BlocklistEntrySpec")]
pub struct BlocklistEntry {
    group_id: String,
    artifact_id: String,
    versions: BTreeSet<String>,
    version_pattern: Option<VersionPattern>,
}

impl BlocklistEntry {
    pub fn versions(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        versions: BTreeSet<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            versions,
            version_pattern: None,
        }
    }

    pub fn pattern(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        pattern: &str,
    ) -> Result<Self> {
        Ok(Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            versions: BTreeSet::new(),
            version_pattern: Some(VersionPattern::new(pattern)?),
        })
    }

    fn applies_to(&self, group_id: &str, artifact_id: &str) -> bool {
        self.group_id == group_id
            && (self.artifact_id == artifact_id || self.artifact_id == "*")
    }

    fn blocks_version(&self, version: &str) -> bool {
        self.versions.contains(version)
            || self
                .version_pattern
                .as_ref()
                .is_some_and(|pattern| pattern.matches(version))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlocklistEntrySpec {
    group_id: String,
    artifact_id: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    versions: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version_pattern: Option<String>,
}

impl TryFrom<BlocklistEntrySpec> for BlocklistEntry {
    type Error = Error;

    fn try_from(spec: BlocklistEntrySpec) -> Result<Self> {
        if spec.versions.is_empty() && spec.version_pattern.is_none() {
            return Err(Error::InvalidChannel {
                reason: format!(
                    "blocklist entry for `{}:{}` names no versions and no versionPattern",
                    spec.group_id, spec.artifact_id
                ),
            });
        }
        let version_pattern = match spec.version_pattern {
            Some(pattern) => Some(VersionPattern::new(pattern)?),
            None => None,
        };
        Ok(Self {
            group_id: spec.group_id,
            artifact_id: spec.artifact_id,
            versions: spec.versions,
            version_pattern,
        })
    }
}

impl From<BlocklistEntry> for BlocklistEntrySpec {
    fn from(entry: BlocklistEntry) -> Self {
        Self {
            group_id: entry.group_id,
            artifact_id: entry.artifact_id,
            versions: entry.versions,
            version_pattern: entry.version_pattern.map(|p| p.as_str().to_string()),
        }
    }
}

/// A channel's set of disallowed versions. The default value blocks nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BlocklistSpec", into = "BlocklistSpec")]
pub struct Blocklist {
    name: Option<String>,
    entries: Vec<BlocklistEntry>,
}

impl Blocklist {
    pub fn new(entries: Vec<BlocklistEntry>) -> Self {
        Self {
            name: None,
            entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn blocks(&self, group_id: &str, artifact_id: &str, version: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.applies_to(group_id, artifact_id) && entry.blocks_version(version))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| Error::InvalidChannel {
            reason: format!("failed to parse blocklist: {e}"),
        })
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::InvalidChannel {
            reason: format!("failed to render blocklist: {e}"),
        })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlocklistSpec {
    schema_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    blocks: Vec<BlocklistEntry>,
}

impl TryFrom<BlocklistSpec> for Blocklist {
    type Error = Error;

    fn try_from(spec: BlocklistSpec) -> Result<Self> {
        if !SUPPORTED_BLOCKLIST_SCHEMAS.contains(&spec.schema_version.as_str()) {
            return Err(Error::InvalidChannel {
                reason: format!(
                    "unsupported blocklist schema version `{}`",
                    spec.schema_version
                ),
            });
        }
        Ok(Self {
            name: spec.name,
            entries: spec.blocks,
        })
    }
}

impl From<Blocklist> for BlocklistSpec {
    fn from(blocklist: Blocklist) -> Self {
        Self {
            schema_version: BLOCKLIST_SCHEMA_VERSION.to_string(),
            name: blocklist.name,
            blocks: blocklist.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn exact_version_blocks() {
        let blocklist = Blocklist::new(vec![BlocklistEntry::versions(
            "com.example",
            "widget-core",
            versions(&["1.2.3"]),
        )]);
        assert!(blocklist.blocks("com.example", "widget-core", "1.2.3"));
        assert!(!blocklist.blocks("com.example", "widget-core", "1.2.4"));
        assert!(!blocklist.blocks("com.example", "other", "1.2.3"));
    }

    #[test]
    fn pattern_blocks_are_anchored() {
        let entry =
            BlocklistEntry::pattern("com.example", "widget-core", "1\\..*").expect("entry");
        let blocklist = Blocklist::new(vec![entry]);
        assert!(blocklist.blocks("com.example", "widget-core", "1.9.0"));
        assert!(!blocklist.blocks("com.example", "widget-core", "11.9.0"));
    }

    #[test]
    fn wildcard_artifact_blocks_whole_group() {
        let blocklist = Blocklist::new(vec![BlocklistEntry::versions(
            "com.example",
            "*",
            versions(&["0.9.0"]),
        )]);
        assert!(blocklist.blocks("com.example", "widget-core", "0.9.0"));
        assert!(blocklist.blocks("com.example", "anything-else", "0.9.0"));
        assert!(!blocklist.blocks("org.other", "widget-core", "0.9.0"));
    }

    #[test]
    fn parses_blocklist_yaml() {
        let text = r#"
schemaVersion: "1.0.0"
name: platform blocklist
blocks:
  - groupId: com.example
    artifactId: widget-core
    versions:
      - 1.2.2
  - groupId: com.example
    artifactId: "*"
    versionPattern: ".*-snapshot"
"#;
        let blocklist = Blocklist::from_yaml(text).expect("blocklist parses");
        assert!(blocklist.blocks("com.example", "widget-core", "1.2.2"));
        assert!(blocklist.blocks("com.example", "helper", "2.0.0-snapshot"));
        assert!(!blocklist.blocks("com.example", "helper", "2.0.0"));
    }

    #[test]
    fn entry_without_versions_or_pattern_is_rejected() {
        let text = r#"
schemaVersion: "1.0.0"
blocks:
  - groupId: com.example
    artifactId: widget-core
"#;
        let err = Blocklist::from_yaml(text).unwrap_err();
        assert!(err.to_string().contains("no versions"));
    }

    #[test]
    fn default_blocklist_blocks_nothing() {
        let blocklist = Blocklist::default();
        assert!(blocklist.is_empty());
        assert!(!blocklist.blocks("com.example", "widget-core", "1.0.0"));
    }
}
