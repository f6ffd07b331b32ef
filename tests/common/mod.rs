//! Shared fixtures: an in-memory artifact backend that records every
//! invocation, plus helpers for publishing channel metadata as files.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use url::Url;

use maven_channels::{
    ArtifactBackend, ArtifactCoordinate, BackendError, BackendFactory, Channel, ChannelManifest,
    MetadataCoordinate, MetadataSource, NoStreamStrategy, Repository,
};

#[derive(Default)]
struct RepoState {
    versions: BTreeMap<(String, String), BTreeSet<String>>,
    metadata_latest: BTreeMap<(String, String), String>,
    metadata_release: BTreeMap<(String, String), String>,
    manifests: BTreeMap<(String, String), Url>,
    blocklists: BTreeMap<(String, String), Url>,
    missing_artifacts: BTreeSet<(String, String, String)>,
}

/// Backend factory over a single shared in-memory repository. Each created
/// backend is tagged with the repository ids it was built for, so tests can
/// tell which channel (or the combined backend) performed a call.
#[derive(Default)]
pub struct MemoryFactory {
    state: Rc<RefCell<RepoState>>,
    calls: Rc<RefCell<Vec<String>>>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        init_tracing();
        Self::default()
    }

    pub fn add_versions(&self, group_id: &str, artifact_id: &str, versions: &[&str]) {
        self.state
            .borrow_mut()
            .versions
            .entry((group_id.to_string(), artifact_id.to_string()))
            .or_default()
            .extend(versions.iter().map(|v| v.to_string()));
    }

    pub fn set_metadata(
        &self,
        group_id: &str,
        artifact_id: &str,
        latest: Option<&str>,
        release: Option<&str>,
    ) {
        let key = (group_id.to_string(), artifact_id.to_string());
        let mut state = self.state.borrow_mut();
        if let Some(latest) = latest {
            state.metadata_latest.insert(key.clone(), latest.to_string());
        }
        if let Some(release) = release {
            state.metadata_release.insert(key, release.to_string());
        }
    }

    pub fn publish_manifest(&self, group_id: &str, artifact_id: &str, location: Url) {
        self.state
            .borrow_mut()
            .manifests
            .insert((group_id.to_string(), artifact_id.to_string()), location);
    }

    pub fn publish_blocklist(&self, group_id: &str, artifact_id: &str, location: Url) {
        self.state
            .borrow_mut()
            .blocklists
            .insert((group_id.to_string(), artifact_id.to_string()), location);
    }

    /// Make fetching this exact version fail with `ArtifactNotFound`.
    pub fn remove_artifact(&self, group_id: &str, artifact_id: &str, version: &str) {
        self.state.borrow_mut().missing_artifacts.insert((
            group_id.to_string(),
            artifact_id.to_string(),
            version.to_string(),
        ));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn calls_matching(&self, needle: &str) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.contains(needle))
            .cloned()
            .collect()
    }
}

impl BackendFactory for MemoryFactory {
    fn create(&self, repositories: &[Repository]) -> Result<Box<dyn ArtifactBackend>, BackendError> {
        let tag = repositories
            .iter()
            .map(|repository| repository.id.as_str())
            .collect::<Vec<_>>()
            .join("+");
        Ok(Box::new(MemoryBackend {
            tag,
            state: Rc::clone(&self.state),
            calls: Rc::clone(&self.calls),
        }))
    }
}

struct MemoryBackend {
    tag: String,
    state: Rc<RefCell<RepoState>>,
    calls: Rc<RefCell<Vec<String>>>,
}

impl MemoryBackend {
    fn log(&self, call: String) {
        self.calls.borrow_mut().push(format!("[{}] {call}", self.tag));
    }
}

fn opt(value: Option<&str>) -> &str {
    value.unwrap_or("")
}

impl ArtifactBackend for MemoryBackend {
    fn resolve_artifact(
        &self,
        group_id: &str,
        artifact_id: &str,
        extension: Option<&str>,
        classifier: Option<&str>,
        version: &str,
    ) -> Result<PathBuf, BackendError> {
        self.log(format!(
            "resolve_artifact {group_id}:{artifact_id}:{}:{}:{version}",
            opt(extension),
            opt(classifier)
        ));
        let missing = self.state.borrow().missing_artifacts.contains(&(
            group_id.to_string(),
            artifact_id.to_string(),
            version.to_string(),
        ));
        if missing {
            return Err(BackendError::ArtifactNotFound {
                coordinate: format!("{group_id}:{artifact_id}:{version}"),
            });
        }
        Ok(PathBuf::from(format!(
            "{group_id}/{artifact_id}-{version}.{}",
            extension.unwrap_or("jar")
        )))
    }

    fn resolve_artifacts(
        &self,
        coordinates: &[ArtifactCoordinate],
    ) -> Result<Vec<PathBuf>, BackendError> {
        coordinates
            .iter()
            .map(|coordinate| {
                self.resolve_artifact(
                    &coordinate.group_id,
                    &coordinate.artifact_id,
                    coordinate.extension.as_deref(),
                    coordinate.classifier.as_deref(),
                    &coordinate.version,
                )
            })
            .collect()
    }

    fn all_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
        extension: Option<&str>,
        classifier: Option<&str>,
    ) -> Result<BTreeSet<String>, BackendError> {
        self.log(format!(
            "all_versions {group_id}:{artifact_id}:{}:{}",
            opt(extension),
            opt(classifier)
        ));
        Ok(self
            .state
            .borrow()
            .versions
            .get(&(group_id.to_string(), artifact_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn metadata_latest_version(
        &self,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Option<String>, BackendError> {
        self.log(format!("metadata_latest {group_id}:{artifact_id}"));
        Ok(self
            .state
            .borrow()
            .metadata_latest
            .get(&(group_id.to_string(), artifact_id.to_string()))
            .cloned())
    }

    fn metadata_release_version(
        &self,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Option<String>, BackendError> {
        self.log(format!("metadata_release {group_id}:{artifact_id}"));
        Ok(self
            .state
            .borrow()
            .metadata_release
            .get(&(group_id.to_string(), artifact_id.to_string()))
            .cloned())
    }

    fn resolve_metadata(
        &self,
        coordinates: &[MetadataCoordinate],
    ) -> Result<Vec<Url>, BackendError> {
        let state = self.state.borrow();
        coordinates
            .iter()
            .map(|coordinate| {
                self.log(format!("resolve_metadata {coordinate}"));
                let key = (coordinate.group_id.clone(), coordinate.artifact_id.clone());
                let location = match coordinate.classifier.as_str() {
                    "blocklist" => state.blocklists.get(&key),
                    _ => state.manifests.get(&key),
                };
                location.cloned().ok_or_else(|| BackendError::MetadataNotFound {
                    coordinate: coordinate.to_string(),
                })
            })
            .collect()
    }

    fn close(&mut self) {
        self.log("close".to_string());
    }
}

/// Surface resolver events under `--nocapture`. Repeated calls are no-ops.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Write a metadata document under `dir` and return its file URL.
pub fn write_doc(dir: &Path, name: &str, contents: &str) -> Url {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture document");
    Url::from_file_path(&path).expect("fixture path is absolute")
}

/// Write a manifest under `dir` and return its file URL.
pub fn write_manifest(dir: &Path, name: &str, manifest: &ChannelManifest) -> Url {
    write_doc(dir, name, &manifest.to_yaml().expect("manifest renders"))
}

/// A channel over `repository_id` reading its manifest from a file URL.
pub fn file_channel(repository_id: &str, manifest: Url) -> Channel {
    Channel::new(
        MetadataSource::url(manifest),
        vec![Repository::new(
            repository_id,
            format!("memory://{repository_id}"),
        )],
    )
    .expect("channel definition")
}

/// Same as [`file_channel`] with a no-stream fallback strategy.
pub fn file_channel_with_strategy(
    repository_id: &str,
    manifest: Url,
    strategy: NoStreamStrategy,
) -> Channel {
    file_channel(repository_id, manifest).with_no_stream_strategy(strategy)
}
