//! Runtime channel instances and the requirement graph.
//!
//! Channels are instantiated into an arena of nodes. Requirement edges are
//! resolved in a second phase, once every declared channel has loaded its
//! manifest: a requirement with Maven coordinates spawns a private child
//! node inheriting the parent's repositories, a requirement without them is
//! matched against sibling manifests by id and demotes the sibling to a
//! dependency. Cycles are detected along the DFS path and reported as the
//! chain of manifest labels.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use tracing::debug;
use url::Url;

use crate::backend::{ArtifactBackend, ArtifactCoordinate, BackendError, BackendFactory, MetadataCoordinate};
use crate::blocklist::Blocklist;
use crate::channel::{Channel, MetadataSource, NoStreamStrategy};
use crate::error::Error;
use crate::manifest::{ChannelManifest, VersionSelector};
use crate::version::latest_of;
use crate::Result;

pub(crate) type NodeId = usize;

type ManifestCache = BTreeMap<(String, String, Option<String>), ChannelManifest>;

pub(crate) struct ChannelInstance {
    def: Channel,
    manifest: ChannelManifest,
    blocklist: Blocklist,
    backend: Box<dyn ArtifactBackend>,
    requires: Vec<NodeId>,
    dependency: bool,
    closed: bool,
}

impl ChannelInstance {
    pub(crate) fn is_dependency(&self) -> bool {
        self.dependency
    }

    pub(crate) fn manifest(&self) -> &ChannelManifest {
        &self.manifest
    }

    pub(crate) fn resolve_artifact(
        &self,
        group_id: &str,
        artifact_id: &str,
        extension: Option<&str>,
        classifier: Option<&str>,
        version: &str,
    ) -> Result<PathBuf> {
        self.backend
            .resolve_artifact(group_id, artifact_id, extension, classifier, version)
            .map_err(fetch_error)
    }

    pub(crate) fn resolve_artifacts(
        &self,
        coordinates: &[ArtifactCoordinate],
    ) -> Result<Vec<PathBuf>> {
        self.backend.resolve_artifacts(coordinates).map_err(fetch_error)
    }

    pub(crate) fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.backend.close();
        }
    }
}

/// A declared version could not be fetched: that is an unresolved artifact
/// to the caller, not an internal backend detail.
fn fetch_error(err: BackendError) -> Error {
    match err {
        BackendError::ArtifactNotFound { coordinate } => Error::UnresolvedMavenArtifact {
            coordinate,
            reason: "the artifact could not be fetched from the channel repositories".to_string(),
        },
        other => Error::Backend(other),
    }
}

/// Instantiate every declared channel, then wire requirement edges.
pub(crate) fn build_graph(
    definitions: Vec<Channel>,
    factory: &dyn BackendFactory,
) -> Result<Vec<ChannelInstance>> {
    let mut cache = ManifestCache::new();
    let mut nodes = Vec::with_capacity(definitions.len());
    for def in definitions {
        nodes.push(instantiate(def, factory, &mut cache, false)?);
    }
    let declared = nodes.len();
    let mut done = BTreeSet::new();
    for id in 0..declared {
        link_requirements(
            &mut nodes,
            &mut done,
            &mut Vec::new(),
            id,
            declared,
            factory,
            &mut cache,
        )?;
    }
    Ok(nodes)
}

fn instantiate(
    def: Channel,
    factory: &dyn BackendFactory,
    cache: &mut ManifestCache,
    dependency: bool,
) -> Result<ChannelInstance> {
    let backend = factory.create(def.repositories())?;
    let manifest = load_manifest(&def, backend.as_ref(), cache)?;
    let blocklist = load_blocklist(&def, backend.as_ref())?;
    debug!(
        channel = manifest.id().or(def.name()).unwrap_or("<anonymous>"),
        streams = manifest.streams().len(),
        "channel instance initialized"
    );
    Ok(ChannelInstance {
        def,
        manifest,
        blocklist,
        backend,
        requires: Vec::new(),
        dependency,
        closed: false,
    })
}

fn link_requirements(
    nodes: &mut Vec<ChannelInstance>,
    done: &mut BTreeSet<NodeId>,
    path: &mut Vec<String>,
    id: NodeId,
    declared: usize,
    factory: &dyn BackendFactory,
    cache: &mut ManifestCache,
) -> Result<()> {
    if done.contains(&id) {
        return Ok(());
    }
    let label = node_label(&nodes[id]);
    if let Some(position) = path.iter().position(|entry| entry == &label) {
        let mut cycle = path[position..].to_vec();
        cycle.push(label);
        return Err(Error::CyclicDependency { cycle });
    }
    path.push(label);

    let requirements = nodes[id].manifest.requires().to_vec();
    let mut edges = Vec::with_capacity(requirements.len());
    for requirement in requirements {
        let child = match requirement.maven {
            Some(coordinate) => {
                let def = nodes[id].def.derive_required(coordinate);
                nodes.push(instantiate(def, factory, cache, true)?);
                nodes.len() - 1
            }
            None => match find_sibling(&nodes[..declared], &requirement.id) {
                Some(sibling) => {
                    nodes[sibling].dependency = true;
                    sibling
                }
                None => {
                    return Err(Error::UnresolvedRequiredManifest {
                        id: requirement.id,
                    })
                }
            },
        };
        link_requirements(nodes, done, path, child, declared, factory, cache)?;
        edges.push(child);
    }
    nodes[id].requires = edges;

    path.pop();
    done.insert(id);
    Ok(())
}

fn find_sibling(declared: &[ChannelInstance], id: &str) -> Option<NodeId> {
    declared
        .iter()
        .position(|node| node.manifest.id() == Some(id))
}

fn node_label(node: &ChannelInstance) -> String {
    if let Some(id) = node.manifest.id() {
        return id.to_string();
    }
    if let Some(name) = node.def.name() {
        return name.to_string();
    }
    match node.def.manifest() {
        MetadataSource::Maven(coordinate) => {
            format!("{}:{}", coordinate.group_id, coordinate.artifact_id)
        }
        MetadataSource::Url { url, .. } => url.to_string(),
    }
}

fn load_manifest(
    def: &Channel,
    backend: &dyn ArtifactBackend,
    cache: &mut ManifestCache,
) -> Result<ChannelManifest> {
    match def.manifest() {
        MetadataSource::Url { url, .. } => ChannelManifest::from_yaml(&read_document(url)?),
        MetadataSource::Maven(coordinate) => {
            let key = (
                coordinate.group_id.clone(),
                coordinate.artifact_id.clone(),
                coordinate.version.clone(),
            );
            if let Some(manifest) = cache.get(&key) {
                return Ok(manifest.clone());
            }
            let request = MetadataCoordinate::manifest(
                coordinate.group_id.clone(),
                coordinate.artifact_id.clone(),
                coordinate.version.clone(),
            );
            let locations = backend.resolve_metadata(std::slice::from_ref(&request))?;
            let location = locations.first().ok_or_else(|| Error::InvalidChannel {
                reason: format!("backend returned no location for manifest `{request}`"),
            })?;
            let manifest = ChannelManifest::from_yaml(&read_document(location)?)?;
            cache.insert(key, manifest.clone());
            Ok(manifest)
        }
    }
}

fn load_blocklist(def: &Channel, backend: &dyn ArtifactBackend) -> Result<Blocklist> {
    let source = match def.blocklist() {
        Some(source) => source,
        None => return Ok(Blocklist::default()),
    };
    match source {
        MetadataSource::Url { url, .. } => Blocklist::from_yaml(&read_document(url)?),
        MetadataSource::Maven(coordinate) => {
            let request = MetadataCoordinate::blocklist(
                coordinate.group_id.clone(),
                coordinate.artifact_id.clone(),
                coordinate.version.clone(),
            );
            match backend.resolve_metadata(std::slice::from_ref(&request)) {
                Ok(locations) => match locations.first() {
                    Some(location) => Blocklist::from_yaml(&read_document(location)?),
                    None => Ok(Blocklist::default()),
                },
                // A channel without a published blocklist blocks nothing.
                Err(BackendError::MetadataNotFound { coordinate }) => {
                    debug!(%coordinate, "no blocklist published, continuing without one");
                    Ok(Blocklist::default())
                }
                Err(other) => Err(Error::Backend(other)),
            }
        }
    }
}

fn read_document(url: &Url) -> Result<String> {
    if url.scheme() != "file" {
        return Err(Error::InvalidChannel {
            reason: format!(
                "unsupported metadata URL scheme `{}` (the core reads file URLs only)",
                url.scheme()
            ),
        });
    }
    let path = url.to_file_path().map_err(|_| Error::InvalidChannel {
        reason: format!("`{url}` is not a readable file path"),
    })?;
    std::fs::read_to_string(&path).map_err(|e| Error::InvalidChannel {
        reason: format!("failed to read `{}`: {e}", path.display()),
    })
}

pub(crate) struct FoundVersion {
    pub(crate) version: String,
    pub(crate) channel: NodeId,
}

/// Resolve the version this channel endorses for a coordinate.
///
/// `Ok(None)` means no stream here or below covers the coordinate and the
/// fallback strategy declined; the session then tries the next root.
pub(crate) fn resolve_latest_version(
    nodes: &[ChannelInstance],
    id: NodeId,
    group_id: &str,
    artifact_id: &str,
    extension: Option<&str>,
    classifier: Option<&str>,
    base_version: Option<&str>,
) -> Result<Option<FoundVersion>> {
    let node = &nodes[id];
    if let Some(stream) = node.manifest.find_stream(group_id, artifact_id) {
        if let VersionSelector::Fixed(version) = stream.selector() {
            return Ok(Some(FoundVersion {
                version: version.clone(),
                channel: id,
            }));
        }
        let known = node
            .backend
            .all_versions(group_id, artifact_id, extension, classifier)?;
        let allowed: BTreeSet<String> = known
            .into_iter()
            .filter(|version| !node.blocklist.blocks(group_id, artifact_id, version))
            .collect();
        return match stream.select(&allowed) {
            Some(version) => {
                debug!(group_id, artifact_id, %version, "stream selected version");
                Ok(Some(FoundVersion {
                    version,
                    channel: id,
                }))
            }
            // The stream promised a match; an empty selection is an error,
            // not a pass to the next channel.
            None => Err(Error::UnresolvedMavenArtifact {
                coordinate: format!("{group_id}:{artifact_id}"),
                reason: "a stream matches this artifact but no known version satisfies its selector"
                    .to_string(),
            }),
        };
    }

    // Depth-first into required channels, declared order, first hit wins.
    for &child in &node.requires {
        if let Some(found) = resolve_latest_version(
            nodes,
            child,
            group_id,
            artifact_id,
            extension,
            classifier,
            base_version,
        )? {
            return Ok(Some(found));
        }
    }

    no_stream_fallback(nodes, id, group_id, artifact_id, extension, classifier, base_version)
}

fn no_stream_fallback(
    nodes: &[ChannelInstance],
    id: NodeId,
    group_id: &str,
    artifact_id: &str,
    extension: Option<&str>,
    classifier: Option<&str>,
    base_version: Option<&str>,
) -> Result<Option<FoundVersion>> {
    let node = &nodes[id];
    let strategy = node.def.no_stream_strategy();
    let version = match strategy {
        NoStreamStrategy::None => None,
        NoStreamStrategy::Latest => {
            let known = node
                .backend
                .all_versions(group_id, artifact_id, extension, classifier)?;
            latest_of(
                known
                    .iter()
                    .map(String::as_str)
                    .filter(|version| !node.blocklist.blocks(group_id, artifact_id, version)),
            )
            .map(str::to_string)
        }
        NoStreamStrategy::MavenLatest => {
            node.backend.metadata_latest_version(group_id, artifact_id)?
        }
        NoStreamStrategy::MavenRelease => {
            node.backend.metadata_release_version(group_id, artifact_id)?
        }
        NoStreamStrategy::Original => base_version.map(str::to_string),
    };
    if let Some(version) = &version {
        debug!(group_id, artifact_id, %version, ?strategy, "no-stream fallback engaged");
    }
    Ok(version.map(|version| FoundVersion {
        version,
        channel: id,
    }))
}
