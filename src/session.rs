//! Resolver sessions: the top-level composition across channels.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use tracing::debug;

use crate::backend::{ArtifactBackend, ArtifactCoordinate, BackendFactory};
use crate::channel::{Channel, Repository};
use crate::error::Error;
use crate::instance::{self, ChannelInstance, FoundVersion, NodeId};
use crate::manifest::ChannelManifest;
use crate::recorder::ChannelRecorder;
use crate::version::compare;
use crate::Result;

/// A resolved artifact: the full coordinate plus the fetched file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MavenArtifact {
    pub group_id: String,
    pub artifact_id: String,
    pub extension: Option<String>,
    pub classifier: Option<String>,
    pub version: String,
    pub file: PathBuf,
}

/// Resolves Maven artifacts against a list of channels within one scope.
///
/// Channels are instantiated once at construction; every resolution scans
/// the root channels in input order, arbitrates the greatest candidate
/// version, fetches through the winning channel and records the result.
/// Sessions are single-threaded; concurrent sessions are independent.
pub struct ChannelSession {
    nodes: Vec<ChannelInstance>,
    roots: Vec<NodeId>,
    combined: Box<dyn ArtifactBackend>,
    recorder: ChannelRecorder,
    closed: bool,
}

impl std::fmt::Debug for ChannelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSession")
            .field("nodes", &self.nodes.len())
            .field("roots", &self.roots)
            .field("recorder", &self.recorder)
            .field("closed", &self.closed)
            .finish()
    }
}

impl ChannelSession {
    /// Build a session from channel definitions and a backend factory.
    ///
    /// The factory is called once with the union of all channel
    /// repositories (backing direct resolution) and once per channel
    /// instance with that channel's effective repositories.
    pub fn new(definitions: Vec<Channel>, factory: &dyn BackendFactory) -> Result<Self> {
        let union: Vec<Repository> = definitions
            .iter()
            .flat_map(|channel| channel.repositories().iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let combined = factory.create(&union)?;

        let nodes = instance::build_graph(definitions, factory)?;
        let roots: Vec<NodeId> = nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| !node.is_dependency())
            .map(|(id, _)| id)
            .collect();
        validate_root_manifest_ids(&nodes, &roots)?;

        debug!(channels = roots.len(), "channel session opened");
        Ok(Self {
            nodes,
            roots,
            combined,
            recorder: ChannelRecorder::default(),
            closed: false,
        })
    }

    /// Resolve a coordinate through the channels and fetch the artifact.
    pub fn resolve_maven_artifact(
        &mut self,
        group_id: &str,
        artifact_id: &str,
        extension: Option<&str>,
        classifier: Option<&str>,
        base_version: Option<&str>,
    ) -> Result<MavenArtifact> {
        let found =
            self.find_latest(group_id, artifact_id, extension, classifier, base_version)?;
        let file = self.nodes[found.channel].resolve_artifact(
            group_id,
            artifact_id,
            extension,
            classifier,
            &found.version,
        )?;
        self.recorder.record(group_id, artifact_id, &found.version);
        Ok(MavenArtifact {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            extension: extension.map(str::to_string),
            classifier: classifier.map(str::to_string),
            version: found.version,
            file,
        })
    }

    /// Resolve a list of coordinates, grouping fetches by winning channel.
    ///
    /// Each coordinate's own `version` field feeds arbitration as its base
    /// version. The returned list does not preserve the request order;
    /// within one channel, fetches keep their relative order.
    pub fn resolve_maven_artifacts(
        &mut self,
        coordinates: &[ArtifactCoordinate],
    ) -> Result<Vec<MavenArtifact>> {
        let mut per_channel: BTreeMap<NodeId, Vec<ArtifactCoordinate>> = BTreeMap::new();
        for coordinate in coordinates {
            let found = self.find_latest(
                &coordinate.group_id,
                &coordinate.artifact_id,
                coordinate.extension.as_deref(),
                coordinate.classifier.as_deref(),
                Some(&coordinate.version),
            )?;
            let mut query = coordinate.clone();
            query.version = found.version;
            per_channel.entry(found.channel).or_default().push(query);
        }

        let mut resolved = Vec::with_capacity(coordinates.len());
        for (channel, requests) in &per_channel {
            let files = self.nodes[*channel].resolve_artifacts(requests)?;
            for (request, file) in requests.iter().zip(files) {
                self.recorder
                    .record(&request.group_id, &request.artifact_id, &request.version);
                resolved.push(artifact_from(request, file));
            }
        }
        Ok(resolved)
    }

    /// Fetch an exact version through the combined repositories, bypassing
    /// the channels. The resolution is still recorded.
    pub fn resolve_direct_maven_artifact(
        &mut self,
        group_id: &str,
        artifact_id: &str,
        extension: Option<&str>,
        classifier: Option<&str>,
        version: &str,
    ) -> Result<MavenArtifact> {
        let file = self
            .combined
            .resolve_artifact(group_id, artifact_id, extension, classifier, version)?;
        self.recorder.record(group_id, artifact_id, version);
        Ok(MavenArtifact {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            extension: extension.map(str::to_string),
            classifier: classifier.map(str::to_string),
            version: version.to_string(),
            file,
        })
    }

    /// Batched form of [`Self::resolve_direct_maven_artifact`], order-preserving.
    pub fn resolve_direct_maven_artifacts(
        &mut self,
        coordinates: &[ArtifactCoordinate],
    ) -> Result<Vec<MavenArtifact>> {
        let files = self.combined.resolve_artifacts(coordinates)?;
        let mut resolved = Vec::with_capacity(coordinates.len());
        for (coordinate, file) in coordinates.iter().zip(files) {
            self.recorder
                .record(&coordinate.group_id, &coordinate.artifact_id, &coordinate.version);
            resolved.push(artifact_from(coordinate, file));
        }
        Ok(resolved)
    }

    /// Arbitrate the winning version for a coordinate without fetching.
    pub fn find_latest_maven_artifact_version(
        &self,
        group_id: &str,
        artifact_id: &str,
        extension: Option<&str>,
        classifier: Option<&str>,
        base_version: Option<&str>,
    ) -> Result<String> {
        Ok(self
            .find_latest(group_id, artifact_id, extension, classifier, base_version)?
            .version)
    }

    /// The manifest of every resolution performed so far. Fed back into a
    /// new session as the sole channel with the same repositories, it
    /// reproduces each recorded coordinate at the identical version.
    pub fn recorded_manifest(&self) -> ChannelManifest {
        self.recorder.manifest()
    }

    /// Release every channel backend and the combined backend. Safe to call
    /// more than once; later calls are no-ops.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for node in &mut self.nodes {
            node.close();
        }
        self.combined.close();
        debug!("channel session closed");
    }

    fn find_latest(
        &self,
        group_id: &str,
        artifact_id: &str,
        extension: Option<&str>,
        classifier: Option<&str>,
        base_version: Option<&str>,
    ) -> Result<FoundVersion> {
        // A later root only displaces the best candidate with a strictly
        // greater version, so comparator-equal proposals keep the earliest
        // root even when their strings differ (`1.0` vs `1.0.0`).
        let mut best: Option<FoundVersion> = None;
        for &root in &self.roots {
            if let Some(found) = instance::resolve_latest_version(
                &self.nodes,
                root,
                group_id,
                artifact_id,
                extension,
                classifier,
                base_version,
            )? {
                let greater = match &best {
                    Some(current) => {
                        compare(&found.version, &current.version) == Ordering::Greater
                    }
                    None => true,
                };
                if greater {
                    best = Some(found);
                }
            }
        }
        best.ok_or_else(|| Error::UnresolvedMavenArtifact {
            coordinate: format!("{group_id}:{artifact_id}"),
            reason: "no channel provides a stream for this artifact".to_string(),
        })
    }
}

impl Drop for ChannelSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn artifact_from(coordinate: &ArtifactCoordinate, file: PathBuf) -> MavenArtifact {
    MavenArtifact {
        group_id: coordinate.group_id.clone(),
        artifact_id: coordinate.artifact_id.clone(),
        extension: coordinate.extension.clone(),
        classifier: coordinate.classifier.clone(),
        version: coordinate.version.clone(),
        file,
    }
}

fn validate_root_manifest_ids(nodes: &[ChannelInstance], roots: &[NodeId]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for &root in roots {
        if let Some(id) = nodes[root].manifest().id() {
            if !seen.insert(id) {
                return Err(Error::DuplicateManifestId { id: id.to_string() });
            }
        }
    }
    Ok(())
}
