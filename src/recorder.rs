//! Accumulates resolved versions into a replayable manifest.

use std::collections::BTreeSet;

use tracing::debug;

use crate::manifest::{ChannelManifest, Stream};

/// Ordered set of `(group_id, artifact_id, version)` triples. Recording is
/// idempotent; duplicate triples are a no-op.
#[derive(Debug, Default)]
pub(crate) struct ChannelRecorder {
    streams: BTreeSet<(String, String, String)>,
}

impl ChannelRecorder {
    pub(crate) fn record(&mut self, group_id: &str, artifact_id: &str, version: &str) {
        let inserted = self.streams.insert((
            group_id.to_string(),
            artifact_id.to_string(),
            version.to_string(),
        ));
        if inserted {
            debug!(group_id, artifact_id, version, "recorded resolution");
        }
    }

    /// The replay manifest: one fixed-version stream per recorded
    /// coordinate. If distinct versions of the same coordinate were
    /// recorded, the first in `(group, artifact, version)` order is kept.
    pub(crate) fn manifest(&self) -> ChannelManifest {
        let mut seen: BTreeSet<(&str, &str)> = BTreeSet::new();
        let mut streams = BTreeSet::new();
        for (group_id, artifact_id, version) in &self.streams {
            if seen.insert((group_id.as_str(), artifact_id.as_str())) {
                if let Ok(stream) = Stream::fixed(group_id, artifact_id, version) {
                    streams.insert(stream);
                }
            }
        }
        ChannelManifest::from_recorded(streams)
    }
}
