#![forbid(unsafe_code)]

//! Channel-based Maven artifact version resolution.
//!
//! A [`ChannelSession`] takes a list of [`Channel`] definitions, each naming
//! a manifest of curated version streams plus the repositories its artifacts
//! come from, and answers "which version of `groupId:artifactId` should this
//! build use, and where is the file". Every resolution is recorded so the
//! session can emit a manifest that replays the exact same versions.
//!
//! Repository I/O is injected through the [`ArtifactBackend`] capability;
//! the core never talks to a Maven repository itself.

pub mod backend;
pub mod blocklist;
pub mod channel;
pub mod error;
mod instance;
pub mod manifest;
mod recorder;
pub mod session;
pub mod version;

pub use error::{Error, Transience};
pub type Result<T> = std::result::Result<T, Error>;

pub use backend::{
    ArtifactBackend, ArtifactCoordinate, BackendError, BackendFactory, MetadataCoordinate,
};
pub use blocklist::{Blocklist, BlocklistEntry};
pub use channel::{Channel, MetadataSource, NoStreamStrategy, Repository};
pub use manifest::{
    ChannelManifest, ManifestCoordinate, ManifestRequirement, Stream, VersionSelector,
};
pub use session::{ChannelSession, MavenArtifact};
pub use version::{MavenVersion, VersionPattern};
