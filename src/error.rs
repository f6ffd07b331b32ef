use thiserror::Error;

use crate::backend::BackendError;

/// Whether retrying this operation may succeed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transience {
    /// Retry will never help without changing the channels or repositories.
    Permanent,
    /// Retry may help (transient repository outage).
    Retryable,
    /// Unknown if retry will help.
    Unknown,
}

impl Transience {
    pub fn is_retryable(self) -> bool {
        matches!(self, Transience::Retryable)
    }
}

/// Resolution errors surfaced to the session caller.
///
/// Resolver errors are never retried inside the core; backend errors carry
/// their own retryability and propagate unchanged.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("unable to resolve `{coordinate}`: {reason}")]
    UnresolvedMavenArtifact { coordinate: String, reason: String },

    #[error("required manifest `{id}` has no matching channel and no maven coordinates")]
    UnresolvedRequiredManifest { id: String },

    #[error("required manifests form a cycle: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("manifest `{id}` is provided by more than one channel")]
    DuplicateManifestId { id: String },

    #[error("invalid channel definition: {reason}")]
    InvalidChannel { reason: String },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl Error {
    pub fn transience(&self) -> Transience {
        match self {
            Error::Backend(e) => e.transience(),
            _ => Transience::Permanent,
        }
    }
}
