//! Crate-wide error taxonomy.

use thiserror::Error;

use crate::{shard::ShardError, topology::VersionToken};

/// Errors surfaced by key building, scan planning and iteration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The supplied fields, range or resume key do not form a valid key
    /// specification for the target index.
    #[error("illegal key specification: {0}")]
    IllegalKeySpecification(String),
    /// A numeric or temporal value cannot be represented by its codec.
    #[error("malformed numeric value: {0}")]
    MalformedNumericValue(String),
    /// The shard topology changed structurally while an ordered multi-shard
    /// scan was open.
    #[error(
        "topology changed during an ordered scan (pinned {pinned:?}, current {current:?}): {detail}"
    )]
    UnsupportedTopologyChange {
        /// Token of the topology the scan was opened against.
        pinned: VersionToken,
        /// Token observed at the failing pull.
        current: VersionToken,
        /// What changed.
        detail: String,
    },
    /// A name or key resolved against the wrong table or index.
    #[error("not found: {0}")]
    NotFound(String),
    /// A shard cursor failed.
    #[error(transparent)]
    Shard(#[from] ShardError),
}

impl Error {
    pub(crate) fn illegal(message: impl Into<String>) -> Self {
        Error::IllegalKeySpecification(message.into())
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedNumericValue(message.into())
    }
}

/// Result alias for this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
