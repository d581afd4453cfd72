use recall_vector_store::VectorStoreError;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

/// Which collaborator call a failure or timeout belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Describer,
    Embedder,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Describer => "describer",
            Self::Embedder => "embedder",
        })
    }
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Position {position} out of range (len {len})")]
    OutOfRange { position: usize, len: usize },

    #[error("Describer error: {0}")]
    DescriberFailure(String),

    #[error("Embedding error: {0}")]
    EmbedderFailure(String),

    #[error("Upstream {stage} call timed out after {timeout_ms} ms")]
    UpstreamTimeout { stage: Stage, timeout_ms: u64 },

    #[error("Index is empty. Add images first.")]
    EmptyIndex,

    #[error("Storage error: {0}")]
    Storage(VectorStoreError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Index is open read-only: {0}")]
    ReadOnly(&'static str),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IndexError {
    /// Stable snake_case identifier used in wire error envelopes.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::OutOfRange { .. } => "out_of_range",
            Self::DescriberFailure(_) => "describer_failure",
            Self::EmbedderFailure(_) => "embedder_failure",
            Self::UpstreamTimeout { .. } => "upstream_timeout",
            Self::EmptyIndex => "empty_index",
            Self::Storage(_) => "storage",
            Self::InvalidConfig(_) => "invalid_config",
            Self::ReadOnly(_) => "read_only",
            Self::Internal(_) => "internal",
        }
    }

    /// Upstream failures are transient; retrying the whole call is safe.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DescriberFailure(_) | Self::EmbedderFailure(_) | Self::UpstreamTimeout { .. }
        )
    }
}

impl From<VectorStoreError> for IndexError {
    fn from(err: VectorStoreError) -> Self {
        match err {
            VectorStoreError::InvalidDimension { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            VectorStoreError::OutOfRange { position, len } => Self::OutOfRange { position, len },
            other => Self::Storage(other),
        }
    }
}

/// Failure reported by a describer or embedder backend.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Upstream returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("Upstream configuration error: {0}")]
    Config(String),
}
