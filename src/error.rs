//! Error types
//!
//! A cache miss is never an error: lookups return `Option`. The only faults the
//! cache raises on its own are contract violations around serialization; every
//! collaborator failure is forwarded untouched.

use thiserror::Error;

/// Faults raised by the cache layer itself
#[derive(Debug, Error)]
pub enum CacheError {
    /// A value could not be encoded into a cache payload.
    ///
    /// This is a programmer error: callers must fail the operation instead of
    /// continuing without a cache entry.
    #[error("failed to serialize value for key '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A stored payload does not decode into the expected shape
    #[error("failed to deserialize cached payload for key '{key}': {source}")]
    Deserialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A detached cache-population task was aborted before finishing
    #[error("cache population task aborted: {0}")]
    Task(String),
}

/// Errors surfaced by the service layer
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid email or password")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Collaborator failure, passed through unchanged
    #[error(transparent)]
    Repository(#[from] anyhow::Error),
}

impl ServiceError {
    /// HTTP status code a handler should answer with
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized => 401,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::Cache(_) | Self::Repository(_) => 500,
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
