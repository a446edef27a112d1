//! Error types for the landmark recognition core
//!
//! Errors are grouped by where they originate. The orchestrator never
//! surfaces these directly to callers; they are first run through the
//! [`ErrorClassifier`](crate::classifier::ErrorClassifier).

use thiserror::Error;

pub mod internal;
pub mod io;
pub mod service;
pub mod validation;

pub use self::io::{IoError, IoErrorKind};
pub use self::service::{ServiceError, ServiceKind};
pub use self::validation::ValidationError;
pub use internal::InternalError;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the landmark core library
///
/// - I/O errors: reading local images and cache snapshots
/// - Service errors: failures talking to the vision or enrichment services
/// - Validation errors: bad input or configuration
/// - Internal errors: image processing, background tasks, cache bookkeeping
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error(transparent)]
    Io(#[from] IoError),

    /// Upstream service errors
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Validation related errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Internal library errors
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl Error {
    /// Whether retrying the same call could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Service(err) => err.is_transient(),
            Self::Io(_) | Self::Validation(_) => false,
            Self::Internal(err) => err.is_recoverable(),
        }
    }

    /// Whether retrying is pointless without a change of input or configuration
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Service(err) => err.is_permanent(),
            Self::Validation(_) => true,
            Self::Io(err) => err.kind != IoErrorKind::Other,
            Self::Internal(_) => false,
        }
    }
}

// Conversions from external error types

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io(IoError::from_std(source))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(InternalError::serialization(err.to_string()))
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Self::Internal(InternalError::image_processing(err.to_string()))
    }
}
