//! Mock implementations for testing

mod detector;
mod enricher;
mod position;

pub use detector::{MockDetection, MockDetector};
pub use enricher::MockEnricher;
pub use position::MockPositionProvider;

use landmark_core::Error;
use landmark_core::error::{IoError, ServiceError, ServiceKind, ValidationError};
use std::path::Path;
use std::time::Duration;

/// A failure a mock can be scripted to produce
///
/// Library errors are not `Clone`, so mocks keep a description and build a
/// fresh error on every call.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedFailure {
    Network,
    RateLimited,
    Timeout,
    MissingCredential,
    HttpStatus(u16),
    FileNotFound(String),
    InvalidParameter(String),
}

impl ScriptedFailure {
    pub fn to_error(&self, service: ServiceKind) -> Error {
        match self {
            Self::Network => ServiceError::network(service, "Failed to fetch").into(),
            Self::RateLimited => ServiceError::http_status(service, 429, "Too many requests").into(),
            Self::Timeout => ServiceError::timeout(&format!("{service} request"), Duration::from_secs(30)).into(),
            Self::MissingCredential => ServiceError::missing_credential(service).into(),
            Self::HttpStatus(code) => ServiceError::http_status(service, *code, "scripted failure").into(),
            Self::FileNotFound(path) => IoError::file_not_found(Path::new(path)).into(),
            Self::InvalidParameter(name) => {
                ValidationError::invalid_parameter(name, "rejected by mock").into()
            }
        }
    }
}
