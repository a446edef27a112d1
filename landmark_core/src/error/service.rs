//! Upstream service error types

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which upstream capability produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// Landmark detection service
    Vision,
    /// Encyclopedic / geographic search service
    Enrichment,
    /// Device or configured position source
    Geolocation,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Vision => "vision",
            Self::Enrichment => "enrichment",
            Self::Geolocation => "geolocation",
        };
        f.write_str(name)
    }
}

/// Errors raised while talking to external services
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Transport level failure, the request never got a response
    #[error("Network error contacting {service} service: {message}")]
    NetworkOffline {
        service: ServiceKind,
        message: String,
    },

    /// Non-2xx HTTP response
    #[error("{service} API error: HTTP {code} - {message}")]
    HttpStatus {
        service: ServiceKind,
        code: u16,
        message: String,
    },

    /// Error object embedded in an otherwise successful response
    #[error("{service} API reported an error: {message}")]
    Upstream {
        service: ServiceKind,
        message: String,
    },

    /// No API key configured
    #[error("{service} API key is not configured")]
    MissingCredential { service: ServiceKind },

    /// Quota or rate limit exhausted
    #[error("{service} rate limit exceeded")]
    RateLimited { service: ServiceKind },

    /// Operation did not complete in time
    #[error("Operation '{operation}' timed out after {}s", after.as_secs_f64())]
    Timeout { operation: String, after: Duration },

    /// Response body could not be understood
    #[error("Invalid response from {service} service: {message}")]
    InvalidResponse {
        service: ServiceKind,
        message: String,
    },
}

impl ServiceError {
    /// Create a transport error
    pub fn network(service: ServiceKind, message: impl Into<String>) -> Self {
        Self::NetworkOffline {
            service,
            message: message.into(),
        }
    }

    /// Create an HTTP status error. 429 is mapped to [`ServiceError::RateLimited`].
    pub fn http_status(service: ServiceKind, code: u16, message: &str) -> Self {
        if code == 429 {
            return Self::RateLimited { service };
        }
        Self::HttpStatus {
            service,
            code,
            message: message.to_string(),
        }
    }

    /// Create an upstream-reported error
    pub fn upstream(service: ServiceKind, message: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            message: message.into(),
        }
    }

    /// Create a missing credential error
    pub fn missing_credential(service: ServiceKind) -> Self {
        Self::MissingCredential { service }
    }

    /// Create a timeout error
    pub fn timeout(operation: &str, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.to_string(),
            after,
        }
    }

    /// Create an invalid response error
    pub fn invalid_response(service: ServiceKind, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service,
            message: message.into(),
        }
    }

    /// Service the error came from, if any
    pub fn service(&self) -> Option<ServiceKind> {
        match self {
            Self::NetworkOffline { service, .. }
            | Self::HttpStatus { service, .. }
            | Self::Upstream { service, .. }
            | Self::MissingCredential { service }
            | Self::RateLimited { service }
            | Self::InvalidResponse { service, .. } => Some(*service),
            Self::Timeout { .. } => None,
        }
    }

    /// Check if this error is transient and can be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkOffline { .. } | Self::RateLimited { .. } | Self::Timeout { .. } => true,
            Self::HttpStatus { code, .. } => matches!(code, 500..=504),
            Self::Upstream { .. } | Self::MissingCredential { .. } | Self::InvalidResponse { .. } => {
                false
            }
        }
    }

    /// Check if this error indicates a permanent failure
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::MissingCredential { .. } => true,
            Self::HttpStatus { code, .. } => matches!(code, 400..=428 | 430..=499),
            _ => false,
        }
    }
}

impl ServiceError {
    /// Map a transport error from `reqwest` onto the service taxonomy
    ///
    /// `request_timeout` is the client timeout that was in force, reported
    /// back when the request timed out.
    pub fn from_transport(service: ServiceKind, err: reqwest::Error, request_timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::timeout(&format!("{service} request"), request_timeout)
        } else if err.is_decode() {
            Self::invalid_response(service, err.to_string())
        } else if let Some(status) = err.status() {
            Self::http_status(service, status.as_u16(), &err.to_string())
        } else {
            Self::network(service, err.to_string())
        }
    }
}
