//! Structured error description handed to callers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Free-form context attached to a classified error
pub type ErrorContext = BTreeMap<String, String>;

/// Broad failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Network,
    Api,
    Permission,
    Validation,
    /// Nothing recognizable in the user's photo
    User,
    System,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::Api => "api",
            Self::Permission => "permission",
            Self::Validation => "validation",
            Self::User => "user",
            Self::System => "system",
        };
        f.write_str(name)
    }
}

/// Subdivision of [`ErrorCategory::Api`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    Vision,
    Enrichment,
    RateLimit,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A fully classified failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Stable machine code, e.g. `NETWORK_ERROR`
    pub code: String,
    /// Raw message of the underlying failure
    pub message: String,
    /// Short text safe to show to an end user
    pub user_message: String,
    /// Ordered remedies, most useful first
    pub suggestions: Vec<String>,
    pub recoverable: bool,
    pub category: ErrorCategory,
    pub api_kind: Option<ApiErrorKind>,
    pub severity: Severity,
    /// Recommended wait before retrying, in milliseconds
    pub retry_after_ms: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub context: ErrorContext,
}

impl ErrorDetails {
    /// Number of suggestions surfaced to users
    pub const VISIBLE_SUGGESTIONS: usize = 3;

    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after_ms.map(Duration::from_millis)
    }

    /// The first few suggestions, the ones worth showing
    pub fn visible_suggestions(&self) -> &[String] {
        let shown = self.suggestions.len().min(Self::VISIBLE_SUGGESTIONS);
        &self.suggestions[..shown]
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)
    }
}

impl std::error::Error for ErrorDetails {}
