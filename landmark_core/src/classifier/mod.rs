//! Error classification
//!
//! [`ErrorClassifier`] annotates failures with a category, user-facing text,
//! ordered remedies and a retry recommendation. It never decides control
//! flow; the recognition service does that using the annotations.
//!
//! Free-text classification runs a fixed, ordered series of keyword tests
//! against the lower-cased message:
//!
//! 1. network
//! 2. api (rate limit, vision, enrichment, then generic)
//! 3. permission
//! 4. validation
//! 5. no landmark detected
//! 6. system (fallback)

use crate::error::{Error, InternalError, IoErrorKind, ServiceError, ServiceKind};
use chrono::Utc;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

mod details;
mod sink;

pub use details::{ApiErrorKind, ErrorCategory, ErrorContext, ErrorDetails, Severity};
pub use sink::{ErrorLog, ErrorSink, LogSink};

const NETWORK_TERMS: &[&str] = &[
    "failed to fetch",
    "network",
    "connection",
    "timed out",
    "timeout",
    "offline",
    "dns",
    "unreachable",
    "socket",
];
const RATE_LIMIT_TERMS: &[&str] = &["rate limit", "429", "quota", "too many requests"];
const VISION_TERMS: &[&str] = &["vision", "annotate", "landmark detection"];
const ENRICHMENT_TERMS: &[&str] = &["wikipedia", "enrichment", "mediawiki", "geosearch"];
const API_TERMS: &[&str] = &["api", "http ", "status code", "unauthorized", "bad request"];
const PERMISSION_TERMS: &[&str] = &["permission", "access denied", "not allowed", "geolocation"];
const VALIDATION_TERMS: &[&str] = &[
    "invalid",
    "unsupported",
    "too large",
    "format",
    "empty",
    "not found",
    "validation",
];
const NO_LANDMARK_TERMS: &[&str] = &[
    "no landmark",
    "not recognized",
    "low confidence",
    "could not identify",
    "no results",
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Fixed description of one category
struct Template {
    code: &'static str,
    category: ErrorCategory,
    api_kind: Option<ApiErrorKind>,
    severity: Severity,
    recoverable: bool,
    retry_after: Option<Duration>,
    user_message: &'static str,
    suggestions: &'static [&'static str],
}

const NETWORK: Template = Template {
    code: "NETWORK_ERROR",
    category: ErrorCategory::Network,
    api_kind: None,
    severity: Severity::Medium,
    recoverable: true,
    retry_after: Some(Duration::from_secs(3)),
    user_message: "Unable to reach the recognition services.",
    suggestions: &[
        "Check your internet connection",
        "Try again in a few moments",
        "Switch to a more stable network",
    ],
};

const TIMEOUT: Template = Template {
    code: "TIMEOUT",
    category: ErrorCategory::Network,
    api_kind: None,
    severity: Severity::Medium,
    recoverable: true,
    retry_after: Some(Duration::from_secs(3)),
    user_message: "Recognition took too long to complete.",
    suggestions: &[
        "Check your internet connection",
        "Try again with a smaller image",
        "Increase the recognition timeout",
    ],
};

const RATE_LIMIT: Template = Template {
    code: "RATE_LIMITED",
    category: ErrorCategory::Api,
    api_kind: Some(ApiErrorKind::RateLimit),
    severity: Severity::Medium,
    recoverable: true,
    retry_after: Some(Duration::from_secs(60)),
    user_message: "Too many requests were sent. Please wait before trying again.",
    suggestions: &[
        "Wait a minute before retrying",
        "Process fewer images at once",
        "Keep the cache enabled to reuse earlier results",
    ],
};

const VISION_API: Template = Template {
    code: "VISION_API_ERROR",
    category: ErrorCategory::Api,
    api_kind: Some(ApiErrorKind::Vision),
    severity: Severity::High,
    recoverable: true,
    retry_after: Some(Duration::from_secs(5)),
    user_message: "The landmark recognition service is unavailable.",
    suggestions: &[
        "Try again shortly",
        "Check that the vision API key is valid",
        "Use location-based identification instead",
    ],
};

const ENRICHMENT_API: Template = Template {
    code: "ENRICHMENT_API_ERROR",
    category: ErrorCategory::Api,
    api_kind: Some(ApiErrorKind::Enrichment),
    severity: Severity::Low,
    recoverable: true,
    retry_after: Some(Duration::from_secs(5)),
    user_message: "Details about this landmark could not be loaded.",
    suggestions: &[
        "The landmark was identified, only its details are missing",
        "Try again later for the full description",
    ],
};

const GENERAL_API: Template = Template {
    code: "API_ERROR",
    category: ErrorCategory::Api,
    api_kind: Some(ApiErrorKind::General),
    severity: Severity::Medium,
    recoverable: true,
    retry_after: Some(Duration::from_secs(5)),
    user_message: "An external service returned an error.",
    suggestions: &["Try again shortly", "Check the service configuration"],
};

const CREDENTIAL_MISSING: Template = Template {
    code: "CREDENTIAL_MISSING",
    category: ErrorCategory::Api,
    api_kind: Some(ApiErrorKind::General),
    severity: Severity::Critical,
    recoverable: false,
    retry_after: None,
    user_message: "The recognition service is not configured.",
    suggestions: &[
        "Configure an API key for the vision service",
        "Use location-based identification instead",
    ],
};

const PERMISSION: Template = Template {
    code: "PERMISSION_DENIED",
    category: ErrorCategory::Permission,
    api_kind: None,
    severity: Severity::Medium,
    recoverable: true,
    retry_after: Some(Duration::from_secs(1)),
    user_message: "Permission is required to continue.",
    suggestions: &[
        "Grant access to the photo or location",
        "Check the file permissions",
        "Enter your location manually",
    ],
};

const VALIDATION: Template = Template {
    code: "INVALID_INPUT",
    category: ErrorCategory::Validation,
    api_kind: None,
    severity: Severity::Low,
    recoverable: true,
    retry_after: Some(Duration::from_secs(1)),
    user_message: "This image could not be processed.",
    suggestions: &[
        "Use a JPEG, PNG or WebP image",
        "Use an image smaller than 10 MB",
        "Check the file path or URL",
    ],
};

const NO_LANDMARK: Template = Template {
    code: "NO_LANDMARK_DETECTED",
    category: ErrorCategory::User,
    api_kind: None,
    severity: Severity::Low,
    recoverable: true,
    retry_after: Some(Duration::from_secs(1)),
    user_message: "No landmark could be identified in this photo.",
    suggestions: &[
        "Take a clearer photo with the landmark in view",
        "Make sure the landmark is well lit",
        "Enable location-based fallback",
    ],
};

const SYSTEM: Template = Template {
    code: "UNKNOWN_ERROR",
    category: ErrorCategory::System,
    api_kind: None,
    severity: Severity::High,
    recoverable: true,
    retry_after: Some(Duration::from_secs(5)),
    user_message: "Something went wrong.",
    suggestions: &[
        "Try again",
        "Restart the application if the problem persists",
    ],
};

fn template_for_text(lower: &str) -> &'static Template {
    if contains_any(lower, NETWORK_TERMS) {
        &NETWORK
    } else if contains_any(lower, RATE_LIMIT_TERMS) {
        &RATE_LIMIT
    } else if contains_any(lower, VISION_TERMS) {
        &VISION_API
    } else if contains_any(lower, ENRICHMENT_TERMS) {
        &ENRICHMENT_API
    } else if contains_any(lower, API_TERMS) {
        &GENERAL_API
    } else if contains_any(lower, PERMISSION_TERMS) {
        &PERMISSION
    } else if contains_any(lower, VALIDATION_TERMS) {
        &VALIDATION
    } else if contains_any(lower, NO_LANDMARK_TERMS) {
        &NO_LANDMARK
    } else {
        &SYSTEM
    }
}

fn api_template(service: ServiceKind) -> &'static Template {
    match service {
        ServiceKind::Vision => &VISION_API,
        ServiceKind::Enrichment => &ENRICHMENT_API,
        ServiceKind::Geolocation => &PERMISSION,
    }
}

/// Turns failures into [`ErrorDetails`]
#[derive(Clone, Default)]
pub struct ErrorClassifier {
    sink: Option<Arc<dyn ErrorSink>>,
}

impl ErrorClassifier {
    /// A classifier without a sink
    pub fn new() -> Self {
        Self::default()
    }

    /// A classifier that records every result into `sink`
    pub fn with_sink(sink: Arc<dyn ErrorSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Classify any displayable failure by its message
    pub fn classify(&self, error: &dyn Display, context: ErrorContext) -> ErrorDetails {
        let message = error.to_string();
        let template = template_for_text(&message.to_lowercase());
        self.build(template, message, context)
    }

    /// Classify one of this crate's errors, using its type where it is
    /// more precise than the message
    pub fn classify_error(&self, error: &Error, context: ErrorContext) -> ErrorDetails {
        let template = match error {
            Error::Service(service_error) => match service_error {
                ServiceError::Timeout { .. } => &TIMEOUT,
                ServiceError::NetworkOffline { .. } => &NETWORK,
                ServiceError::RateLimited { .. } => &RATE_LIMIT,
                ServiceError::MissingCredential { service } => {
                    let mut details = self.build_unrecorded(
                        &CREDENTIAL_MISSING,
                        error.to_string(),
                        context,
                    );
                    details.user_message = format!("The {service} service is not configured.");
                    details.suggestions[0] = format!("Configure an API key for the {service} service");
                    if *service == ServiceKind::Vision {
                        details.api_kind = Some(ApiErrorKind::Vision);
                    } else if *service == ServiceKind::Enrichment {
                        details.api_kind = Some(ApiErrorKind::Enrichment);
                    }
                    self.record(&details);
                    return details;
                }
                ServiceError::HttpStatus { service, .. }
                | ServiceError::Upstream { service, .. }
                | ServiceError::InvalidResponse { service, .. } => api_template(*service),
            },
            Error::Validation(_) => &VALIDATION,
            Error::Io(io_error) => match io_error.kind {
                IoErrorKind::PermissionDenied => &PERMISSION,
                IoErrorKind::FileNotFound | IoErrorKind::EmptyFile => &VALIDATION,
                IoErrorKind::Other => &SYSTEM,
            },
            Error::Internal(InternalError::ImageProcessing { .. }) => &VALIDATION,
            Error::Internal(_) => return self.classify(error, context),
        };
        self.build(template, error.to_string(), context)
    }

    /// The "nothing recognizable" error, for when recognition produced no
    /// failure but also no usable landmark
    pub fn no_landmark(&self, message: impl Into<String>, context: ErrorContext) -> ErrorDetails {
        self.build(&NO_LANDMARK, message.into(), context)
    }

    /// Recommended wait before retrying a given category
    pub fn retry_delay(category: ErrorCategory, api_kind: Option<ApiErrorKind>) -> Duration {
        match (category, api_kind) {
            (ErrorCategory::Api, Some(ApiErrorKind::RateLimit)) => RATE_LIMIT.retry_after,
            (ErrorCategory::Api, _) => GENERAL_API.retry_after,
            (ErrorCategory::Network, _) => NETWORK.retry_after,
            (ErrorCategory::Permission, _) => PERMISSION.retry_after,
            (ErrorCategory::Validation, _) => VALIDATION.retry_after,
            (ErrorCategory::User, _) => NO_LANDMARK.retry_after,
            (ErrorCategory::System, _) => SYSTEM.retry_after,
        }
        .unwrap_or(Duration::ZERO)
    }

    fn build(&self, template: &Template, message: String, context: ErrorContext) -> ErrorDetails {
        let details = self.build_unrecorded(template, message, context);
        self.record(&details);
        details
    }

    fn build_unrecorded(
        &self,
        template: &Template,
        message: String,
        context: ErrorContext,
    ) -> ErrorDetails {
        ErrorDetails {
            code: template.code.to_string(),
            message,
            user_message: template.user_message.to_string(),
            suggestions: template.suggestions.iter().map(|s| s.to_string()).collect(),
            recoverable: template.recoverable,
            category: template.category,
            api_kind: template.api_kind,
            severity: template.severity,
            retry_after_ms: template.retry_after.map(|d| d.as_millis() as u64),
            timestamp: Utc::now(),
            context,
        }
    }

    fn record(&self, details: &ErrorDetails) {
        if let Some(sink) = &self.sink {
            sink.record(details);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use std::path::Path;

    fn classify(message: &str) -> ErrorDetails {
        ErrorClassifier::new().classify(&message, ErrorContext::new())
    }

    #[test]
    fn test_failed_to_fetch_is_network() {
        let details = classify("Failed to fetch");
        assert_eq!(details.category, ErrorCategory::Network);
        assert!(details.recoverable);
        assert_eq!(details.code, "NETWORK_ERROR");
    }

    #[test]
    fn test_rate_limit_waits_longer_than_network() {
        let rate = classify("429 rate limit exceeded");
        let network = classify("Failed to fetch");

        assert_eq!(rate.category, ErrorCategory::Api);
        assert_eq!(rate.api_kind, Some(ApiErrorKind::RateLimit));
        assert!(rate.retry_after().unwrap() >= network.retry_after().unwrap() * 10);
    }

    #[test]
    fn test_network_terms_win_over_api_terms() {
        let details = classify("Vision API network connection reset");
        assert_eq!(details.category, ErrorCategory::Network);
    }

    #[test]
    fn test_api_subdivisions() {
        assert_eq!(classify("Vision API error: HTTP 500").api_kind, Some(ApiErrorKind::Vision));
        assert_eq!(classify("Wikipedia API returned 502").api_kind, Some(ApiErrorKind::Enrichment));
        assert_eq!(classify("API error: status code 418").api_kind, Some(ApiErrorKind::General));
    }

    #[test]
    fn test_permission_validation_user_system_order() {
        assert_eq!(classify("Permission denied").category, ErrorCategory::Permission);
        assert_eq!(classify("Invalid image format").category, ErrorCategory::Validation);
        assert_eq!(classify("No landmark detected in image").category, ErrorCategory::User);
        assert_eq!(classify("something odd").category, ErrorCategory::System);
    }

    #[test]
    fn test_permission_before_validation() {
        // "permission" and "invalid" both match, permission comes first
        let details = classify("invalid permission on file");
        assert_eq!(details.category, ErrorCategory::Permission);
    }

    #[test]
    fn test_suggestions_are_bounded_when_shown() {
        for message in ["Failed to fetch", "429", "Permission denied", "unknown"] {
            let details = classify(message);
            assert!(details.suggestions.len() >= 2);
            assert!(details.visible_suggestions().len() <= 3);
        }
    }

    #[test]
    fn test_context_is_kept() {
        let mut context = ErrorContext::new();
        context.insert("stage".to_string(), "recognition".to_string());
        let details = ErrorClassifier::new().classify(&"Failed to fetch", context);
        assert_eq!(details.context.get("stage").map(String::as_str), Some("recognition"));
    }

    #[test]
    fn test_typed_timeout() {
        let error: Error = ServiceError::timeout("recognition", Duration::from_secs(15)).into();
        let details = ErrorClassifier::new().classify_error(&error, ErrorContext::new());
        assert_eq!(details.code, "TIMEOUT");
        assert_eq!(details.category, ErrorCategory::Network);
    }

    #[test]
    fn test_typed_missing_credential() {
        let error: Error = ServiceError::missing_credential(ServiceKind::Vision).into();
        let details = ErrorClassifier::new().classify_error(&error, ErrorContext::new());
        assert_eq!(details.code, "CREDENTIAL_MISSING");
        assert_eq!(details.api_kind, Some(ApiErrorKind::Vision));
        assert!(!details.recoverable);
        assert_eq!(details.severity, Severity::Critical);
        assert!(details.user_message.contains("vision"));
    }

    #[test]
    fn test_typed_service_errors_use_service_kind() {
        let classifier = ErrorClassifier::new();
        let error: Error = ServiceError::http_status(ServiceKind::Enrichment, 500, "boom").into();
        let details = classifier.classify_error(&error, ErrorContext::new());
        assert_eq!(details.api_kind, Some(ApiErrorKind::Enrichment));

        let error: Error = ServiceError::http_status(ServiceKind::Vision, 429, "slow down").into();
        let details = classifier.classify_error(&error, ErrorContext::new());
        assert_eq!(details.api_kind, Some(ApiErrorKind::RateLimit));
    }

    #[test]
    fn test_typed_io_and_validation() {
        let classifier = ErrorClassifier::new();
        let error: Error = crate::error::IoError::file_not_found(Path::new("a.jpg")).into();
        assert_eq!(
            classifier.classify_error(&error, ErrorContext::new()).category,
            ErrorCategory::Validation
        );

        let error: Error = ValidationError::unsupported_image("not an image").into();
        assert_eq!(
            classifier.classify_error(&error, ErrorContext::new()).category,
            ErrorCategory::Validation
        );
    }

    #[test]
    fn test_retry_delay_table() {
        let rate = ErrorClassifier::retry_delay(ErrorCategory::Api, Some(ApiErrorKind::RateLimit));
        let network = ErrorClassifier::retry_delay(ErrorCategory::Network, None);
        assert_eq!(rate, Duration::from_secs(60));
        assert!(network < rate);
    }

    #[test]
    fn test_sink_receives_and_bounds() {
        let log = Arc::new(ErrorLog::new(2));
        let classifier = ErrorClassifier::with_sink(log.clone());

        classifier.classify(&"first network failure", ErrorContext::new());
        classifier.classify(&"second", ErrorContext::new());
        classifier.classify(&"third", ErrorContext::new());

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "second");
        assert_eq!(entries[1].message, "third");
    }

    #[test]
    fn test_zero_capacity_log_stays_empty() {
        let log = Arc::new(ErrorLog::new(0));
        let classifier = ErrorClassifier::with_sink(log.clone());
        classifier.classify(&"x", ErrorContext::new());
        assert!(log.is_empty());
    }

    #[test]
    fn test_details_display() {
        let details = classify("Failed to fetch");
        assert_eq!(
            details.to_string(),
            "[NETWORK_ERROR] Unable to reach the recognition services."
        );
    }
}
