use colored::*;
use landmark_core::{ErrorCategory, ErrorDetails};
use std::error::Error as StdError;
use std::fmt;
use std::io;

/// CLI-specific error type with semantic exit codes
#[derive(Debug)]
pub struct CliError {
    /// The main error message
    message: String,

    /// Error category for exit code determination
    kind: ErrorKind,

    /// Additional context information
    context: Vec<(String, String)>,

    /// Suggestions for recovery
    pub suggestions: Vec<String>,

    /// Source error if any
    source: Option<Box<dyn StdError + Send + Sync>>,
}

/// Error kinds that map to exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    General,
    Usage,
    Network,
    NoLandmark,
}

/// Semantic exit codes for the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    Usage = 2,
    NetworkError = 3,
    NoLandmark = 4,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Extension trait for adding context to errors
pub trait ErrorContext {
    fn with_context(self, key: &str, value: &str) -> Self;
    fn with_suggestion(self, suggestion: &str) -> Self;
    fn with_source(self, source: Box<dyn StdError + Send + Sync>) -> Self;
}

impl CliError {
    fn new(kind: ErrorKind, message: &str) -> Self {
        Self {
            message: message.to_string(),
            kind,
            context: Vec::new(),
            suggestions: Vec::new(),
            source: None,
        }
    }

    pub fn general(message: &str) -> Self {
        Self::new(ErrorKind::General, message)
    }

    /// Bad arguments, invalid input or configuration
    pub fn usage(message: &str) -> Self {
        let mut error = Self::new(ErrorKind::Usage, message);
        error
            .suggestions
            .push("Run 'landmark --help' for usage information".to_string());
        error
    }

    pub fn network(message: &str) -> Self {
        let mut error = Self::new(ErrorKind::Network, message);
        error.suggestions = vec![
            "Check your internet connection".to_string(),
            "Try again later".to_string(),
        ];
        error
    }

    /// A missing or unreadable local file
    pub fn from_io_error(error: io::Error, path: &str) -> Self {
        let message = format!("Cannot read '{path}': {error}");
        let mut cli_error = match error.kind() {
            io::ErrorKind::NotFound => {
                Self::usage(&message).with_suggestion("Check that the path exists")
            }
            io::ErrorKind::PermissionDenied => {
                Self::general(&message).with_suggestion("Check file permissions")
            }
            io::ErrorKind::TimedOut => Self::network(&message),
            _ => Self::general(&message),
        };
        cli_error.source = Some(Box::new(error));
        cli_error.with_context("path", path)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &[(String, String)] {
        &self.context
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self.kind {
            ErrorKind::General => ExitCode::GeneralError,
            ErrorKind::Usage => ExitCode::Usage,
            ErrorKind::Network => ExitCode::NetworkError,
            ErrorKind::NoLandmark => ExitCode::NoLandmark,
        }
    }

    fn label(&self) -> &'static str {
        match self.kind {
            ErrorKind::General => "Error",
            ErrorKind::Usage => "Usage Error",
            ErrorKind::Network => "Network Error",
            ErrorKind::NoLandmark => "No Landmark",
        }
    }

    /// Format the error for user display
    pub fn format_for_user(&self, debug: bool) -> String {
        let mut output = String::new();

        let prefix = match self.kind {
            ErrorKind::Usage | ErrorKind::NoLandmark => self.label().yellow(),
            ErrorKind::General | ErrorKind::Network => self.label().red(),
        };
        output.push_str(&format!("{}: {}\n", prefix, self.message));

        if !self.context.is_empty() {
            output.push_str("\nContext:\n");
            for (key, value) in &self.context {
                output.push_str(&format!("  {}: {}\n", key.bold(), value));
            }
        }

        if debug && let Some(source) = &self.source {
            output.push_str("\nCaused by:\n");
            let mut current: Option<&dyn StdError> = Some(source.as_ref());
            let mut level = 1;
            while let Some(err) = current {
                output.push_str(&format!("  {level}: {err}\n"));
                current = err.source();
                level += 1;
            }
        }

        if !self.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in &self.suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        output
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label(), self.message)?;
        for (key, value) in &self.context {
            write!(f, " ({key}: {value})")?;
        }
        Ok(())
    }
}

impl StdError for CliError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl ErrorContext for CliError {
    fn with_context(mut self, key: &str, value: &str) -> Self {
        self.context.push((key.to_string(), value.to_string()));
        self
    }

    fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.suggestions.push(suggestion.to_string());
        self
    }

    fn with_source(mut self, source: Box<dyn StdError + Send + Sync>) -> Self {
        self.source = Some(source);
        self
    }
}

/// The classifier category decides the exit code
impl From<&ErrorDetails> for CliError {
    fn from(details: &ErrorDetails) -> Self {
        let kind = match details.category {
            ErrorCategory::Network | ErrorCategory::Api => ErrorKind::Network,
            ErrorCategory::Validation => ErrorKind::Usage,
            ErrorCategory::User => ErrorKind::NoLandmark,
            ErrorCategory::Permission | ErrorCategory::System => ErrorKind::General,
        };
        let mut error = Self::new(kind, &details.user_message);
        error.context.push(("code".to_string(), details.code.clone()));
        error
            .context
            .extend(details.context.iter().map(|(k, v)| (k.clone(), v.clone())));
        error.suggestions = details.visible_suggestions().to_vec();
        if details.message != details.user_message {
            error.source = Some(details.message.clone().into());
        }
        error
    }
}

impl From<ErrorDetails> for CliError {
    fn from(details: ErrorDetails) -> Self {
        Self::from(&details)
    }
}

impl From<anyhow::Error> for CliError {
    fn from(error: anyhow::Error) -> Self {
        Self::general(&format!("{error:#}"))
    }
}
