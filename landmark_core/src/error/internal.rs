//! Internal library error types

use thiserror::Error;

/// Internal library errors
#[derive(Error, Debug)]
pub enum InternalError {
    /// Decoding, resizing or encoding an image failed
    #[error("Image processing failed: {message}")]
    ImageProcessing { message: String },

    /// A background task panicked or was cancelled
    #[error("Background task '{task}' failed: {message}")]
    TaskJoin { task: String, message: String },

    /// Serialization of cached data failed
    #[error("Serialization failed: {message}")]
    Serialization { message: String },

    /// The request queue worker is gone
    #[error("Request queue closed")]
    QueueClosed,

    /// Internal assertion failure
    #[error("Internal assertion failed: {message}")]
    Assertion { message: String },
}

impl InternalError {
    /// Create an image processing error
    pub fn image_processing(message: impl Into<String>) -> Self {
        Self::ImageProcessing {
            message: message.into(),
        }
    }

    /// Create a task join error
    pub fn task_join(task: &str, message: impl Into<String>) -> Self {
        Self::TaskJoin {
            task: task.to_string(),
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an internal assertion failure error
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::TaskJoin { .. } | Self::QueueClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_processing_error() {
        let error = InternalError::image_processing("unsupported color type");
        assert!(error.to_string().contains("Image processing failed"));
        assert!(error.to_string().contains("unsupported color type"));
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_task_join_error() {
        let error = InternalError::task_join("optimize", "panicked");
        assert!(error.to_string().contains("optimize"));
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_queue_closed_error() {
        assert!(InternalError::QueueClosed.is_recoverable());
        assert!(InternalError::QueueClosed.to_string().contains("queue"));
    }

    #[test]
    fn test_assertion_error() {
        let error = InternalError::assertion("Invariant violated");
        assert!(error.to_string().contains("Internal assertion failed"));
        assert!(!error.is_recoverable());
    }
}
