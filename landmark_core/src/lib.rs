//! Landmark Recognition Core Library
//!
//! This is the core library for landmark recognition, providing image
//! optimization, landmark detection, encyclopedic enrichment, caching and
//! error classification behind a single [`RecognitionService`].

pub mod batching;
pub mod cache;
pub mod classifier;
pub mod enrichment;
pub mod error;
pub mod geolocation;
pub mod identification;
pub mod landmark;
pub mod metrics;
pub mod optimizer;
pub mod progress;
pub mod vision;

// Re-export main types
pub use batching::{QueueConfig, QueuedRequest, RequestPriority, RequestQueue};
pub use cache::{CacheConfig, CacheSetOptions, CacheStats, CacheStore, FileSlot, MemorySlot};
pub use classifier::{
    ApiErrorKind, ErrorCategory, ErrorClassifier, ErrorContext, ErrorDetails, ErrorLog, Severity,
};
pub use enrichment::{EnrichmentConfig, LocationEnricher, WikipediaClient};
pub use error::{Error, Result};
pub use geolocation::{FixedPosition, NoPosition, PositionProvider};
pub use identification::{
    ImageSource, RecognitionOptions, RecognitionResult, RecognitionService, ServiceReadiness,
};
pub use landmark::{Coordinates, DetectedLandmark, EnrichedLocationData, NearbyPlace, Provenance};
pub use metrics::{MetricsSnapshot, PerformanceSnapshot};
pub use optimizer::{ExecutionStrategy, ImageOptimizer, OptimizerConfig};
pub use progress::{
    ChannelProvider, NullProvider, ProgressProvider, ProgressUpdate, SharedProvider, Stage,
};
pub use vision::{ImagePayload, LandmarkDetector, VisionClient, VisionConfig};

use std::path::PathBuf;
use std::time::Duration;

/// Core client configuration
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub vision: VisionConfig,
    pub enrichment: EnrichmentConfig,
    pub cache: CacheConfig,
    pub optimizer: OptimizerConfig,
    /// Directory for the persisted cache; in-memory only when `None`
    pub cache_dir: Option<PathBuf>,
    /// Fixed position used by the proximity fallback
    pub position: Option<Coordinates>,
}

impl ClientConfig {
    /// Create a test configuration
    pub fn test() -> Self {
        Self {
            vision: VisionConfig {
                api_key: Some("test-key".to_string()),
                request_timeout: Duration::from_secs(2),
                ..VisionConfig::default()
            },
            enrichment: EnrichmentConfig {
                request_timeout: Duration::from_secs(2),
                ..EnrichmentConfig::default()
            },
            cache: CacheConfig {
                max_entries: 16,
                max_memory_bytes: 1024 * 1024,
                ..CacheConfig::default()
            },
            optimizer: OptimizerConfig {
                max_dimension: 256,
                strategy: ExecutionStrategy::Inline,
                ..OptimizerConfig::default()
            },
            cache_dir: None,
            position: None,
        }
    }
}
