//! Recognition service
//!
//! Coordinates cache lookups, image preparation, detection with retries,
//! enrichment and the proximity fallback for a single image:
//!
//! ```text
//! Start -> CacheCheck -> CacheHit -> Done
//!                     -> Recognizing -> Confident -> Enriching -> Done
//!                                    -> LowConfidence | Failed -> FallingBack -> Done | Error
//! ```

use super::cache_key::cache_key;
use super::types::{ImageSource, RecognitionOptions, RecognitionResult, ServiceReadiness};
use crate::ClientConfig;
use crate::cache::{CacheConfig, CacheSetOptions, CacheStats, CacheStore, FileSlot};
use crate::classifier::{ErrorCategory, ErrorClassifier, ErrorContext, ErrorDetails, LogSink};
use crate::enrichment::{LocationEnricher, WikipediaClient};
use crate::error::{Error, IoError, Result, ServiceError, ValidationError};
use crate::geolocation::{DEFAULT_POSITION_TIMEOUT, FixedPosition, NoPosition, PositionProvider, position_within};
use crate::landmark::{DetectedLandmark, EnrichedLocationData, Provenance};
use crate::metrics::{MetricsSnapshot, PerformanceMonitor, PerformanceSnapshot, RecognitionMetrics};
use crate::optimizer::ImageOptimizer;
use crate::progress::{NullProvider, ProgressProvider, ProgressUpdate, Stage};
use crate::vision::{ImagePayload, LandmarkDetector, VisionClient};
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Confidence assigned to a landmark found by the proximity fallback
pub const FALLBACK_CONFIDENCE: f64 = 60.0;

/// Search radius for the proximity fallback
pub const FALLBACK_RADIUS_M: u32 = 10_000;

/// Places requested by the proximity fallback
pub const FALLBACK_PLACE_LIMIT: usize = 5;

const HOUR: Duration = Duration::from_secs(3600);

/// Cache priority and lifetime for a result of the given confidence
pub fn cache_tier(confidence: f64) -> CacheSetOptions {
    if confidence >= 90.0 {
        CacheSetOptions::new(7 * 24 * HOUR, 3)
    } else if confidence >= 70.0 {
        CacheSetOptions::new(24 * HOUR, 2)
    } else {
        CacheSetOptions::new(HOUR, 1)
    }
}

/// Builder for [`RecognitionService`]
pub struct RecognitionServiceBuilder {
    detector: Arc<dyn LandmarkDetector>,
    enricher: Arc<dyn LocationEnricher>,
    position: Arc<dyn PositionProvider>,
    optimizer: ImageOptimizer,
    cache: Option<CacheStore<RecognitionResult>>,
    classifier: ErrorClassifier,
    position_timeout: Duration,
}

impl RecognitionServiceBuilder {
    pub fn position_provider(mut self, provider: Arc<dyn PositionProvider>) -> Self {
        self.position = provider;
        self
    }

    pub fn optimizer(mut self, optimizer: ImageOptimizer) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn cache(mut self, cache: CacheStore<RecognitionResult>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn position_timeout(mut self, timeout: Duration) -> Self {
        self.position_timeout = timeout;
        self
    }

    pub fn build(self) -> RecognitionService {
        RecognitionService {
            detector: self.detector,
            enricher: self.enricher,
            position: self.position,
            optimizer: self.optimizer,
            cache: self
                .cache
                .unwrap_or_else(|| CacheStore::new(CacheConfig::default())),
            classifier: self.classifier,
            position_timeout: self.position_timeout,
            metrics: RecognitionMetrics::new(),
            monitor: PerformanceMonitor::default(),
        }
    }
}

/// What the attempt loop ended with
enum Detection {
    Confident(DetectedLandmark),
    Unusable(Option<ErrorDetails>),
}

/// Landmark recognition pipeline
pub struct RecognitionService {
    detector: Arc<dyn LandmarkDetector>,
    enricher: Arc<dyn LocationEnricher>,
    position: Arc<dyn PositionProvider>,
    optimizer: ImageOptimizer,
    cache: CacheStore<RecognitionResult>,
    classifier: ErrorClassifier,
    position_timeout: Duration,
    metrics: RecognitionMetrics,
    monitor: PerformanceMonitor,
}

impl RecognitionService {
    pub fn builder(
        detector: Arc<dyn LandmarkDetector>,
        enricher: Arc<dyn LocationEnricher>,
    ) -> RecognitionServiceBuilder {
        RecognitionServiceBuilder {
            detector,
            enricher,
            position: Arc::new(NoPosition),
            optimizer: ImageOptimizer::default(),
            cache: None,
            classifier: ErrorClassifier::new(),
            position_timeout: DEFAULT_POSITION_TIMEOUT,
        }
    }

    /// Wire up the HTTP clients, the optimizer and the (optionally persisted) cache
    pub async fn from_config(config: ClientConfig) -> Result<Self> {
        let detector = Arc::new(VisionClient::new(config.vision)?);
        let enricher = Arc::new(WikipediaClient::new(config.enrichment)?);

        let cache = match &config.cache_dir {
            Some(dir) => {
                debug!("Persisting recognition cache under {}", dir.display());
                CacheStore::with_slot(config.cache, Arc::new(FileSlot::new(dir))).await
            }
            None => CacheStore::new(config.cache),
        };

        let position: Arc<dyn PositionProvider> = match config.position {
            Some(coordinates) => Arc::new(FixedPosition(coordinates)),
            None => Arc::new(NoPosition),
        };

        Ok(Self::builder(detector, enricher)
            .position_provider(position)
            .optimizer(ImageOptimizer::new(config.optimizer))
            .cache(cache)
            .classifier(ErrorClassifier::with_sink(Arc::new(LogSink)))
            .build())
    }

    /// Recognize the landmark in `source`
    pub async fn recognize_landmark(
        &self,
        source: ImageSource,
        options: RecognitionOptions,
    ) -> RecognitionResult {
        self.recognize_landmark_with_progress(source, options, &NullProvider)
            .await
    }

    /// Recognize the landmark in `source`, reporting each transition
    pub async fn recognize_landmark_with_progress(
        &self,
        source: ImageSource,
        options: RecognitionOptions,
        progress: &dyn ProgressProvider,
    ) -> RecognitionResult {
        let started = Instant::now();
        let label = source.label();

        let result = match tokio::time::timeout(options.timeout, self.run(&source, &options, progress)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Recognition of {label} timed out after {:?}", options.timeout);
                let error = Error::from(ServiceError::timeout("landmark recognition", options.timeout));
                RecognitionResult::failed(self.classifier.classify_error(&error, context_for(&label)))
            }
        };
        let result = result.with_processing_time(started.elapsed());

        self.metrics.record(
            result.success,
            result.cache_used,
            result.fallback_used,
            result.processing_time,
        );
        progress.report(ProgressUpdate::stage(Stage::Done, outcome_message(&result)));
        debug!(
            "Recognition of {label} finished in {:?}: {}",
            result.processing_time,
            outcome_message(&result)
        );
        result
    }

    async fn run(
        &self,
        source: &ImageSource,
        options: &RecognitionOptions,
        progress: &dyn ProgressProvider,
    ) -> RecognitionResult {
        let label = source.label();

        let key = if options.enable_cache {
            progress.report(ProgressUpdate::stage(Stage::CacheCheck, "Checking cache"));
            match cache_key(source).await {
                Ok(key) => Some(key),
                Err(e) => {
                    debug!("No cache key for {label}: {e}");
                    None
                }
            }
        } else {
            None
        };

        if let Some(key) = &key {
            if let Some(mut cached) = self.cache.get(key).await {
                debug!("Cache hit for {label}");
                self.monitor.record_cache_hit();
                cached.cache_used = true;
                return cached;
            }
            self.monitor.record_cache_miss();
        }

        progress.report(ProgressUpdate::stage(Stage::Optimizing, "Preparing image"));
        let payload = match self.prepare(source).await {
            Ok(payload) => payload,
            Err(e) => {
                debug!("Could not prepare {label}: {e}");
                return RecognitionResult::failed(self.classifier.classify_error(&e, context_for(&label)));
            }
        };

        let result = match self.detect_with_retries(&payload, options, &label, progress).await {
            Detection::Confident(landmark) => {
                progress.report(ProgressUpdate::stage(
                    Stage::Enriching,
                    format!("Looking up {}", landmark.name),
                ));
                let location = self.enrich(&landmark).await;
                RecognitionResult::recognized(landmark, location, false)
            }
            Detection::Unusable(last_error) => {
                self.fall_back(last_error, options, &label, progress).await
            }
        };

        if result.success
            && let Some(key) = &key
        {
            self.cache
                .set(key, result.clone(), cache_tier(result.confidence))
                .await;
        }
        result
    }

    async fn prepare(&self, source: &ImageSource) -> Result<ImagePayload> {
        let bytes = match source {
            ImageSource::Url(url) => return Ok(ImagePayload::Url(url.clone())),
            ImageSource::File(path) => read_image(path).await?,
            ImageSource::Bytes { data, .. } => {
                if data.is_empty() {
                    return Err(ValidationError::unsupported_image("image data is empty").into());
                }
                data.clone()
            }
        };

        let started = Instant::now();
        let optimized = self.optimizer.optimize(bytes).await;
        self.monitor.record_image_processing(started.elapsed());
        Ok(ImagePayload::Bytes(optimized.bytes))
    }

    async fn detect_with_retries(
        &self,
        payload: &ImagePayload,
        options: &RecognitionOptions,
        label: &str,
        progress: &dyn ProgressProvider,
    ) -> Detection {
        let max_attempts = options.max_attempts();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let delay = options.retry_base_delay * (attempt - 1);
                debug!("Waiting {delay:?} before attempt {attempt} for {label}");
                tokio::time::sleep(delay).await;
            }
            progress.report(ProgressUpdate::Attempt {
                attempt,
                max_attempts,
            });
            progress.report(ProgressUpdate::stage(Stage::Recognizing, "Detecting landmarks"));

            let started = Instant::now();
            let outcome = self.detector.detect(payload, options.max_results).await;
            self.monitor.record_api_call(started.elapsed());

            match outcome {
                Ok(candidates) => {
                    let top = candidates
                        .into_iter()
                        .max_by(|a, b| a.confidence().total_cmp(&b.confidence()));
                    match top {
                        Some(top) if top.confidence() >= options.confidence_threshold => {
                            debug!(
                                "Attempt {attempt}: {} at {:.1}% for {label}",
                                top.name,
                                top.confidence()
                            );
                            return Detection::Confident(top);
                        }
                        Some(top) => debug!(
                            "Attempt {attempt}: {} at {:.1}% is below {:.1}%",
                            top.name,
                            top.confidence(),
                            options.confidence_threshold
                        ),
                        None => debug!("Attempt {attempt}: no landmark candidates for {label}"),
                    }
                }
                Err(e) => {
                    let mut context = context_for(label);
                    context.insert("attempt".to_string(), attempt.to_string());
                    let details = self.classifier.classify_error(&e, context);
                    let permanent = e.is_permanent()
                        || !details.recoverable
                        || details.category == ErrorCategory::Validation;
                    warn!("Attempt {attempt}/{max_attempts} for {label} failed: {e}");
                    last_error = Some(details);
                    if permanent {
                        debug!("Not retrying {label} after a permanent failure");
                        break;
                    }
                }
            }
        }

        Detection::Unusable(last_error)
    }

    async fn enrich(&self, landmark: &DetectedLandmark) -> Option<EnrichedLocationData> {
        let started = Instant::now();
        let outcome = self.enricher.resolve(&landmark.name, landmark.coordinates).await;
        self.monitor.record_network_latency(started.elapsed());

        match outcome {
            Ok(location) => location,
            Err(e) => {
                warn!("Enrichment of '{}' failed, continuing without it: {e}", landmark.name);
                None
            }
        }
    }

    async fn fall_back(
        &self,
        last_error: Option<ErrorDetails>,
        options: &RecognitionOptions,
        label: &str,
        progress: &dyn ProgressProvider,
    ) -> RecognitionResult {
        let failure = |last_error: Option<ErrorDetails>| {
            RecognitionResult::failed(last_error.unwrap_or_else(|| {
                self.classifier.no_landmark(
                    format!("No landmark detected with at least {:.0}% confidence", options.confidence_threshold),
                    context_for(label),
                )
            }))
        };

        if !options.enable_fallback {
            return failure(last_error);
        }

        progress.report(ProgressUpdate::stage(Stage::FallingBack, "Searching near your position"));
        let Some(position) = position_within(self.position.as_ref(), self.position_timeout).await else {
            debug!("No position available for the fallback of {label}");
            return failure(last_error);
        };

        let places = match self
            .enricher
            .nearby(position, FALLBACK_RADIUS_M, FALLBACK_PLACE_LIMIT)
            .await
        {
            Ok(places) => places,
            Err(e) => {
                warn!("Proximity search for {label} failed: {e}");
                return failure(last_error);
            }
        };
        let Some(closest) = places
            .into_iter()
            .min_by(|a, b| a.distance_m.total_cmp(&b.distance_m))
        else {
            debug!("Nothing within {FALLBACK_RADIUS_M}m of the caller");
            return failure(last_error);
        };

        info!("Falling back to nearby place '{}' for {label}", closest.title);
        let landmark = DetectedLandmark::new(
            closest.title,
            FALLBACK_CONFIDENCE,
            Some(closest.coordinates),
            Provenance::GeoFallback,
        );
        progress.report(ProgressUpdate::stage(
            Stage::Enriching,
            format!("Looking up {}", landmark.name),
        ));
        let location = self.enrich(&landmark).await;
        RecognitionResult::recognized(landmark, location, true)
    }

    /// Readiness of the detector and enricher, without network calls
    pub fn validate_services(&self) -> ServiceReadiness {
        ServiceReadiness {
            vision_ready: self.detector.is_ready(),
            enrichment_ready: self.enricher.is_ready(),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn performance(&self) -> PerformanceSnapshot {
        self.monitor.snapshot()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }
}

async fn read_image(path: &Path) -> Result<Vec<u8>> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => IoError::file_not_found(path),
        std::io::ErrorKind::PermissionDenied => IoError::permission_denied(path, e),
        _ => IoError::from_std(e).with_path(path),
    })?;
    if bytes.is_empty() {
        return Err(IoError::empty_file(path).into());
    }
    Ok(bytes)
}

fn context_for(label: &str) -> ErrorContext {
    ErrorContext::from([("source".to_string(), label.to_string())])
}

fn outcome_message(result: &RecognitionResult) -> String {
    match (&result.landmark, &result.error) {
        (Some(landmark), _) if result.cache_used => format!("{} (cached)", landmark.name),
        (Some(landmark), _) if result.fallback_used => format!("{} (nearby)", landmark.name),
        (Some(landmark), _) => format!("{} ({:.0}%)", landmark.name, result.confidence),
        (None, Some(error)) => error.to_string(),
        (None, None) => "no landmark".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_tiers() {
        let high = cache_tier(95.0);
        assert_eq!(high.priority, Some(3));
        assert_eq!(high.ttl, Some(7 * 24 * HOUR));

        let medium = cache_tier(70.0);
        assert_eq!(medium.priority, Some(2));
        assert_eq!(medium.ttl, Some(24 * HOUR));

        let low = cache_tier(60.0);
        assert_eq!(low.priority, Some(1));
        assert_eq!(low.ttl, Some(HOUR));
    }

    #[tokio::test]
    async fn test_read_missing_image() {
        let err = read_image(Path::new("/no/such/photo.jpg")).await.unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[tokio::test]
    async fn test_read_empty_image() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = read_image(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_outcome_message() {
        let landmark = DetectedLandmark::new("Qutub Minar", 88.0, None, Provenance::Primary);
        let mut result = RecognitionResult::recognized(landmark, None, false);
        assert_eq!(outcome_message(&result), "Qutub Minar (88%)");
        result.cache_used = true;
        assert_eq!(outcome_message(&result), "Qutub Minar (cached)");
    }
}
