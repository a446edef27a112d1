//! End-to-end tests of the recognition pipeline against scripted collaborators

use landmark_core::identification::cache_key;
use landmark_core::progress::Stage;
use landmark_core::{
    CacheConfig, CacheStore, ChannelProvider, ErrorCategory, ExecutionStrategy, ImagePayload,
    ImageOptimizer, ImageSource, OptimizerConfig, ProgressUpdate, Provenance, RecognitionOptions,
    RecognitionResult, RecognitionService,
};
use landmark_test_utils::{
    LandmarkBuilder, LocationBuilder, MockDetector, MockEnricher, MockPositionProvider,
    ScriptedFailure, TestImageBuilder, nearby_place, png_bytes,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn inline_optimizer() -> ImageOptimizer {
    ImageOptimizer::new(OptimizerConfig {
        strategy: ExecutionStrategy::Inline,
        ..OptimizerConfig::default()
    })
}

fn service(detector: &MockDetector, enricher: &MockEnricher) -> RecognitionService {
    RecognitionService::builder(Arc::new(detector.clone()), Arc::new(enricher.clone()))
        .optimizer(inline_optimizer())
        .build()
}

fn photo(name: &str) -> ImageSource {
    ImageSource::Bytes {
        name: name.to_string(),
        data: png_bytes(32, 32),
        modified: None,
    }
}

fn taj_mahal() -> MockEnricher {
    MockEnricher::new().with_location(
        LocationBuilder::new("Taj Mahal")
            .at(27.1751, 78.0421)
            .nearby(&["Agra Fort", "Mehtab Bagh"])
            .build(),
    )
}

#[tokio::test]
async fn test_confident_detection_is_enriched_and_cached() {
    let detector = MockDetector::new().then_detect(vec![
        LandmarkBuilder::new("Taj Mahal").confidence(95.0).at(27.1751, 78.0421).build(),
    ]);
    let enricher = taj_mahal();
    let cache: CacheStore<RecognitionResult> = CacheStore::new(CacheConfig::default());
    let service = RecognitionService::builder(Arc::new(detector.clone()), Arc::new(enricher.clone()))
        .optimizer(inline_optimizer())
        .cache(cache.clone())
        .build();

    let source = photo("taj.png");
    let result = service
        .recognize_landmark(source.clone(), RecognitionOptions::default())
        .await;

    assert!(result.success);
    assert!(!result.fallback_used);
    assert!(!result.cache_used);
    assert_eq!(result.confidence, 95.0);
    assert_eq!(result.landmark_name(), Some("Taj Mahal"));
    let location = result.location.as_ref().expect("enrichment attached");
    assert_eq!(location.nearby_places, vec!["Agra Fort", "Mehtab Bagh"]);

    let key = cache_key(&source).await.unwrap();
    assert!(cache.has(&key).await);
}

#[tokio::test]
async fn test_cache_hit_skips_detector() {
    let detector = MockDetector::new()
        .then_detect(vec![LandmarkBuilder::new("Taj Mahal").confidence(91.0).build()]);
    let service = service(&detector, &taj_mahal());

    let first = service
        .recognize_landmark(photo("taj.png"), RecognitionOptions::default())
        .await;
    let second = service
        .recognize_landmark(photo("taj.png"), RecognitionOptions::default())
        .await;

    assert!(first.success && !first.cache_used);
    assert!(second.success && second.cache_used);
    assert_eq!(second.landmark, first.landmark);
    assert_eq!(detector.calls(), 1);
    assert_eq!(service.metrics().cache_hits, 1);
}

#[tokio::test]
async fn test_cache_disabled_always_detects() {
    let detector = MockDetector::new()
        .then_detect(vec![LandmarkBuilder::new("Taj Mahal").confidence(91.0).build()]);
    let service = service(&detector, &taj_mahal());
    let options = RecognitionOptions {
        enable_cache: false,
        ..RecognitionOptions::default()
    };

    service.recognize_landmark(photo("taj.png"), options.clone()).await;
    let second = service.recognize_landmark(photo("taj.png"), options).await;

    assert!(!second.cache_used);
    assert_eq!(detector.calls(), 2);
    assert_eq!(service.cache_stats().await.entry_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_network_failure_on_every_attempt() {
    let detector = MockDetector::new().then_fail(ScriptedFailure::Network);
    let service = service(&detector, &MockEnricher::new());
    let options = RecognitionOptions {
        enable_fallback: false,
        ..RecognitionOptions::default()
    };

    let result = service.recognize_landmark(photo("street.png"), options).await;

    assert!(!result.success);
    assert!(result.landmark.is_none());
    assert_eq!(detector.calls(), 3);
    let error = result.error.expect("classified error");
    assert_eq!(error.category, ErrorCategory::Network);
    assert_eq!(error.code, "NETWORK_ERROR");
    assert!(error.recoverable);
    assert_eq!(error.context.get("attempt").map(String::as_str), Some("3"));
}

#[tokio::test(start_paused = true)]
async fn test_retry_delay_grows_with_attempt() {
    let detector = MockDetector::new().then_fail(ScriptedFailure::Network);
    let service = service(&detector, &MockEnricher::new());
    let options = RecognitionOptions {
        max_retries: 3,
        enable_fallback: false,
        timeout: Duration::from_secs(60),
        ..RecognitionOptions::default()
    };

    let started = Instant::now();
    service.recognize_landmark(photo("street.png"), options).await;
    let elapsed = started.elapsed();

    // 1s + 2s + 3s between four attempts
    assert_eq!(detector.calls(), 4);
    assert!(elapsed >= Duration::from_secs(6));
    assert!(elapsed < Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_then_success() {
    let detector = MockDetector::new()
        .then_fail(ScriptedFailure::HttpStatus(503))
        .then_detect(vec![LandmarkBuilder::new("Taj Mahal").confidence(88.0).build()]);
    let service = service(&detector, &taj_mahal());

    let result = service
        .recognize_landmark(photo("taj.png"), RecognitionOptions::default())
        .await;

    assert!(result.success);
    assert_eq!(detector.calls(), 2);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_missing_credential_stops_retrying() {
    let detector = MockDetector::new().then_fail(ScriptedFailure::MissingCredential);
    let service = service(&detector, &MockEnricher::new());

    let result = service
        .recognize_landmark(photo("taj.png"), RecognitionOptions::default())
        .await;

    assert!(!result.success);
    assert_eq!(detector.calls(), 1);
    let error = result.error.unwrap();
    assert_eq!(error.code, "CREDENTIAL_MISSING");
    assert!(!error.recoverable);
}

#[tokio::test]
async fn test_validation_failure_stops_retrying() {
    let detector = MockDetector::new().then_fail(ScriptedFailure::InvalidParameter("image".into()));
    let service = service(&detector, &MockEnricher::new());

    let result = service
        .recognize_landmark(photo("taj.png"), RecognitionOptions::default())
        .await;

    assert_eq!(detector.calls(), 1);
    assert_eq!(result.error.unwrap().category, ErrorCategory::Validation);
}

#[tokio::test(start_paused = true)]
async fn test_low_confidence_falls_back_to_nearest_place() {
    let detector = MockDetector::new()
        .then_detect(vec![LandmarkBuilder::new("Some Arch").confidence(40.0).build()]);
    let enricher = MockEnricher::new()
        .with_nearby(vec![
            nearby_place("Mehtab Bagh", 27.18, 78.04, 900.0),
            nearby_place("Taj Mahal", 27.1751, 78.0421, 120.0),
        ])
        .with_location(LocationBuilder::new("Taj Mahal").build());
    let position = MockPositionProvider::at(27.174, 78.042);
    let service = RecognitionService::builder(Arc::new(detector.clone()), Arc::new(enricher.clone()))
        .optimizer(inline_optimizer())
        .position_provider(Arc::new(position.clone()))
        .build();

    let result = service
        .recognize_landmark(photo("arch.png"), RecognitionOptions::default())
        .await;

    assert!(result.success);
    assert!(result.fallback_used);
    assert_eq!(result.confidence, 60.0);
    let landmark = result.landmark.as_ref().unwrap();
    assert_eq!(landmark.name, "Taj Mahal");
    assert_eq!(landmark.provenance, Provenance::GeoFallback);
    assert!(result.location.is_some());
    assert_eq!(detector.calls(), 3);
    assert_eq!(position.calls(), 1);
    assert_eq!(service.metrics().fallbacks, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cached_fallback_result_counts_one_fallback() {
    let detector = MockDetector::new()
        .then_detect(vec![LandmarkBuilder::new("Some Arch").confidence(40.0).build()]);
    let enricher = MockEnricher::new()
        .with_nearby(vec![nearby_place("Taj Mahal", 27.1751, 78.0421, 120.0)])
        .with_location(LocationBuilder::new("Taj Mahal").build());
    let service = RecognitionService::builder(Arc::new(detector.clone()), Arc::new(enricher.clone()))
        .optimizer(inline_optimizer())
        .position_provider(Arc::new(MockPositionProvider::at(27.174, 78.042)))
        .build();

    let first = service
        .recognize_landmark(photo("arch.png"), RecognitionOptions::default())
        .await;
    let second = service
        .recognize_landmark(photo("arch.png"), RecognitionOptions::default())
        .await;

    assert!(first.fallback_used && !first.cache_used);
    assert!(second.fallback_used && second.cache_used);
    let metrics = service.metrics();
    assert_eq!(metrics.fallbacks, 1);
    assert_eq!(metrics.cache_hits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_low_confidence_without_fallback_fails_as_no_landmark() {
    let detector = MockDetector::new()
        .then_detect(vec![LandmarkBuilder::new("Some Arch").confidence(40.0).build()]);
    let service = service(&detector, &MockEnricher::new());
    let options = RecognitionOptions {
        enable_fallback: false,
        ..RecognitionOptions::default()
    };

    let result = service.recognize_landmark(photo("arch.png"), options).await;

    assert!(!result.success);
    assert!(result.landmark.is_none());
    let error = result.error.unwrap();
    assert_eq!(error.category, ErrorCategory::User);
    assert_eq!(error.code, "NO_LANDMARK_DETECTED");
}

#[tokio::test(start_paused = true)]
async fn test_fallback_without_position_reports_last_failure() {
    let detector = MockDetector::new().then_fail(ScriptedFailure::RateLimited);
    let enricher = MockEnricher::new().with_nearby(vec![nearby_place("Agra Fort", 27.18, 78.02, 50.0)]);
    let service = RecognitionService::builder(Arc::new(detector.clone()), Arc::new(enricher.clone()))
        .optimizer(inline_optimizer())
        .position_provider(Arc::new(MockPositionProvider::unavailable()))
        .build();
    let options = RecognitionOptions {
        max_retries: 0,
        ..RecognitionOptions::default()
    };

    let result = service.recognize_landmark(photo("blur.png"), options).await;

    assert!(!result.success);
    assert_eq!(enricher.nearby_calls(), 0);
    let error = result.error.unwrap();
    assert_eq!(error.code, "RATE_LIMITED");
    assert_eq!(error.retry_after(), Some(Duration::from_secs(60)));
}

#[tokio::test(start_paused = true)]
async fn test_fallback_with_no_nearby_places_fails() {
    let detector = MockDetector::new().then_nothing();
    let enricher = MockEnricher::new();
    let service = RecognitionService::builder(Arc::new(detector.clone()), Arc::new(enricher.clone()))
        .optimizer(inline_optimizer())
        .position_provider(Arc::new(MockPositionProvider::at(0.0, 0.0)))
        .build();

    let result = service
        .recognize_landmark(photo("ocean.png"), RecognitionOptions::default())
        .await;

    assert!(!result.success);
    assert_eq!(enricher.nearby_calls(), 1);
    assert_eq!(result.error.unwrap().category, ErrorCategory::User);
}

#[tokio::test(start_paused = true)]
async fn test_failed_proximity_search_reports_no_landmark() {
    let detector = MockDetector::new().then_nothing();
    let enricher = MockEnricher::new().failing_nearby(ScriptedFailure::Network);
    let service = RecognitionService::builder(Arc::new(detector.clone()), Arc::new(enricher.clone()))
        .optimizer(inline_optimizer())
        .position_provider(Arc::new(MockPositionProvider::at(27.17, 78.04)))
        .build();

    let result = service
        .recognize_landmark(photo("fog.png"), RecognitionOptions::default())
        .await;

    assert!(!result.success);
    assert!(!result.fallback_used);
    assert_eq!(enricher.nearby_calls(), 1);
    assert_eq!(result.error.unwrap().code, "NO_LANDMARK_DETECTED");
}

#[tokio::test(start_paused = true)]
async fn test_slow_position_counts_as_absent() {
    let detector = MockDetector::new().then_nothing();
    let enricher = MockEnricher::new().with_nearby(vec![nearby_place("Agra Fort", 27.18, 78.02, 50.0)]);
    let service = RecognitionService::builder(Arc::new(detector.clone()), Arc::new(enricher.clone()))
        .optimizer(inline_optimizer())
        .position_provider(Arc::new(
            MockPositionProvider::at(27.17, 78.04).with_delay(Duration::from_secs(30)),
        ))
        .build();
    let options = RecognitionOptions {
        max_retries: 0,
        timeout: Duration::from_secs(60),
        ..RecognitionOptions::default()
    };

    let result = service.recognize_landmark(photo("dusk.png"), options).await;

    assert!(!result.success);
    assert_eq!(enricher.nearby_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pipeline_timeout() {
    let detector = MockDetector::new()
        .then_detect(vec![LandmarkBuilder::new("Taj Mahal").confidence(99.0).build()])
        .with_delay(Duration::from_secs(10));
    let service = service(&detector, &taj_mahal());
    let options = RecognitionOptions {
        timeout: Duration::from_millis(500),
        ..RecognitionOptions::default()
    };

    let result = service.recognize_landmark(photo("taj.png"), options).await;

    assert!(!result.success);
    let error = result.error.unwrap();
    assert_eq!(error.code, "TIMEOUT");
    assert_eq!(error.category, ErrorCategory::Network);
    assert_eq!(service.metrics().failures, 1);
    assert_eq!(service.cache_stats().await.entry_count, 0);
}

#[tokio::test]
async fn test_enrichment_failure_degrades_to_no_location() {
    let detector = MockDetector::new()
        .then_detect(vec![LandmarkBuilder::new("Taj Mahal").confidence(93.0).build()]);
    let enricher = MockEnricher::new().failing_resolve(ScriptedFailure::HttpStatus(500));
    let service = service(&detector, &enricher);

    let result = service
        .recognize_landmark(photo("taj.png"), RecognitionOptions::default())
        .await;

    assert!(result.success);
    assert!(result.location.is_none());
    assert!(result.error.is_none());
    assert_eq!(enricher.resolve_calls(), 1);
}

#[tokio::test]
async fn test_url_source_is_forwarded_untouched() {
    let detector = MockDetector::new()
        .then_detect(vec![LandmarkBuilder::new("Taj Mahal").confidence(93.0).build()]);
    let service = service(&detector, &taj_mahal());
    let url = "https://images.example/taj.jpg".to_string();

    let result = service
        .recognize_landmark(ImageSource::Url(url.clone()), RecognitionOptions::default())
        .await;

    assert!(result.success);
    assert_eq!(detector.payloads(), vec![ImagePayload::Url(url)]);
}

#[tokio::test]
async fn test_file_sources() {
    let dir = tempfile::tempdir().unwrap();
    let mut images = TestImageBuilder::new(dir.path());
    let good = images.png("taj.png", 64, 48).unwrap();
    let empty = images.empty("empty.jpg").unwrap();

    let detector = MockDetector::new()
        .then_detect(vec![LandmarkBuilder::new("Taj Mahal").confidence(93.0).build()]);
    let service = service(&detector, &taj_mahal());

    let ok = service
        .recognize_landmark(ImageSource::File(good), RecognitionOptions::default())
        .await;
    assert!(ok.success);
    assert!(matches!(&detector.payloads()[0], ImagePayload::Bytes(bytes) if !bytes.is_empty()));

    let missing = service
        .recognize_landmark(
            ImageSource::File(dir.path().join("missing.jpg")),
            RecognitionOptions::default(),
        )
        .await;
    assert_eq!(missing.error.unwrap().category, ErrorCategory::Validation);

    let empty = service
        .recognize_landmark(ImageSource::File(empty), RecognitionOptions::default())
        .await;
    assert!(!empty.success);
    assert_eq!(detector.calls(), 1);
}

#[tokio::test]
async fn test_undecodable_image_is_sent_as_is() {
    let dir = tempfile::tempdir().unwrap();
    let broken = TestImageBuilder::new(dir.path()).corrupted("broken.jpg", 512).unwrap();
    let original = std::fs::read(&broken).unwrap();

    let detector = MockDetector::new()
        .then_detect(vec![LandmarkBuilder::new("Taj Mahal").confidence(93.0).build()]);
    let service = service(&detector, &taj_mahal());

    let result = service
        .recognize_landmark(ImageSource::File(broken), RecognitionOptions::default())
        .await;

    assert!(result.success);
    assert_eq!(detector.payloads(), vec![ImagePayload::Bytes(original)]);
}

#[tokio::test]
async fn test_progress_reports_each_stage() {
    let detector = MockDetector::new()
        .then_detect(vec![LandmarkBuilder::new("Taj Mahal").confidence(95.0).build()]);
    let service = service(&detector, &taj_mahal());
    let (provider, mut rx) = ChannelProvider::channel(64);

    service
        .recognize_landmark_with_progress(photo("taj.png"), RecognitionOptions::default(), &provider)
        .await;
    drop(provider);

    let mut stages = Vec::new();
    let mut attempts = 0;
    while let Some(update) = rx.recv().await {
        match update {
            ProgressUpdate::Stage { stage, .. } => stages.push(stage),
            ProgressUpdate::Attempt { .. } => attempts += 1,
            _ => {}
        }
    }

    assert_eq!(
        stages,
        vec![
            Stage::CacheCheck,
            Stage::Optimizing,
            Stage::Recognizing,
            Stage::Enriching,
            Stage::Done
        ]
    );
    assert_eq!(attempts, 1);
}

#[tokio::test]
async fn test_validate_services_and_clear_cache() {
    let detector = MockDetector::new()
        .not_ready()
        .then_detect(vec![LandmarkBuilder::new("Taj Mahal").confidence(95.0).build()]);
    let service = service(&detector, &taj_mahal());

    let readiness = service.validate_services();
    assert!(!readiness.vision_ready);
    assert!(readiness.enrichment_ready);
    assert!(!readiness.all_ready());

    service
        .recognize_landmark(photo("taj.png"), RecognitionOptions::default())
        .await;
    assert_eq!(service.cache_stats().await.entry_count, 1);
    service.clear_cache().await;
    assert_eq!(service.cache_stats().await.entry_count, 0);

    let metrics = service.metrics();
    assert_eq!(metrics.total, 1);
    assert_eq!(metrics.successes, 1);
}
