//! Scripted landmark detector

use super::ScriptedFailure;
use async_trait::async_trait;
use landmark_core::error::ServiceKind;
use landmark_core::{DetectedLandmark, ImagePayload, LandmarkDetector, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted answer
#[derive(Debug, Clone)]
pub enum MockDetection {
    Landmarks(Vec<DetectedLandmark>),
    Fail(ScriptedFailure),
}

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<MockDetection>,
    /// Answer once the queue is exhausted
    fallback: Option<MockDetection>,
    payloads: Vec<ImagePayload>,
}

/// Mock [`LandmarkDetector`] answering from a script
///
/// Each call pops the next scripted answer; once the script runs out the
/// last answer repeats (or an empty candidate list if nothing was scripted).
///
/// ```rust,no_run
/// use landmark_test_utils::{LandmarkBuilder, MockDetector, ScriptedFailure};
///
/// let detector = MockDetector::new()
///     .then_fail(ScriptedFailure::Network)
///     .then_detect(vec![LandmarkBuilder::new("Taj Mahal").confidence(92.0).build()]);
/// assert_eq!(detector.calls(), 0);
/// ```
#[derive(Clone, Default)]
pub struct MockDetector {
    script: Arc<Mutex<Script>>,
    calls: Arc<AtomicUsize>,
    delay: Duration,
    not_ready: bool,
}

impl MockDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful answer
    pub fn then_detect(self, landmarks: Vec<DetectedLandmark>) -> Self {
        self.push(MockDetection::Landmarks(landmarks))
    }

    /// Queue an answer with no candidates
    pub fn then_nothing(self) -> Self {
        self.push(MockDetection::Landmarks(Vec::new()))
    }

    /// Queue a failure
    pub fn then_fail(self, failure: ScriptedFailure) -> Self {
        self.push(MockDetection::Fail(failure))
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Report `is_ready() == false`
    pub fn not_ready(mut self) -> Self {
        self.not_ready = true;
        self
    }

    /// Number of `detect` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Payloads received, in call order
    pub fn payloads(&self) -> Vec<ImagePayload> {
        self.script.lock().unwrap().payloads.clone()
    }

    fn push(self, detection: MockDetection) -> Self {
        {
            let mut script = self.script.lock().unwrap();
            script.fallback = Some(detection.clone());
            script.queue.push_back(detection);
        }
        self
    }

    fn next(&self, payload: &ImagePayload) -> MockDetection {
        let mut script = self.script.lock().unwrap();
        script.payloads.push(payload.clone());
        script
            .queue
            .pop_front()
            .or_else(|| script.fallback.clone())
            .unwrap_or(MockDetection::Landmarks(Vec::new()))
    }
}

#[async_trait]
impl LandmarkDetector for MockDetector {
    async fn detect(&self, image: &ImagePayload, max_results: usize) -> Result<Vec<DetectedLandmark>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.next(image);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match answer {
            MockDetection::Landmarks(mut landmarks) => {
                landmarks.truncate(max_results);
                Ok(landmarks)
            }
            MockDetection::Fail(failure) => Err(failure.to_error(ServiceKind::Vision)),
        }
    }

    fn is_ready(&self) -> bool {
        !self.not_ready
    }
}
