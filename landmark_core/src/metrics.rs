//! Recognition metrics
//!
//! Two collectors: [`RecognitionMetrics`] holds the service's rolling
//! counters, [`PerformanceMonitor`] keeps a window of per-stage samples.
//! Neither influences control flow.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Rolling counters for recognition calls
#[derive(Debug, Default)]
pub struct RecognitionMetrics {
    total: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    cache_hits: AtomicU64,
    fallbacks: AtomicU64,
    total_duration_micros: AtomicU64,
}

/// Point-in-time copy of [`RecognitionMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub successes: u64,
    pub failures: u64,
    pub cache_hits: u64,
    pub fallbacks: u64,
    pub average_duration: Duration,
}

impl MetricsSnapshot {
    /// Successful calls as a percentage of all calls
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successes as f64 / self.total as f64 * 100.0
        }
    }
}

impl RecognitionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished call. A cached result does not count as a new fallback.
    pub fn record(&self, success: bool, cache_used: bool, fallback_used: bool, elapsed: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        if cache_used {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        }
        if fallback_used && !cache_used {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_duration_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total.load(Ordering::Relaxed);
        let micros = self.total_duration_micros.load(Ordering::Relaxed);
        let average_duration = if total == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(micros / total)
        };

        MetricsSnapshot {
            total,
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            average_duration,
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.total,
            &self.successes,
            &self.failures,
            &self.cache_hits,
            &self.fallbacks,
            &self.total_duration_micros,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Samples kept per stage
pub const DEFAULT_WINDOW: usize = 100;

#[derive(Debug, Default)]
struct Samples {
    image_processing: VecDeque<Duration>,
    api_calls: VecDeque<Duration>,
    network_latency: VecDeque<Duration>,
    cache_hits: u64,
    cache_misses: u64,
}

/// Averages over the most recent samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceSnapshot {
    pub avg_image_processing: Duration,
    pub avg_api_call: Duration,
    pub avg_network_latency: Duration,
    /// Cache hits over lookups, 0-100
    pub cache_hit_rate: f64,
    pub samples: usize,
}

/// Windowed per-stage timings
#[derive(Debug)]
pub struct PerformanceMonitor {
    window: usize,
    samples: Mutex<Samples>,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

fn push_bounded(queue: &mut VecDeque<Duration>, window: usize, sample: Duration) {
    if queue.len() == window {
        queue.pop_front();
    }
    queue.push_back(sample);
}

fn average(queue: &VecDeque<Duration>) -> Duration {
    if queue.is_empty() {
        return Duration::ZERO;
    }
    let sum: Duration = queue.iter().sum();
    sum / queue.len() as u32
}

impl PerformanceMonitor {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            samples: Mutex::new(Samples::default()),
        }
    }

    fn with_samples(&self, f: impl FnOnce(&mut Samples, usize)) {
        // A poisoned lock only loses metrics
        if let Ok(mut samples) = self.samples.lock() {
            f(&mut samples, self.window);
        }
    }

    pub fn record_image_processing(&self, elapsed: Duration) {
        self.with_samples(|s, w| push_bounded(&mut s.image_processing, w, elapsed));
    }

    pub fn record_api_call(&self, elapsed: Duration) {
        self.with_samples(|s, w| push_bounded(&mut s.api_calls, w, elapsed));
    }

    pub fn record_network_latency(&self, elapsed: Duration) {
        self.with_samples(|s, w| push_bounded(&mut s.network_latency, w, elapsed));
    }

    pub fn record_cache_hit(&self) {
        self.with_samples(|s, _| s.cache_hits += 1);
    }

    pub fn record_cache_miss(&self) {
        self.with_samples(|s, _| s.cache_misses += 1);
    }

    pub fn snapshot(&self) -> PerformanceSnapshot {
        let Ok(samples) = self.samples.lock() else {
            return PerformanceSnapshot {
                avg_image_processing: Duration::ZERO,
                avg_api_call: Duration::ZERO,
                avg_network_latency: Duration::ZERO,
                cache_hit_rate: 0.0,
                samples: 0,
            };
        };
        let lookups = samples.cache_hits + samples.cache_misses;
        PerformanceSnapshot {
            avg_image_processing: average(&samples.image_processing),
            avg_api_call: average(&samples.api_calls),
            avg_network_latency: average(&samples.network_latency),
            cache_hit_rate: if lookups == 0 {
                0.0
            } else {
                samples.cache_hits as f64 / lookups as f64 * 100.0
            },
            samples: samples.image_processing.len()
                + samples.api_calls.len()
                + samples.network_latency.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_average() {
        let metrics = RecognitionMetrics::new();
        metrics.record(true, false, false, Duration::from_millis(100));
        metrics.record(true, true, false, Duration::from_millis(300));
        metrics.record(false, false, true, Duration::from_millis(200));

        let snap = metrics.snapshot();
        assert_eq!(snap.total, 3);
        assert_eq!(snap.successes, 2);
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.fallbacks, 1);
        assert_eq!(snap.average_duration, Duration::from_millis(200));
        assert!((snap.success_rate() - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_cached_fallback_result_is_not_recounted() {
        let metrics = RecognitionMetrics::new();
        metrics.record(true, false, true, Duration::from_millis(50));
        metrics.record(true, true, true, Duration::from_millis(1));
        metrics.record(true, true, true, Duration::from_millis(1));

        let snap = metrics.snapshot();
        assert_eq!(snap.fallbacks, 1);
        assert_eq!(snap.cache_hits, 2);
    }

    #[test]
    fn test_reset() {
        let metrics = RecognitionMetrics::new();
        metrics.record(true, false, false, Duration::from_secs(1));
        metrics.reset();
        let snap = metrics.snapshot();
        assert_eq!(snap.total, 0);
        assert_eq!(snap.average_duration, Duration::ZERO);
        assert_eq!(snap.success_rate(), 0.0);
    }

    #[test]
    fn test_monitor_window_drops_oldest() {
        let monitor = PerformanceMonitor::new(2);
        monitor.record_api_call(Duration::from_millis(1000));
        monitor.record_api_call(Duration::from_millis(10));
        monitor.record_api_call(Duration::from_millis(30));

        let snap = monitor.snapshot();
        assert_eq!(snap.avg_api_call, Duration::from_millis(20));
        assert_eq!(snap.avg_image_processing, Duration::ZERO);
    }

    #[test]
    fn test_monitor_hit_rate() {
        let monitor = PerformanceMonitor::default();
        assert_eq!(monitor.snapshot().cache_hit_rate, 0.0);
        monitor.record_cache_hit();
        monitor.record_cache_miss();
        monitor.record_cache_miss();
        monitor.record_cache_hit();
        assert_eq!(monitor.snapshot().cache_hit_rate, 50.0);
    }
}
