use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendMetrics {
    pub calls_per_second: f64,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub avg_latency_ms: f64,
    pub last_operation: Option<String>,
    pub last_error: Option<String>,
    pub last_error_time: Option<DateTime<Utc>>,
}

impl Default for BackendMetrics {
    fn default() -> Self {
        Self {
            calls_per_second: 0.0,
            total_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
            avg_latency_ms: 0.0,
            last_operation: None,
            last_error: None,
            last_error_time: None,
        }
    }
}

/// Calls seen since the rate was last refreshed.
struct RateWindow {
    started: Instant,
    calls: u64,
}

impl RateWindow {
    fn new(now: Instant) -> Self {
        Self {
            started: now,
            calls: 0,
        }
    }

    /// Counts one call; once a second has passed, returns the rate over the
    /// window and starts a new one.
    fn tick(&mut self, now: Instant) -> Option<f64> {
        self.calls += 1;
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        let rate = self.calls as f64 / elapsed.as_secs_f64();
        *self = RateWindow::new(now);
        Some(rate)
    }
}

/// Counts every call made against the storage backend.
#[derive(Clone)]
pub struct MetricsCollector {
    metrics: Arc<Mutex<BackendMetrics>>,
    window: Arc<Mutex<RateWindow>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(Mutex::new(BackendMetrics::default())),
            window: Arc::new(Mutex::new(RateWindow::new(Instant::now()))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BackendMetrics> {
        // A panic while holding the lock leaves plain counters behind, still usable.
        self.metrics.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record_call_start(&self, operation: &'static str) -> CallTracker {
        CallTracker {
            start_time: Instant::now(),
            operation,
            collector: self.clone(),
        }
    }

    pub fn get_metrics(&self) -> BackendMetrics {
        self.lock().clone()
    }
}

pub struct CallTracker {
    start_time: Instant,
    operation: &'static str,
    collector: MetricsCollector,
}

impl CallTracker {
    pub fn finish(self, success: bool) {
        self.record(success, None);
    }

    pub fn finish_with_error(self, error: &str) {
        self.record(false, Some(error));
    }

    fn record(self, success: bool, error: Option<&str>) {
        let duration = self.start_time.elapsed();
        let mut metrics = self.collector.lock();

        metrics.total_calls += 1;
        metrics.last_operation = Some(self.operation.to_string());
        if success {
            metrics.successful_calls += 1;
        } else {
            metrics.failed_calls += 1;
        }
        if let Some(error) = error {
            metrics.last_error = Some(error.to_string());
            metrics.last_error_time = Some(Utc::now());
        }

        // exponential moving average
        let alpha = 0.1;
        metrics.avg_latency_ms =
            metrics.avg_latency_ms * (1.0 - alpha) + duration.as_secs_f64() * 1000.0 * alpha;

        let mut window = self
            .collector
            .window
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(rate) = window.tick(Instant::now()) {
            metrics.calls_per_second = rate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successful_call() {
        let collector = MetricsCollector::new();
        let tracker = collector.record_call_start("fetching players");
        std::thread::sleep(Duration::from_millis(5));
        tracker.finish(true);

        let metrics = collector.get_metrics();
        assert_eq!(metrics.total_calls, 1);
        assert_eq!(metrics.successful_calls, 1);
        assert_eq!(metrics.failed_calls, 0);
        assert_eq!(metrics.last_operation.as_deref(), Some("fetching players"));
        assert!(metrics.avg_latency_ms > 0.0);
        assert!(metrics.last_error.is_none());
    }

    #[test]
    fn test_failed_call_keeps_error() {
        let collector = MetricsCollector::new();
        collector
            .record_call_start("saving practice")
            .finish_with_error("Backend rejected request (409): duplicate key");

        let metrics = collector.get_metrics();
        assert_eq!(metrics.total_calls, 1);
        assert_eq!(metrics.failed_calls, 1);
        assert_eq!(
            metrics.last_error.as_deref(),
            Some("Backend rejected request (409): duplicate key")
        );
        assert!(metrics.last_error_time.is_some());
    }

    #[test]
    fn test_mixed_calls() {
        let collector = MetricsCollector::new();
        for i in 0..5 {
            collector.record_call_start("counting").finish(i % 2 == 0);
        }
        let metrics = collector.get_metrics();
        assert_eq!(metrics.total_calls, 5);
        assert_eq!(metrics.successful_calls, 3);
        assert_eq!(metrics.failed_calls, 2);
    }

    #[test]
    fn test_rate_covers_only_the_last_window() {
        let start = Instant::now();
        let mut window = RateWindow::new(start);
        for _ in 0..5 {
            assert_eq!(window.tick(start), None);
        }
        assert_eq!(window.tick(start + Duration::from_secs(2)), Some(3.0));

        // A quiet second window reports its own rate, not the running total.
        let second = start + Duration::from_secs(2);
        assert_eq!(window.tick(second + Duration::from_secs(2)), Some(0.5));
    }
}
