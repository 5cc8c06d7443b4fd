use metrics::{Counter, Histogram};
use std::time::Duration;

/// Instrumentation handles for the capture pipeline.
///
/// Handles default to no-op recorders; installing a real `metrics` recorder
/// at startup makes them live without touching call sites.
pub struct CaptureMetrics {
    pub captures_completed: Counter,
    pub captures_failed: Counter,
    pub presets_captured: Counter,
    pub presets_failed: Counter,
    pub capture_duration: Histogram,
    pub browser_launches: Counter,
}

impl CaptureMetrics {
    pub fn new() -> Self {
        Self {
            captures_completed: Counter::noop(),
            captures_failed: Counter::noop(),
            presets_captured: Counter::noop(),
            presets_failed: Counter::noop(),
            capture_duration: Histogram::noop(),
            browser_launches: Counter::noop(),
        }
    }

    /// Records the outcome of a whole capture request.
    pub fn record_capture(&self, duration: Duration, success: bool) {
        if success {
            self.captures_completed.increment(1);
        } else {
            self.captures_failed.increment(1);
        }

        self.capture_duration.record(duration.as_secs_f64());
    }

    /// Records the outcome of a single preset within a request.
    pub fn record_preset(&self, success: bool) {
        if success {
            self.presets_captured.increment(1);
        } else {
            self.presets_failed.increment(1);
        }
    }

    pub fn record_browser_launch(&self) {
        self.browser_launches.increment(1);
    }
}

impl Default for CaptureMetrics {
    fn default() -> Self {
        Self::new()
    }
}
