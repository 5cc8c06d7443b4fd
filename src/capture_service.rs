//! Capture orchestration.
//!
//! `CaptureService` takes a validated request through the whole pipeline:
//! preset planning, URL safety, then one sequential browser pass per preset
//! with per-preset failure isolation. A preset that fails to navigate is
//! logged and skipped; the rest of the request still runs.

use crate::browser::BrowserManager;
use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::metrics::CaptureMetrics;
use crate::presets::{resolve_presets, CapturePreset, PresetCategory, WaitStrategy};
use crate::readiness::{await_page_ready, ReadinessReport};
use crate::url_safety::UrlSafetyValidator;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// All captures are encoded as PNG.
pub const PNG_MIME: &str = "image/png";

/// Style sheet injected right before the screenshot so CSS animations and
/// blinking carets cannot smear across the frame.
const FREEZE_ANIMATIONS_JS: &str = "\
(() => {
    const style = document.createElement('style');
    style.textContent = '*, *::before, *::after { \
        animation-play-state: paused !important; \
        transition: none !important; \
        caret-color: transparent !important; }';
    document.head.appendChild(style);
    return true;
})()";

/// One caller invocation: a URL plus the presets and wait tuning to render
/// it with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub url: String,
    /// Preset keys to capture. Unknown keys are dropped, duplicates
    /// collapsed; an empty resolved set fails the request.
    pub preset_keys: Vec<String>,
    pub wait_strategy: WaitStrategy,
    /// Optional selector to wait for before capturing.
    pub wait_for_selector: Option<String>,
    /// Additional settle time after readiness, clamped to 30s.
    pub extra_wait: Duration,
}

impl CaptureRequest {
    pub fn new(url: impl Into<String>, preset_keys: Vec<String>) -> Self {
        Self {
            url: url.into(),
            preset_keys,
            ..Default::default()
        }
    }
}

/// A successfully rendered preset.
#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub preset_key: &'static str,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub image_bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub duration: Duration,
    pub readiness: ReadinessReport,
}

/// Outcome of one preset within a request, success or failure.
#[derive(Debug)]
pub struct PresetCaptureOutcome {
    pub preset_key: &'static str,
    pub outcome: Result<CaptureResult, CaptureError>,
}

/// Everything that happened during one capture job.
#[derive(Debug)]
pub struct CaptureReport {
    pub job_id: String,
    pub url: Url,
    /// Per-preset outcomes in capture (ascending pixel area) order. Shorter
    /// than `requested` only when the job stopped early on a fatal error.
    pub outcomes: Vec<PresetCaptureOutcome>,
    pub requested: usize,
    pub elapsed: Duration,
}

impl CaptureReport {
    pub fn captured(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.captured()
    }

    pub fn into_results(self) -> Vec<CaptureResult> {
        self.outcomes
            .into_iter()
            .filter_map(|o| o.outcome.ok())
            .collect()
    }
}

/// Resolves and orders the presets for one request.
///
/// Smallest pixel area first: cheap captures fail fast and the most
/// expensive renders (16K) run last, when the job has already proven viable.
pub(crate) fn plan_presets(keys: &[String]) -> Result<Vec<&'static CapturePreset>, CaptureError> {
    let mut presets = resolve_presets(keys);
    if presets.is_empty() {
        return Err(CaptureError::NoValidPresets);
    }
    presets.sort_by_key(|preset| preset.pixel_area());
    Ok(presets)
}

/// Sequential fold over presets with failure isolation.
///
/// Preset-level errors are recorded and the fold continues. A request-fatal
/// error (browser gone, relaunch failed) stops the fold and is also handed
/// back so the caller can decide between total failure and partial results.
pub(crate) async fn run_preset_captures<F, Fut>(
    presets: &[&'static CapturePreset],
    mut op: F,
) -> (Vec<PresetCaptureOutcome>, Option<CaptureError>)
where
    F: FnMut(&'static CapturePreset) -> Fut,
    Fut: std::future::Future<Output = Result<CaptureResult, CaptureError>>,
{
    let mut outcomes = Vec::with_capacity(presets.len());
    let mut fatal = None;

    for preset in presets {
        match op(preset).await {
            Ok(result) => {
                outcomes.push(PresetCaptureOutcome {
                    preset_key: preset.key,
                    outcome: Ok(result),
                });
            }
            Err(e) => {
                warn!("Preset {} failed: {}", preset.key, e);
                let request_fatal = e.is_request_fatal();
                if request_fatal {
                    fatal = Some(e.clone());
                }
                outcomes.push(PresetCaptureOutcome {
                    preset_key: preset.key,
                    outcome: Err(e),
                });
                if request_fatal {
                    break;
                }
            }
        }
    }

    (outcomes, fatal)
}

/// Drives capture jobs against one shared browser.
///
/// # Examples
///
/// ```rust,no_run
/// use snapset::{CaptureConfig, CaptureRequest, CaptureService};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = CaptureService::new(CaptureConfig::default())?;
///
///     let request = CaptureRequest::new(
///         "https://example.com",
///         vec!["og-facebook".to_string(), "4k".to_string()],
///     );
///     for result in service.capture(&request).await? {
///         println!("{}: {} bytes", result.preset_key, result.image_bytes.len());
///     }
///
///     service.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct CaptureService {
    browser: Arc<BrowserManager>,
    validator: UrlSafetyValidator,
    config: CaptureConfig,
    metrics: Arc<CaptureMetrics>,
}

impl CaptureService {
    pub fn new(config: CaptureConfig) -> Result<Self, CaptureError> {
        Self::with_validator(config, UrlSafetyValidator::new())
    }

    /// Builds a service with a caller-supplied validator, mainly so tests
    /// can inject a stub resolver.
    pub fn with_validator(
        config: CaptureConfig,
        validator: UrlSafetyValidator,
    ) -> Result<Self, CaptureError> {
        config.validate()?;
        let metrics = Arc::new(CaptureMetrics::new());
        let browser = Arc::new(BrowserManager::new(config.clone(), metrics.clone()));

        Ok(Self {
            browser,
            validator,
            config,
            metrics,
        })
    }

    /// Captures a request and returns the successful renders, in ascending
    /// pixel-area order.
    ///
    /// A shorter list than the requested preset count means some presets
    /// failed individually; an empty list means all of them did. Fatal
    /// request errors (unsafe URL, no valid presets, browser unavailable
    /// before anything was captured) surface as `Err`.
    pub async fn capture(
        &self,
        request: &CaptureRequest,
    ) -> Result<Vec<CaptureResult>, CaptureError> {
        self.capture_outcomes(request).await.map(CaptureReport::into_results)
    }

    /// Like [`capture`](Self::capture) but keeps per-preset failures in the
    /// report for diagnostics.
    pub async fn capture_outcomes(
        &self,
        request: &CaptureRequest,
    ) -> Result<CaptureReport, CaptureError> {
        let started = Instant::now();

        let presets = plan_presets(&request.preset_keys)?;
        let url = self.validator.validate(&request.url).await?;

        let job_id = Uuid::new_v4().to_string();
        info!(
            "Starting capture job {} for {} ({} preset(s))",
            job_id,
            url,
            presets.len()
        );

        let (outcomes, fatal) = run_preset_captures(&presets, |preset| {
            self.capture_preset(&url, preset, request)
        })
        .await;

        for outcome in &outcomes {
            self.metrics.record_preset(outcome.outcome.is_ok());
        }

        let captured = outcomes.iter().filter(|o| o.outcome.is_ok()).count();
        if let Some(fatal) = fatal {
            if captured == 0 {
                self.metrics.record_capture(started.elapsed(), false);
                return Err(fatal);
            }
            // Partial work beats none; the caller sees the stop reason in
            // the outcome list.
            warn!(
                "Capture job {} stopped early with {}/{} preset(s) captured: {}",
                job_id,
                captured,
                presets.len(),
                fatal
            );
        }

        let elapsed = started.elapsed();
        self.metrics.record_capture(elapsed, captured > 0);
        info!(
            "Capture job {} finished: {}/{} preset(s) captured in {:?}",
            job_id,
            captured,
            presets.len(),
            elapsed
        );

        Ok(CaptureReport {
            job_id,
            url,
            outcomes,
            requested: presets.len(),
            elapsed,
        })
    }

    /// Renders one preset in a fresh tab of the shared browser.
    async fn capture_preset(
        &self,
        url: &Url,
        preset: &'static CapturePreset,
        request: &CaptureRequest,
    ) -> Result<CaptureResult, CaptureError> {
        debug!(
            "Capturing preset {} ({}x{} @ {}x)",
            preset.key, preset.pixel_width, preset.pixel_height, preset.device_scale_factor
        );

        let browser = self.browser.acquire().await?;

        // Hold the browser lock only long enough to open the tab; captures
        // from concurrent requests interleave on the same process.
        let page = {
            let browser = browser.lock().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| CaptureError::PageSetup(e.to_string()))?
        };

        let result = self.capture_on_page(&page, url, preset, request).await;
        let _ = page.close().await;
        result
    }

    async fn capture_on_page(
        &self,
        page: &Page,
        url: &Url,
        preset: &'static CapturePreset,
        request: &CaptureRequest,
    ) -> Result<CaptureResult, CaptureError> {
        let started = Instant::now();
        let (css_width, css_height) = preset.css_viewport();

        let device_metrics = SetDeviceMetricsOverrideParams::builder()
            .width(css_width)
            .height(css_height)
            .device_scale_factor(preset.device_scale_factor)
            .mobile(preset.category == PresetCategory::Mobile)
            .build()
            .map_err(|e| CaptureError::PageSetup(e.to_string()))?;
        page.execute(device_metrics)
            .await
            .map_err(|e| CaptureError::PageSetup(e.to_string()))?;

        // Navigation is the only fatal step for a preset; everything after
        // degrades to capture-anyway.
        match timeout(self.config.navigation_timeout, page.goto(url.as_str())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(CaptureError::NavigationFailed(e.to_string())),
            Err(_) => return Err(CaptureError::NavigationTimeout(self.config.navigation_timeout)),
        }

        let readiness = await_page_ready(
            page,
            request.wait_strategy,
            request.wait_for_selector.as_deref(),
            request.extra_wait,
        )
        .await;

        freeze_animations(page).await;

        let screenshot_params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(false)
            .build();
        let image_bytes = page
            .screenshot(screenshot_params)
            .await
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

        let duration = started.elapsed();
        info!(
            "Captured preset {}: {} bytes in {:?}",
            preset.key,
            image_bytes.len(),
            duration
        );

        Ok(CaptureResult {
            preset_key: preset.key,
            pixel_width: preset.pixel_width,
            pixel_height: preset.pixel_height,
            image_bytes,
            mime_type: PNG_MIME,
            duration,
            readiness,
        })
    }

    pub async fn shutdown(&self) {
        info!("Shutting down capture service");
        self.browser.shutdown().await;
    }
}

async fn freeze_animations(page: &Page) {
    if let Err(e) = page.evaluate(FREEZE_ANIMATIONS_JS).await {
        debug!("Could not freeze animations before screenshot: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UrlSafetyError;
    use crate::readiness::StageOutcome;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn dummy_result(preset: &'static CapturePreset) -> CaptureResult {
        CaptureResult {
            preset_key: preset.key,
            pixel_width: preset.pixel_width,
            pixel_height: preset.pixel_height,
            image_bytes: vec![0u8; 8],
            mime_type: PNG_MIME,
            duration: Duration::from_millis(5),
            readiness: ReadinessReport {
                load_state: StageOutcome::Completed,
                fonts: StageOutcome::Completed,
                selector: None,
                images: StageOutcome::Completed,
                canvas: StageOutcome::Skipped,
                animation_frames: StageOutcome::Completed,
                extra_wait: Duration::ZERO,
                elapsed: Duration::from_millis(5),
            },
        }
    }

    #[test]
    fn test_plan_orders_by_pixel_area() {
        let keys = vec![
            "4k".to_string(),
            "og-facebook".to_string(),
            "mobile-iphone".to_string(),
        ];
        let planned = plan_presets(&keys).unwrap();
        let order: Vec<&str> = planned.iter().map(|p| p.key).collect();
        assert_eq!(order, vec!["mobile-iphone", "og-facebook", "4k"]);

        let areas: Vec<u64> = planned.iter().map(|p| p.pixel_area()).collect();
        assert!(areas.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_plan_rejects_empty_selection() {
        assert!(matches!(
            plan_presets(&[]),
            Err(CaptureError::NoValidPresets)
        ));
        assert!(matches!(
            plan_presets(&["not-a-preset".to_string()]),
            Err(CaptureError::NoValidPresets)
        ));
    }

    #[tokio::test]
    async fn test_fold_isolates_preset_failures() {
        let presets = plan_presets(&[
            "og-facebook".to_string(),
            "twitter".to_string(),
            "4k".to_string(),
        ])
        .unwrap();

        let (outcomes, fatal) = run_preset_captures(&presets, |preset| async move {
            if preset.key == "twitter" {
                Err(CaptureError::NavigationTimeout(Duration::from_secs(60)))
            } else {
                Ok(dummy_result(preset))
            }
        })
        .await;

        assert!(fatal.is_none());
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes.iter().filter(|o| o.outcome.is_ok()).count(), 2);
        let failed: Vec<&str> = outcomes
            .iter()
            .filter(|o| o.outcome.is_err())
            .map(|o| o.preset_key)
            .collect();
        assert_eq!(failed, vec!["twitter"]);
    }

    #[tokio::test]
    async fn test_fold_stops_on_request_fatal_error() {
        let presets = plan_presets(&[
            "og-facebook".to_string(),
            "twitter".to_string(),
            "4k".to_string(),
        ])
        .unwrap();

        let calls = AtomicUsize::new(0);
        let (outcomes, fatal) = run_preset_captures(&presets, |preset| {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    Ok(dummy_result(preset))
                } else {
                    Err(CaptureError::BrowserUnavailable)
                }
            }
        })
        .await;

        assert!(matches!(fatal, Some(CaptureError::BrowserUnavailable)));
        // The third preset is never attempted.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes.iter().filter(|o| o.outcome.is_ok()).count(), 1);
    }

    #[tokio::test]
    async fn test_capture_rejects_before_any_browser_work() {
        let service = CaptureService::new(CaptureConfig::default()).unwrap();

        // Preset planning fails first, even for an unparseable URL.
        let request = CaptureRequest::new("not a url", vec![]);
        assert!(matches!(
            service.capture(&request).await,
            Err(CaptureError::NoValidPresets)
        ));

        // A literal loopback IP is rejected without DNS or browser work.
        let request =
            CaptureRequest::new("http://127.0.0.1/admin", vec!["og-facebook".to_string()]);
        match service.capture(&request).await {
            Err(CaptureError::UnsafeUrl(UrlSafetyError::PrivateAddress(_))) => {}
            other => panic!("expected private-address rejection, got {:?}", other),
        }

        assert!(!service.browser.is_running().await);
    }

    #[test]
    fn test_report_accessors() {
        let presets = plan_presets(&["og-facebook".to_string(), "4k".to_string()]).unwrap();
        let report = CaptureReport {
            job_id: "test".to_string(),
            url: Url::parse("https://example.com").unwrap(),
            outcomes: vec![
                PresetCaptureOutcome {
                    preset_key: presets[0].key,
                    outcome: Ok(dummy_result(presets[0])),
                },
                PresetCaptureOutcome {
                    preset_key: presets[1].key,
                    outcome: Err(CaptureError::NavigationFailed("net::ERR_FAILED".to_string())),
                },
            ],
            requested: 2,
            elapsed: Duration::from_millis(20),
        };

        assert_eq!(report.captured(), 1);
        assert_eq!(report.failed(), 1);
        let results = report.into_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].preset_key, "og-facebook");
        assert_eq!(results[0].mime_type, PNG_MIME);
    }
}
