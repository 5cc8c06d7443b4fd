//! Multi-stage page readiness detection.
//!
//! After navigation commits, a page is walked through a sequence of readiness
//! stages (load state, fonts, optional selector, images, canvas, animation
//! frames, extra wait, settle buffer) before the screenshot is taken. Every
//! stage is capped by its own timeout and failure of any stage degrades to
//! "capture anyway": readiness can delay a capture but never abort one.

use crate::presets::WaitStrategy;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Cap for the load-state stage, matching the navigation timeout.
pub const LOAD_STATE_TIMEOUT: Duration = Duration::from_secs(60);
/// Cap for `document.fonts.ready`.
pub const FONTS_TIMEOUT: Duration = Duration::from_secs(10);
/// Cap for waiting on a caller-supplied selector.
pub const SELECTOR_TIMEOUT: Duration = Duration::from_secs(30);
/// Outer cap for the image settle stage; individual images get 5s in-page.
pub const IMAGE_SETTLE_TIMEOUT: Duration = Duration::from_secs(10);
/// Grace period granted to pages that draw to canvas elements.
pub const CANVAS_SETTLE_DELAY: Duration = Duration::from_secs(2);
/// Cap for the double requestAnimationFrame round trip.
pub const ANIMATION_FRAME_TIMEOUT: Duration = Duration::from_secs(2);
/// Upper bound on caller-requested extra wait.
pub const MAX_EXTRA_WAIT: Duration = Duration::from_secs(30);
/// Unconditional settle buffer before the screenshot.
pub const FINAL_SETTLE_DELAY: Duration = Duration::from_millis(500);

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const RESOURCE_STABILITY_WINDOW: Duration = Duration::from_millis(500);

const FONTS_READY_JS: &str = "document.fonts.ready.then(() => true)";
const RESOURCE_COUNT_JS: &str = "performance.getEntriesByType('resource').length";
const CANVAS_COUNT_JS: &str = "document.querySelectorAll('canvas').length";
const ANIMATION_FRAMES_JS: &str =
    "new Promise((resolve) => requestAnimationFrame(() => requestAnimationFrame(() => resolve(true))))";
const IMAGES_SETTLED_JS: &str = r#"
Promise.allSettled(
    Array.from(document.images).map((img) => {
        if (img.complete) return Promise.resolve(true);
        return Promise.race([
            img.decode().catch(() => true),
            new Promise((resolve) => setTimeout(() => resolve(true), 5000)),
        ]);
    })
).then(() => true)
"#;

/// How a single readiness stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageOutcome {
    /// The stage's condition was met within its timeout.
    Completed,
    /// The timeout elapsed first; capture proceeds regardless.
    TimedOut,
    /// The stage did not apply to this page or strategy.
    Skipped,
    /// Probing the page failed; treated like a timeout.
    Failed,
}

/// Per-stage outcomes for one capture, for diagnostics output.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    pub load_state: StageOutcome,
    pub fonts: StageOutcome,
    /// `None` when no selector was requested.
    pub selector: Option<StageOutcome>,
    pub images: StageOutcome,
    pub canvas: StageOutcome,
    pub animation_frames: StageOutcome,
    /// Extra wait actually applied, after clamping.
    pub extra_wait: Duration,
    pub elapsed: Duration,
}

/// Clamps a caller-requested extra wait to [`MAX_EXTRA_WAIT`].
pub fn effective_extra_wait(requested: Duration) -> Duration {
    requested.min(MAX_EXTRA_WAIT)
}

/// Walks the page through every readiness stage and reports how each ended.
///
/// Never fails: page-probe errors and stage timeouts are recorded in the
/// report and the capture continues.
pub async fn await_page_ready(
    page: &Page,
    strategy: WaitStrategy,
    selector: Option<&str>,
    extra_wait: Duration,
) -> ReadinessReport {
    let started = Instant::now();

    let load_state = if strategy == WaitStrategy::FirstResponse {
        // Navigation ack was the whole contract for this strategy.
        StageOutcome::Skipped
    } else {
        run_stage(
            "load-state",
            LOAD_STATE_TIMEOUT,
            await_load_state(page, strategy),
        )
        .await
    };

    let fonts = run_stage("fonts", FONTS_TIMEOUT, eval_promise(page, FONTS_READY_JS)).await;

    let selector_outcome = match selector {
        Some(sel) => Some(await_selector(page, sel).await),
        None => None,
    };

    let images = run_stage(
        "images",
        IMAGE_SETTLE_TIMEOUT,
        eval_promise(page, IMAGES_SETTLED_JS),
    )
    .await;

    let canvas = await_canvas(page).await;

    let animation_frames = run_stage(
        "animation-frames",
        ANIMATION_FRAME_TIMEOUT,
        eval_promise(page, ANIMATION_FRAMES_JS),
    )
    .await;

    let extra = effective_extra_wait(extra_wait);
    if !extra.is_zero() {
        debug!("Applying extra wait of {:?}", extra);
        sleep(extra).await;
    }

    sleep(FINAL_SETTLE_DELAY).await;

    ReadinessReport {
        load_state,
        fonts,
        selector: selector_outcome,
        images,
        canvas,
        animation_frames,
        extra_wait: extra,
        elapsed: started.elapsed(),
    }
}

/// Runs one stage under its timeout and folds errors into the outcome.
async fn run_stage<F>(name: &str, limit: Duration, fut: F) -> StageOutcome
where
    F: std::future::Future<Output = Result<(), String>>,
{
    match timeout(limit, fut).await {
        Ok(Ok(())) => StageOutcome::Completed,
        Ok(Err(e)) => {
            debug!("Readiness stage {} failed: {}", name, e);
            StageOutcome::Failed
        }
        Err(_) => {
            debug!("Readiness stage {} timed out after {:?}", name, limit);
            StageOutcome::TimedOut
        }
    }
}

async fn await_load_state(page: &Page, strategy: WaitStrategy) -> Result<(), String> {
    match strategy {
        WaitStrategy::FirstResponse => Ok(()),
        WaitStrategy::DomReady => {
            poll_until(
                page,
                "document.readyState === 'interactive' || document.readyState === 'complete'",
            )
            .await
        }
        WaitStrategy::Load => poll_until(page, "document.readyState === 'complete'").await,
        WaitStrategy::NetworkIdle => {
            poll_until(page, "document.readyState === 'complete'").await?;
            await_resource_quiescence(page).await
        }
    }
}

/// Network idle approximation: the page's resource timing entry count has
/// stopped growing across one stability window.
async fn await_resource_quiescence(page: &Page) -> Result<(), String> {
    let mut previous = eval_u64(page, RESOURCE_COUNT_JS).await?;
    loop {
        sleep(RESOURCE_STABILITY_WINDOW).await;
        let current = eval_u64(page, RESOURCE_COUNT_JS).await?;
        if current == previous {
            return Ok(());
        }
        previous = current;
    }
}

async fn await_selector(page: &Page, selector: &str) -> StageOutcome {
    let expression = match selector_probe_js(selector) {
        Ok(js) => js,
        Err(e) => {
            debug!("Could not build selector probe for {}: {}", selector, e);
            return StageOutcome::Failed;
        }
    };

    let outcome = run_stage("selector", SELECTOR_TIMEOUT, poll_until(page, &expression)).await;
    if outcome == StageOutcome::TimedOut {
        warn!(
            "Selector {} not visible after {:?}, capturing anyway",
            selector, SELECTOR_TIMEOUT
        );
    }
    outcome
}

/// Visibility probe for a caller-supplied selector. The selector is embedded
/// as a JSON string literal so quoting in it cannot break the script.
fn selector_probe_js(selector: &str) -> Result<String, String> {
    let quoted = serde_json::to_string(selector).map_err(|e| e.to_string())?;
    Ok(format!(
        "(() => {{ \
             const el = document.querySelector({quoted}); \
             if (!el) return false; \
             const style = window.getComputedStyle(el); \
             return style.display !== 'none' \
                 && style.visibility !== 'hidden' \
                 && el.getClientRects().length > 0; \
         }})()"
    ))
}

async fn await_canvas(page: &Page) -> StageOutcome {
    match eval_u64(page, CANVAS_COUNT_JS).await {
        Ok(0) => StageOutcome::Skipped,
        Ok(count) => {
            debug!("Waiting for {} canvas element(s) to settle", count);
            sleep(CANVAS_SETTLE_DELAY).await;
            StageOutcome::Completed
        }
        Err(e) => {
            debug!("Canvas probe failed: {}", e);
            StageOutcome::Failed
        }
    }
}

async fn poll_until(page: &Page, expression: &str) -> Result<(), String> {
    loop {
        if eval_bool(page, expression).await? {
            return Ok(());
        }
        sleep(POLL_INTERVAL).await;
    }
}

async fn eval_bool(page: &Page, expression: &str) -> Result<bool, String> {
    let result = page.evaluate(expression).await.map_err(|e| e.to_string())?;
    Ok(result
        .value()
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false))
}

async fn eval_u64(page: &Page, expression: &str) -> Result<u64, String> {
    let result = page.evaluate(expression).await.map_err(|e| e.to_string())?;
    Ok(result
        .value()
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0))
}

/// Evaluates a promise-returning expression and waits for it to resolve.
async fn eval_promise(page: &Page, expression: &str) -> Result<(), String> {
    let params = EvaluateParams::builder()
        .expression(expression)
        .await_promise(true)
        .return_by_value(true)
        .build()?;
    page.evaluate(params).await.map_err(|e| e.to_string())?;
    Ok(())
}
