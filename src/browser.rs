//! Shared headless browser lifecycle.
//!
//! One Chrome instance serves all captures. It launches lazily on the first
//! acquire, is reused while its DevTools connection stays alive, and is
//! relaunched transparently after a crash or disconnect.

use crate::config::{create_browser_config, CaptureConfig};
use crate::error::CaptureError;
use crate::metrics::CaptureMetrics;
use chromiumoxide::browser::Browser;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Well-known Chrome/Chromium install locations, probed in order when no
/// explicit path is configured.
const CHROME_CANDIDATES: &[&str] = &[
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/sbin/chromium",
    "/opt/google/chrome/chrome",
    "/snap/bin/chromium",
];

/// Locates a usable browser executable.
///
/// A configured path wins when it exists; otherwise the candidate list is
/// scanned. Returns `None` when nothing is installed.
pub fn find_chrome_executable(configured: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = configured {
        let candidate = Path::new(path);
        if candidate.exists() {
            return Some(candidate.to_path_buf());
        }
        warn!(
            "Configured chrome path {} does not exist, probing known locations",
            path
        );
    }

    CHROME_CANDIDATES
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(Path::to_path_buf)
}

/// A launched browser together with the task that pumps its DevTools
/// Protocol event stream.
struct ManagedBrowser {
    browser: Arc<Mutex<Browser>>,
    handler_task: tokio::task::JoinHandle<Result<(), chromiumoxide::error::CdpError>>,
}

impl ManagedBrowser {
    /// The handler task runs for as long as the DevTools connection lives,
    /// so a finished task means the browser is gone.
    fn is_connected(&self) -> bool {
        !self.handler_task.is_finished()
    }

    async fn shutdown(self) {
        let _ = self.browser.lock().await.close().await;
        self.handler_task.abort();
    }
}

/// Lazily-launched shared browser.
///
/// `acquire` hands out clones of the same browser handle to every caller;
/// captures run in separate tabs of one Chrome process rather than separate
/// processes.
pub struct BrowserManager {
    state: Mutex<Option<ManagedBrowser>>,
    config: CaptureConfig,
    metrics: Arc<CaptureMetrics>,
}

impl BrowserManager {
    /// Creates a manager without launching anything. The browser starts on
    /// the first [`acquire`](Self::acquire).
    pub fn new(config: CaptureConfig, metrics: Arc<CaptureMetrics>) -> Self {
        Self {
            state: Mutex::new(None),
            config,
            metrics,
        }
    }

    /// Returns a handle to the shared browser, launching or relaunching it
    /// first if needed.
    ///
    /// The state lock serializes concurrent acquires, so only one launch
    /// happens even when many captures start at once.
    pub async fn acquire(&self) -> Result<Arc<Mutex<Browser>>, CaptureError> {
        let mut state = self.state.lock().await;

        if let Some(managed) = state.as_ref() {
            if managed.is_connected() {
                return Ok(managed.browser.clone());
            }
            warn!("Browser connection lost, relaunching");
        }

        if let Some(stale) = state.take() {
            stale.shutdown().await;
        }

        let managed = self.launch().await?;
        let browser = managed.browser.clone();
        *state = Some(managed);
        Ok(browser)
    }

    async fn launch(&self) -> Result<ManagedBrowser, CaptureError> {
        let executable = find_chrome_executable(self.config.chrome_path.as_deref())
            .ok_or(CaptureError::BrowserUnavailable)?;

        info!("Launching headless browser: {}", executable.display());
        let browser_config = create_browser_config(&self.config, &executable)?;
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| CaptureError::BrowserLaunchFailed(e.to_string()))?;

        // The handler implements Stream and must be polled with .next().await
        // for the browser connection to make progress.
        let handler_task = tokio::spawn(async move {
            loop {
                match handler.next().await {
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        error!("Browser handler error: {}", e);
                        return Err(e);
                    }
                    None => {
                        debug!("Browser handler stream ended");
                        break;
                    }
                }
            }
            Ok(())
        });

        self.metrics.record_browser_launch();
        Ok(ManagedBrowser {
            browser: Arc::new(Mutex::new(browser)),
            handler_task,
        })
    }

    /// Whether a live browser is currently held.
    pub async fn is_running(&self) -> bool {
        self.state
            .lock()
            .await
            .as_ref()
            .map(ManagedBrowser::is_connected)
            .unwrap_or(false)
    }

    /// Closes the browser if one is running. Safe to call repeatedly and
    /// before any launch has happened.
    pub async fn shutdown(&self) {
        if let Some(managed) = self.state.lock().await.take() {
            info!("Shutting down browser");
            managed.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_path_wins_when_present() {
        let exe = std::env::current_exe().unwrap();
        let found = find_chrome_executable(exe.to_str());
        assert_eq!(found, Some(exe));
    }

    #[test]
    fn test_missing_configured_path_falls_through_to_candidates() {
        let configured = Some("/definitely/not/a/real/chrome");
        // Whatever the candidate scan yields, a bad configured path must not
        // change it.
        assert_eq!(find_chrome_executable(configured), find_chrome_executable(None));
    }

    #[tokio::test]
    async fn test_shutdown_before_launch_is_noop() {
        let manager = BrowserManager::new(
            CaptureConfig::default(),
            Arc::new(CaptureMetrics::new()),
        );
        assert!(!manager.is_running().await);
        manager.shutdown().await;
        manager.shutdown().await;
        assert!(!manager.is_running().await);
    }
}
