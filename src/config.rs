//! Configuration for the capture pipeline.
//!
//! Everything here is serde-serializable so a JSON config file can set any
//! field, with CLI flags layered on top by the binary.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::CaptureError;

/// User agent presented to captured pages. Matches current desktop Chrome so
/// pages serve their regular desktop markup instead of bot fallbacks.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Settings for the shared browser and per-preset navigation.
///
/// # Examples
///
/// ```rust
/// use snapset::CaptureConfig;
/// use std::time::Duration;
///
/// // Defaults carry the pipeline's standard timeouts
/// let config = CaptureConfig::default();
/// assert_eq!(config.navigation_timeout, Duration::from_secs(60));
///
/// // Point at a specific Chromium build
/// let config = CaptureConfig {
///     chrome_path: Some("/opt/chromium/chrome".to_string()),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Path to a Chrome/Chromium executable (default: probe well-known
    /// install locations).
    pub chrome_path: Option<String>,

    /// User agent the browser is launched with (default:
    /// [`DEFAULT_USER_AGENT`]).
    pub user_agent: String,

    /// Timeout for the navigation call itself (default: 60 seconds).
    ///
    /// Readiness stages carry their own independent timeouts on top.
    pub navigation_timeout: Duration,

    /// Initial browser window width (default: 1920). Per-preset device
    /// metrics override this for each capture.
    pub window_width: u32,

    /// Initial browser window height (default: 1080).
    pub window_height: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            navigation_timeout: Duration::from_secs(60),
            window_width: 1920,
            window_height: 1080,
        }
    }
}

impl CaptureConfig {
    /// Rejects configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), CaptureError> {
        if self.navigation_timeout.is_zero() {
            return Err(CaptureError::Configuration(
                "navigation_timeout must be greater than zero".to_string(),
            ));
        }
        if self.window_width == 0 || self.window_height == 0 {
            return Err(CaptureError::Configuration(
                "window dimensions must be greater than zero".to_string(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(CaptureError::Configuration(
                "user_agent must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Chrome command-line arguments for headless capture.
///
/// Certificate tolerance is deliberate: captures should render pages behind
/// self-signed or expired TLS rather than fail, matching the pipeline's
/// TLS-error tolerance contract.
pub fn get_chrome_args(config: &CaptureConfig) -> Vec<String> {
    vec![
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--disable-background-timer-throttling".to_string(),
        "--disable-backgrounding-occluded-windows".to_string(),
        "--disable-renderer-backgrounding".to_string(),
        "--disable-extensions".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-sync".to_string(),
        "--no-first-run".to_string(),
        "--mute-audio".to_string(),
        "--hide-scrollbars".to_string(),
        "--allow-running-insecure-content".to_string(),
        "--ignore-certificate-errors".to_string(),
        format!("--user-agent={}", config.user_agent),
        format!(
            "--window-size={},{}",
            config.window_width, config.window_height
        ),
    ]
}

/// Builds the chromiumoxide launch configuration for a discovered executable.
pub fn create_browser_config(
    config: &CaptureConfig,
    executable: &Path,
) -> Result<chromiumoxide::browser::BrowserConfig, CaptureError> {
    chromiumoxide::browser::BrowserConfig::builder()
        .window_size(config.window_width, config.window_height)
        .args(get_chrome_args(config))
        .chrome_executable(executable)
        .build()
        .map_err(CaptureError::Configuration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();
        assert!(config.chrome_path.is_none());
        assert_eq!(config.navigation_timeout, Duration::from_secs(60));
        assert_eq!(config.window_width, 1920);
        assert_eq!(config.window_height, 1080);
        assert!(config.user_agent.contains("Chrome"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = CaptureConfig {
            navigation_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CaptureConfig {
            window_width: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CaptureConfig {
            user_agent: "   ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chrome_args() {
        let config = CaptureConfig::default();
        let args = get_chrome_args(&config);
        assert!(args.contains(&"--no-sandbox".to_string()));
        assert!(args.contains(&"--ignore-certificate-errors".to_string()));
        assert!(args.contains(&"--window-size=1920,1080".to_string()));
        assert!(args.iter().any(|a| a.starts_with("--user-agent=Mozilla/5.0")));
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = CaptureConfig {
            chrome_path: Some("/usr/bin/chromium".to_string()),
            navigation_timeout: Duration::from_secs(30),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: CaptureConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.chrome_path.as_deref(), Some("/usr/bin/chromium"));
        assert_eq!(parsed.navigation_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let parsed: CaptureConfig =
            serde_json::from_str(r#"{"window_width": 1280}"#).unwrap();
        assert_eq!(parsed.window_width, 1280);
        assert_eq!(parsed.window_height, 1080);
        assert_eq!(parsed.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_create_browser_config() {
        let config = CaptureConfig::default();
        let exe = std::env::current_exe().unwrap();
        assert!(create_browser_config(&config, &exe).is_ok());
    }
}
