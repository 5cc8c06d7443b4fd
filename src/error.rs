use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

/// Rejection reasons from the URL safety check.
///
/// Each variant corresponds to one gate of the validation sequence, in the
/// order the gates run. `PrivateAddress` covers literal IPs in the URL;
/// `PrivateResolvedAddress` covers hostnames whose DNS answer lands in a
/// private range, which callers may want to report differently.
#[derive(Debug, Clone, Error)]
pub enum UrlSafetyError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Only http and https URLs are allowed, not {0}")]
    DisallowedScheme(String),

    #[error("URLs with embedded credentials are not allowed")]
    CredentialsInUrl,

    #[error("Local or internal hostnames are not allowed: {0}")]
    BlockedHostname(String),

    #[error("Private or loopback IP addresses are not allowed: {0}")]
    PrivateAddress(IpAddr),

    #[error("Unable to resolve hostname {0}")]
    UnresolvableHostname(String),

    #[error("{host} resolves to a private or loopback IP address ({ip})")]
    PrivateResolvedAddress { host: String, ip: IpAddr },
}

/// Errors surfaced by the capture pipeline.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("No usable browser executable found")]
    BrowserUnavailable,

    #[error("Browser launch failed: {0}")]
    BrowserLaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Navigation timed out after {0:?}")]
    NavigationTimeout(Duration),

    #[error("Page setup failed: {0}")]
    PageSetup(String),

    #[error("Screenshot capture failed: {0}")]
    CaptureFailed(String),

    #[error("No valid presets selected")]
    NoValidPresets,

    #[error("Rate limit exceeded, retry in {retry_after_ms}ms")]
    RateLimited { retry_after_ms: i64 },

    #[error(transparent)]
    UnsafeUrl(#[from] UrlSafetyError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CaptureError {
    /// True when the error invalidates the whole capture request rather than
    /// a single preset. Navigation, page setup, and screenshot failures are
    /// scoped to the preset that hit them; everything else means no further
    /// preset can reasonably succeed.
    pub fn is_request_fatal(&self) -> bool {
        matches!(
            self,
            CaptureError::BrowserUnavailable
                | CaptureError::BrowserLaunchFailed(_)
                | CaptureError::NoValidPresets
                | CaptureError::RateLimited { .. }
                | CaptureError::UnsafeUrl(_)
                | CaptureError::Configuration(_)
        )
    }
}
