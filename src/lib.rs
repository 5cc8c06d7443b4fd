//! # snapset
//!
//! Viewport-preset screenshot capture: submit a URL and a list of preset
//! keys (social-card sizes, high-resolution multiples, mobile devices) and
//! get back one rendered PNG per preset from a shared headless Chrome.
//!
//! ## Pipeline
//!
//! - **URL safety**: URLs are validated before any network access. Private,
//!   loopback, link-local and otherwise internal destinations are rejected,
//!   both as literal IPs and through DNS resolution of public-looking names.
//! - **Rate limiting**: a fixed-window, injectable-clock limiter throttles
//!   expensive actions per caller identity.
//! - **Shared browser**: one Chrome process launches lazily on first use, is
//!   reused across jobs, and relaunches transparently after a crash.
//! - **Readiness protocol**: each page walks through layered, independently
//!   time-boxed stages (load state, fonts, optional selector, images,
//!   canvas, animation frames) before the screenshot, so chart-heavy pages
//!   capture after they have actually painted.
//! - **Failure isolation**: presets within a job run sequentially, smallest
//!   pixel area first; one preset failing to navigate never aborts the rest.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snapset::{CaptureConfig, CaptureRequest, CaptureService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = CaptureService::new(CaptureConfig::default())?;
//!
//!     let request = CaptureRequest::new(
//!         "https://example.com",
//!         vec!["og-facebook".to_string(), "4k".to_string()],
//!     );
//!     for result in service.capture(&request).await? {
//!         println!("{}: {} bytes", result.preset_key, result.image_bytes.len());
//!     }
//!
//!     service.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Capture two presets into ./screenshots
//! snapset capture --url https://example.com --presets og-facebook,4k
//!
//! # List the preset catalog
//! snapset presets --category social
//!
//! # Check a URL against the safety rules without capturing
//! snapset check-url --url http://169.254.169.254/latest/meta-data
//! ```
//!
//! ## Benchmarks
//!
//! ```bash
//! # Unit benchmarks only (no Chrome required)
//! cargo bench
//!
//! # Include live browser benchmarks
//! cargo bench --features integration_benchmarks
//! ```

/// Configuration for the browser and per-preset navigation
pub mod config;

/// Error types for capture and URL safety failures
pub mod error;

/// The static viewport preset catalog
pub mod presets;

/// Anti-SSRF URL validation
pub mod url_safety;

/// Fixed-window rate limiting keyed by caller identity and action
pub mod rate_limit;

/// Shared headless browser lifecycle
pub mod browser;

/// Multi-stage page readiness detection
pub mod readiness;

/// Capture orchestration with per-preset failure isolation
pub mod capture_service;

/// Instrumentation handles for the pipeline
pub mod metrics;

/// Command-line interface implementation
pub mod cli;

/// Formatting helpers
pub mod utils;

#[cfg(test)]
mod tests;

pub use browser::*;
pub use capture_service::*;
pub use cli::*;
pub use config::*;
pub use error::*;
pub use metrics::*;
pub use presets::*;
pub use rate_limit::*;
pub use readiness::*;
pub use url_safety::*;
pub use utils::*;
