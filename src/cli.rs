use crate::{
    presets_in_category, validate_capture_url, CaptureConfig, CaptureError, CapturePreset,
    CaptureReport, CaptureRequest, CaptureService, PresetCategory, WaitStrategy, PRESETS,
};
use crate::utils::{format_bytes, format_duration, sanitize_filename};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "snapset")]
#[command(about = "Viewport-preset screenshot capture tool")]
#[command(version = "0.1.0")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Chrome executable path")]
    pub chrome_path: Option<String>,

    #[arg(long, help = "Navigation timeout in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture a URL at one or more viewport presets
    Capture {
        #[arg(short, long, help = "URL to capture")]
        url: String,

        #[arg(
            short,
            long,
            value_delimiter = ',',
            default_value = "og-facebook",
            help = "Preset keys to capture (comma separated, see `presets`)"
        )]
        presets: Vec<String>,

        #[arg(
            long,
            value_enum,
            default_value_t = WaitStrategy::NetworkIdle,
            help = "Readiness strategy applied after navigation"
        )]
        wait: WaitStrategy,

        #[arg(long, help = "CSS selector to wait for before capturing")]
        selector: Option<String>,

        #[arg(
            long,
            default_value = "0",
            help = "Extra settle time in milliseconds (clamped to 30000)"
        )]
        extra_wait_ms: u64,

        #[arg(short, long, default_value = "screenshots", help = "Output directory")]
        output: PathBuf,

        #[arg(long, help = "Print the capture report as JSON")]
        json: bool,
    },

    /// List the preset catalog
    Presets {
        #[arg(long, value_enum, help = "Only show presets in this category")]
        category: Option<PresetCategory>,

        #[arg(long, help = "Print the catalog as JSON")]
        json: bool,
    },

    /// Check whether a URL passes safety validation
    CheckUrl {
        #[arg(short, long, help = "URL to check")]
        url: String,
    },
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub url: String,
    pub presets: Vec<String>,
    pub wait: WaitStrategy,
    pub selector: Option<String>,
    pub extra_wait_ms: u64,
    pub output: PathBuf,
    pub json: bool,
}

pub struct CliRunner {
    pub config: CaptureConfig,
    pub service: Arc<CaptureService>,
}

impl CliRunner {
    pub fn new(mut config: CaptureConfig, args: &Cli) -> Result<Self, CaptureError> {
        // Override config with CLI args
        if let Some(chrome_path) = &args.chrome_path {
            config.chrome_path = Some(chrome_path.clone());
        }
        if let Some(timeout) = args.timeout {
            config.navigation_timeout = Duration::from_secs(timeout);
        }

        let service = Arc::new(CaptureService::new(config.clone())?);

        Ok(Self { config, service })
    }

    pub async fn run(&self, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
        match command {
            Commands::Capture {
                url,
                presets,
                wait,
                selector,
                extra_wait_ms,
                output,
                json,
            } => {
                self.run_capture(CaptureOptions {
                    url,
                    presets,
                    wait,
                    selector,
                    extra_wait_ms,
                    output,
                    json,
                })
                .await
            }
            Commands::Presets { category, json } => self.run_presets(category, json).await,
            Commands::CheckUrl { url } => self.run_check_url(url).await,
        }
    }

    pub async fn run_capture(
        &self,
        options: CaptureOptions,
    ) -> Result<(), Box<dyn std::error::Error>> {
        info!(
            "Capturing {} at {} preset(s)",
            options.url,
            options.presets.len()
        );

        let request = CaptureRequest {
            url: options.url,
            preset_keys: options.presets,
            wait_strategy: options.wait,
            wait_for_selector: options.selector,
            extra_wait: Duration::from_millis(options.extra_wait_ms),
        };

        let report = self.service.capture_outcomes(&request).await?;

        fs::create_dir_all(&options.output).await?;
        let stem = sanitize_filename(report.url.host_str().unwrap_or("capture"));

        let mut saved = Vec::new();
        for outcome in &report.outcomes {
            match &outcome.outcome {
                Ok(result) => {
                    let filename = format!("{}-{}.png", stem, result.preset_key);
                    let path = options.output.join(&filename);
                    fs::write(&path, &result.image_bytes).await?;
                    info!("Saved {}", path.display());
                    saved.push((result, path));
                }
                Err(e) => {
                    warn!("Preset {} failed: {}", outcome.preset_key, e);
                }
            }
        }

        if options.json {
            println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
        } else {
            println!("Capture report for {}:", report.url);
            println!("  Job: {}", report.job_id);
            println!(
                "  Captured: {}/{} preset(s) in {}",
                report.captured(),
                report.requested,
                format_duration(report.elapsed)
            );
            for (result, path) in &saved {
                println!(
                    "  {} ({}x{}): {} -> {}",
                    result.preset_key,
                    result.pixel_width,
                    result.pixel_height,
                    format_bytes(result.image_bytes.len()),
                    path.display()
                );
            }
            for outcome in &report.outcomes {
                if let Err(e) = &outcome.outcome {
                    println!("  {}: failed ({})", outcome.preset_key, e);
                }
            }
        }

        if report.captured() == 0 {
            return Err("all presets failed".into());
        }

        Ok(())
    }

    pub async fn run_presets(
        &self,
        category: Option<PresetCategory>,
        json: bool,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let presets: Vec<&CapturePreset> = match category {
            Some(category) => presets_in_category(category).collect(),
            None => PRESETS.iter().collect(),
        };

        if json {
            println!("{}", serde_json::to_string_pretty(&presets)?);
            return Ok(());
        }

        println!("{} preset(s):", presets.len());
        for preset in presets {
            let (css_width, css_height) = preset.css_viewport();
            println!(
                "  {:<22} {:>5}x{:<5} @{}x (css {}x{}) [{}] {}",
                preset.key,
                preset.pixel_width,
                preset.pixel_height,
                preset.device_scale_factor,
                css_width,
                css_height,
                preset.category,
                preset.label
            );
        }

        Ok(())
    }

    pub async fn run_check_url(&self, url: String) -> Result<(), Box<dyn std::error::Error>> {
        match validate_capture_url(&url).await {
            Ok(safe) => {
                println!("URL is safe to capture: {safe}");
                Ok(())
            }
            Err(e) => {
                error!("URL rejected: {}", e);
                Err(e.into())
            }
        }
    }
}

fn report_json(report: &CaptureReport) -> serde_json::Value {
    let outcomes: Vec<serde_json::Value> = report
        .outcomes
        .iter()
        .map(|outcome| match &outcome.outcome {
            Ok(result) => serde_json::json!({
                "preset": outcome.preset_key,
                "status": "captured",
                "width": result.pixel_width,
                "height": result.pixel_height,
                "bytes": result.image_bytes.len(),
                "duration_ms": result.duration.as_millis() as u64,
                "readiness": result.readiness,
            }),
            Err(e) => serde_json::json!({
                "preset": outcome.preset_key,
                "status": "failed",
                "error": e.to_string(),
            }),
        })
        .collect();

    serde_json::json!({
        "job_id": report.job_id,
        "url": report.url.as_str(),
        "requested": report.requested,
        "captured": report.captured(),
        "elapsed_ms": report.elapsed.as_millis() as u64,
        "outcomes": outcomes,
    })
}

pub fn setup_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    Ok(())
}
