use anyhow::{anyhow, Context, Result};
use clap::Parser;
use snapset::{setup_logging, CaptureConfig, Cli, CliRunner};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    // Setup logging
    setup_logging(args.verbose).map_err(|e| anyhow!(e.to_string()))?;

    info!("Starting snapset v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = load_config(&args).await?;

    // Create CLI runner
    let cli_runner = CliRunner::new(config, &args)?;

    // Setup graceful shutdown
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::broadcast::channel(1);
    let _shutdown_handler = setup_shutdown_handler(shutdown_tx.clone());

    // Run the requested command
    let result = tokio::select! {
        result = cli_runner.run(args.command) => result,
        _ = shutdown_rx.recv() => {
            info!("Received shutdown signal");
            Ok(())
        }
    };

    // Graceful shutdown
    cli_runner.service.shutdown().await;

    if let Err(e) = result {
        error!("Application error: {}", e);
        std::process::exit(1);
    }

    info!("snapset stopped");
    Ok(())
}

async fn load_config(args: &Cli) -> Result<CaptureConfig> {
    let config = if let Some(config_path) = &args.config {
        // Load from file
        let config_content = tokio::fs::read_to_string(config_path)
            .await
            .with_context(|| format!("reading config file {}", config_path.display()))?;
        serde_json::from_str(&config_content)
            .with_context(|| format!("parsing config file {}", config_path.display()))?
    } else {
        // Use default configuration
        CaptureConfig::default()
    };

    info!("Configuration loaded");
    info!("Navigation timeout: {:?}", config.navigation_timeout);
    if let Some(chrome_path) = &config.chrome_path {
        info!("Chrome path: {}", chrome_path);
    }

    Ok(config)
}

fn setup_shutdown_handler(
    shutdown_tx: tokio::sync::broadcast::Sender<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .expect("Failed to create SIGINT handler");
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to create SIGTERM handler");

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
        }

        let _ = shutdown_tx.send(());
    })
}
