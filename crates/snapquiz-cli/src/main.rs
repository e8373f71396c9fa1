//! Snapquiz CLI
//!
//! Main entry point for the Snapquiz server: loads the configuration,
//! constructs the Mistral-backed capabilities, and serves the quiz API.

use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use snapquiz_core::{create_router, AppState, Config};
use snapquiz_mistral::MistralClient;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// Snapquiz - Adaptive Quiz Generation
///
/// Turns scanned document images into an interactive quiz: extracts text via
/// OCR, generates questions, grades answers with personalized feedback, and
/// produces targeted follow-up questions and a performance report.
#[derive(Parser, Debug)]
#[command(name = "snapquiz")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: quiz.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Port for the HTTP API server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize tracing subscriber with appropriate filter
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Snapquiz starting");
    tracing::debug!(config = ?args.config, "Config file");

    match run_server(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Runs the quiz server until Ctrl+C.
async fn run_server(args: Args) -> anyhow::Result<()> {
    // Load configuration
    let config = load_config(args.config.as_deref())?;
    print_config(&config);

    // Construct the Mistral-backed capabilities
    let client = Arc::new(MistralClient::from_env(&config)?);
    let state = AppState::new(config, Arc::clone(&client) as _, client as _);
    let router = create_router(state);

    // Bind and serve
    let addr: SocketAddr = ([0, 0, 0, 0], args.port).into();
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("Snapquiz API server running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C, triggering graceful shutdown.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    tracing::info!("Received Ctrl+C, shutting down");
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Prints the loaded configuration.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Chat model: {}", config.model);
    println!("  OCR model: {}", config.ocr_model);
    println!("  Questions per batch: {}", config.question_count);
    println!("  Follow-ups per batch: {}", config.follow_up_count);
    println!("  Temperature: {}", config.temperature);
    println!("  Request timeout: {}s", config.request_timeout_secs);
}
