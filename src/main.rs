//! Ladle - multi-server MCP tool client.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ladle::config::Config;
use ladle::mcp::{CallOptions, ServerRegistry};
use ladle::model::OpenAiCompatClient;

/// Ladle - talk to your MCP tool servers, by hand or through a model
#[derive(Parser, Debug)]
#[command(name = "ladle")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Path to the server configuration file
    #[arg(short = 'c', long, env = "LADLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug)
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Enable verbose logging (equivalent to RUST_LOG=trace)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "trace"
    } else if args.debug {
        "debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();

    // Missing or malformed configuration is fatal; nothing to recover into.
    let config = match &args.config {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load_default().with_context(|| {
            format!(
                "loading config from {} (use --config to point elsewhere)",
                Config::default_config_path().display()
            )
        })?,
    };

    let registry = Arc::new(ServerRegistry::stdio(&config));
    println!("Connecting to {} server(s)...", registry.len());

    let report = registry.setup_all(&CallOptions::none()).await;
    for name in &report.ready {
        println!("  connected: {name}");
    }
    for (name, error) in &report.failed {
        println!("  failed:    {name} ({error})");
    }
    if !report.all_ready() {
        println!(
            "Continuing with {} of {} server(s).",
            report.ready.len(),
            registry.len()
        );
    }

    let model = Arc::new(OpenAiCompatClient::from_env());

    // Teardown runs whether the REPL finishes or the user interrupts.
    let outcome = tokio::select! {
        result = ladle::cli::run(Arc::clone(&registry), model) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received");
            println!("\nExiting...");
            Ok(())
        }
    };

    registry.teardown_all().await;
    outcome
}
