//! Stategate CLI - bounded-latency process state reads
//!
//! Serves evaluated process memory, answering `202 Accepted` when evaluation
//! outlasts the busy threshold.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use stategate::api::{ApiState, start_api_server};
use stategate::config::Config;
use stategate::evaluator::Evaluator;

/// Stategate - process state reads behind a busy threshold
#[derive(Debug, Parser)]
#[command(name = "stategate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the state API
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "stategate.yaml")]
        config: String,

        /// Override the listen port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the busy threshold (e.g. 500ms, 2s)
        #[arg(short, long, value_parser = humantime::parse_duration)]
        busy_threshold: Option<Duration>,
    },

    /// Generate a default configuration file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "stategate.yaml")]
        output: String,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "stategate.yaml")]
        config: String,
    },
}

fn setup_logging(verbose: bool, json: bool) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.json);

    match cli.command {
        Commands::Serve {
            config: config_path,
            port,
            busy_threshold,
        } => serve(&config_path, port, busy_threshold).await,

        Commands::Init { output } => init_config(&output),

        Commands::Validate {
            config: config_path,
        } => validate_config(&config_path),
    }
}

/// Load configuration and serve the state API until ctrl-c
async fn serve(
    config_path: &str,
    port: Option<u16>,
    busy_threshold: Option<Duration>,
) -> Result<()> {
    tracing::info!(config = %config_path, "Loading configuration");

    let mut config = Config::from_file(config_path)
        .with_context(|| format!("Failed to load config from {config_path}"))?;

    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(threshold) = busy_threshold {
        config.server.busy_threshold = threshold;
    }

    let evaluator: Arc<dyn Evaluator> = Arc::new(
        config
            .evaluator
            .to_evaluator()
            .context("Failed to create evaluator")?,
    );

    tracing::info!(
        service = %config.server.name,
        upstream = %config.evaluator.upstream_url,
        busy_threshold = %humantime::format_duration(config.server.busy_threshold),
        allowed = config.processes.allow.len(),
        restricted = config.processes.restrict.len(),
        "Service configuration loaded"
    );

    let state = ApiState::from_config(&config, evaluator);
    start_api_server(config.server.port, state)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("State API server failed")
}

/// Generate a default configuration file
fn init_config(output: &str) -> Result<()> {
    let config = Config::default_config();
    let yaml = config.to_yaml().context("Failed to serialize config")?;

    std::fs::write(output, &yaml).with_context(|| format!("Failed to write config to {output}"))?;

    tracing::info!(path = %output, "Configuration file created");
    println!("Created {output}");
    println!();
    println!("Point evaluator.upstream_url at your evaluating node, then run:");
    println!("  stategate serve --config {output}");

    Ok(())
}

/// Validate a configuration file
fn validate_config(config_path: &str) -> Result<()> {
    tracing::info!(config = %config_path, "Validating configuration");

    let config = Config::from_file(config_path)
        .with_context(|| format!("Failed to load config from {config_path}"))?;
    config
        .evaluator
        .to_evaluator()
        .context("Invalid evaluator settings")?;

    println!("Configuration is valid!");
    println!();
    println!("Service: {}", config.server.name);
    println!("Port: {}", config.server.port);
    println!(
        "Busy threshold: {}",
        humantime::format_duration(config.server.busy_threshold)
    );
    println!("Upstream: {}", config.evaluator.upstream_url);
    if let Some(timeout) = config.evaluator.timeout {
        println!("Upstream timeout: {}", humantime::format_duration(timeout));
    }

    if !config.processes.allow.is_empty() {
        println!("Allowed processes: {}", config.processes.allow.len());
        for id in &config.processes.allow {
            println!("  - {id}");
        }
    }
    if !config.processes.restrict.is_empty() {
        println!("Restricted processes: {}", config.processes.restrict.len());
        for id in &config.processes.restrict {
            println!("  - {id}");
        }
    }

    Ok(())
}
