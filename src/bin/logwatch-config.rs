//! # logwatch Configuration Validator
//!
//! Command-line tool that loads the monitor configuration for an environment,
//! validates it and prints the effective settings, including the metrics
//! instance name each channel will publish under.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use logwatch::config::{ConfigManager, MonitorConfig};
use logwatch::sanitize_instance_name;
use serde_json::json;
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "logwatch-config")]
#[command(about = "Validate logwatch monitor configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production, ...)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory (default: $LOGWATCH_CONFIG_DIR or config/)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the configuration and print the effective settings
    Validate,

    /// List configured channels with their metrics instance names
    Channels,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::Channels) => list_channels(&cli),
        Some(Commands::Validate) | None => validate(&cli),
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {:#}", e);
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> Result<MonitorConfig> {
    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &cli.environment)
        .with_context(|| format!("loading configuration for environment '{}'", cli.environment))?;
    Ok(manager.config().clone())
}

fn channel_rows(config: &MonitorConfig) -> Vec<(String, String)> {
    config
        .channels
        .iter()
        .map(|channel| (channel.clone(), sanitize_instance_name(channel)))
        .collect()
}

fn validate(cli: &Cli) -> Result<()> {
    let config = load(cli)?;

    match cli.format {
        OutputFormat::Json => {
            let channels: Vec<_> = channel_rows(&config)
                .into_iter()
                .map(|(channel, instance)| json!({ "channel": channel, "instance": instance }))
                .collect();
            let output = json!({
                "environment": cli.environment,
                "valid": true,
                "config": config,
                "effective_liveness_interval_ms": config.effective_liveness_interval_ms(),
                "channels": channels,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            println!("🔧 Validating logwatch configuration");
            println!("Environment: {}", cli.environment);
            println!();
            println!("✅ Configuration loaded and validated");
            println!();
            println!("{:<32} {}", "sampling_interval_ms", config.sampling_interval_ms);
            println!(
                "{:<32} {}{}",
                "liveness_interval_ms",
                config.effective_liveness_interval_ms(),
                if config.liveness_interval_ms.is_none() {
                    " (from sampling interval)"
                } else {
                    ""
                }
            );
            println!(
                "{:<32} {}",
                "max_concurrent_source_checks", config.max_concurrent_source_checks
            );
            println!("{:<32} {}", "source_check_timeout_ms", config.source_check_timeout_ms);
            println!("{:<32} {}", "shutdown_timeout_ms", config.shutdown_timeout_ms);
            println!();
            print_channel_table(&config);
        }
    }

    Ok(())
}

fn list_channels(cli: &Cli) -> Result<()> {
    let config = load(cli)?;

    match cli.format {
        OutputFormat::Json => {
            let rows: Vec<_> = channel_rows(&config)
                .into_iter()
                .map(|(channel, instance)| json!({ "channel": channel, "instance": instance }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Table => print_channel_table(&config),
    }

    Ok(())
}

fn print_channel_table(config: &MonitorConfig) {
    let rows = channel_rows(config);
    let width = rows
        .iter()
        .map(|(channel, _)| channel.len())
        .max()
        .unwrap_or(0)
        .max("CHANNEL".len());

    println!("{:<width$}  INSTANCE", "CHANNEL");
    for (channel, instance) in rows {
        let marker = if channel != instance { "  (sanitized)" } else { "" };
        println!("{channel:<width$}  {instance}{marker}");
    }
}
