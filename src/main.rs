use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(
    name = "regwatch",
    version,
    about = "Regulatory web-page change detection and notification routing",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configuration file
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one monitoring cycle and print the report
    Check {
        /// Check every active source, due or not
        #[arg(long, default_value = "false")]
        all: bool,

        /// Only check this source
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Run monitoring cycles until Ctrl+C or SIGTERM
    Run {
        /// Minutes between cycles (default from configuration)
        #[arg(short, long)]
        interval_minutes: Option<u64>,
    },

    /// Show store statistics and recent changes
    Stats {
        /// Number of recent changes to list
        #[arg(short, long, default_value = "10")]
        recent: usize,
    },

    /// List sources with due status and failure state
    Sources,

    /// Activate a source
    Enable {
        /// Source id
        id: String,
    },

    /// Deactivate a source
    Disable {
        /// Source id
        id: String,
    },

    /// Fetch every active source once and check the store, alerting on failures
    Health {
        /// Print the report as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Compare two local text files
    Analyze {
        /// Previous version
        old: PathBuf,

        /// Current version
        new: PathBuf,

        /// Print the analysis as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(&cli.config)?;

    // Initialize tracing/logging
    let log_format = cli.log_format.as_deref().unwrap_or(&config.logging.format);
    setup_tracing(log_format, &config.logging.level, cli.verbose)?;

    if let Err(e) = regwatch::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed");
    }

    tracing::info!(config = %cli.config.display(), "regwatch starting");

    match cli.command {
        Commands::Check { all, source } => {
            tracing::info!(all = %all, source = ?source, "Starting check command");
            commands::check(config, all, source).await?;
        }

        Commands::Run { interval_minutes } => {
            tracing::info!(interval_minutes = ?interval_minutes, "Starting run command");
            commands::run(config, interval_minutes).await?;
        }

        Commands::Stats { recent } => {
            commands::stats(config, recent).await?;
        }

        Commands::Sources => {
            commands::sources(config).await?;
        }

        Commands::Enable { id } => {
            commands::set_active(config, id, true).await?;
        }

        Commands::Disable { id } => {
            commands::set_active(config, id, false).await?;
        }

        Commands::Health { json } => {
            commands::health(config, json).await?;
        }

        Commands::Analyze { old, new, json } => {
            commands::analyze(config, old, new, json).await?;
        }
    }

    tracing::info!("regwatch completed successfully");
    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            tracing_subscriber::EnvFilter::new("regwatch=debug,info")
        } else {
            tracing_subscriber::EnvFilter::new(format!("regwatch={level},warn"))
        }
    });

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
