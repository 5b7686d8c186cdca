//! speedwatch: hourly speed tests with a rolling ten-day report.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use speedwatch::config::{Config, Overrides, DEFAULT_CONFIG_FILE};
use speedwatch::history::DEFAULT_HISTORY_DAYS;
use speedwatch::prelude::*;

#[derive(Parser)]
#[command(name = "speedwatch")]
#[command(about = "Hourly network speed tests with a rolling per-day report")]
#[command(version)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override the below-threshold limit in Mbit/s
    #[arg(long)]
    threshold: Option<u32>,

    /// Override the speedtest server id
    #[arg(long)]
    server_id: Option<u64>,

    /// Override the SQLite database path
    #[arg(long)]
    db: Option<PathBuf>,

    /// Disable coloured report lines
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the history report, catch up if needed, then measure every hour (default)
    Run,

    /// Print the per-day report and exit without measuring
    History {
        /// Number of days to include, today counted
        #[arg(long, default_value_t = DEFAULT_HISTORY_DAYS)]
        days: u32,
    },

    /// Run a single measurement cycle and exit
    Measure,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("speedwatch: {e}");
            return ExitCode::from(2);
        }
    };

    if let Err(e) = speedwatch::logging::init(&config.logging, SystemClock.now().date()) {
        eprintln!("speedwatch: cannot set up logging: {e}");
        return ExitCode::from(2);
    }

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config).await,
        Commands::History { days } => history(&config, days).await,
        Commands::Measure => measure(&config).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "speedwatch failed");
            eprintln!("speedwatch: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let overrides = Overrides {
        mbits_threshold: cli.threshold,
        server_id: cli.server_id,
        storage_path: cli.db.clone(),
        no_color: cli.no_color,
    };
    Ok(Config::load(&cli.config)?.apply_overrides(&overrides)?)
}

fn build_scheduler(config: &Config) -> Result<Scheduler> {
    let repository = Arc::new(SqliteRepository::open(&config.storage.path)?);
    let source = Arc::new(SpeedtestCli::new(config.speedtest_settings()));
    let reporter = Arc::new(Reporter::stdout(config.mbits_threshold, config.color));
    Ok(Scheduler::new(repository, source, reporter))
}

async fn run(config: &Config) -> Result<ExitCode> {
    info!(
        server_id = config.speedtest.server_id,
        db = %config.storage.path.display(),
        threshold = config.mbits_threshold,
        "starting"
    );
    let mut handle = SchedulerHandle::new(build_scheduler(config)?);
    handle.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    handle.stop();
    handle.dispose().await?;
    Ok(ExitCode::SUCCESS)
}

async fn history(config: &Config, days: u32) -> Result<ExitCode> {
    build_scheduler(config)?.report_history(days).await?;
    Ok(ExitCode::SUCCESS)
}

async fn measure(config: &Config) -> Result<ExitCode> {
    let outcome = build_scheduler(config)?.run_cycle().await;
    Ok(if outcome.is_recorded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
