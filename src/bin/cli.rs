//! Sort Order Probe CLI
//!
//! Walks the configured listing once per environment and reports whether it
//! is really sorted newest-first.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use sortprobe::{
    error::{AppError, Result},
    models::Config,
    pipeline,
    services::timestamp,
    storage::LocalStorage,
    utils,
};

/// Exit status for configuration problems detected before any run.
const EXIT_CONFIG_ERROR: u8 = 2;

/// sortprobe - listing sort order probe
#[derive(Parser, Debug)]
#[command(
    name = "sortprobe",
    version,
    about = "Verify that a live paginated listing is sorted newest-first"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "sortprobe.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe every selected environment (default)
    Run(RunArgs),

    /// Validate the configuration file
    Validate,

    /// Normalize a single raw timestamp
    Normalize {
        /// Raw timestamp text, e.g. "5 minutes ago"
        raw: String,

        /// Reference instant (RFC 3339), defaults to now
        #[arg(long)]
        now: Option<String>,
    },
}

#[derive(clap::Args, Debug, Default)]
struct RunArgs {
    /// Items to collect per environment
    #[arg(long)]
    target: Option<usize>,

    /// Environment id to run; repeat for several (default: all)
    #[arg(long = "env")]
    env: Vec<String>,

    /// Consecutive page-level errors before a run aborts
    #[arg(long)]
    max_errors: Option<usize>,

    /// Hard cap on pages visited per environment
    #[arg(long)]
    max_pages: Option<usize>,

    /// Directory for report files
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl RunArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(target) = self.target {
            config.probe.target_count = target;
        }
        if let Some(max_errors) = self.max_errors {
            config.probe.max_consecutive_errors = max_errors;
        }
        if let Some(max_pages) = self.max_pages {
            config.probe.max_pages = max_pages;
        }
        if let Some(output) = &self.output {
            config.output.report_dir = output.display().to_string();
        }
    }
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let command = cli.command.unwrap_or(Command::Run(RunArgs::default()));
    let outcome = match command {
        Command::Run(args) => run(&cli.config, &args).await,
        Command::Validate => validate(&cli.config).map(|()| 0),
        Command::Normalize { raw, now } => normalize(&raw, now.as_deref()).map(|()| 0),
    };

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            log::error!("{}", e);
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

async fn run(config_path: &Path, args: &RunArgs) -> Result<u8> {
    let mut config = Config::load_or_default(config_path);
    args.apply(&mut config);
    config.validate()?;

    let environments = config.select_environments(&args.env)?;
    utils::log::set_enabled(config.output.console_enabled);

    let storage = LocalStorage::new(&config.output.report_dir);
    let report = pipeline::run_probe(Arc::new(config), &environments, &storage).await?;

    let code = report.summary.exit_code();
    log::info!(
        "Probe finished: {} violation(s) across {} run(s)",
        report.summary.total_violations,
        report.summary.total_runs
    );
    Ok(u8::try_from(code).unwrap_or(1))
}

fn validate(config_path: &Path) -> Result<()> {
    log::info!("Validating {}...", config_path.display());

    let config = Config::load(config_path)?;
    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }

    log::info!("✓ Config OK");
    log::info!("  start url:    {}", config.site.start_url);
    log::info!("  target:       {} items", config.probe.target_count);
    log::info!(
        "  budgets:      {} pages, {} consecutive errors",
        config.probe.max_pages,
        config.probe.max_consecutive_errors
    );
    let ids: Vec<&str> = config.environments.iter().map(|e| e.id.as_str()).collect();
    log::info!("  environments: {}", ids.join(", "));
    Ok(())
}

fn normalize(raw: &str, now: Option<&str>) -> Result<()> {
    let now = match now {
        Some(now) => DateTime::parse_from_rfc3339(now)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| AppError::validation(format!("invalid --now '{}': {}", now, e)))?,
        None => Utc::now(),
    };

    match timestamp::normalize(raw, now) {
        Ok(instant) => println!("{}", timestamp::to_stable_string(&instant)),
        Err(failure) => {
            log::warn!("{}", failure);
            println!("unparsed");
        }
    }
    Ok(())
}
