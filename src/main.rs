//! Roovision - changelog extraction from Roo Code orchestrator conversations.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use roovision::changelog::{ChangelogWriter, RecordSink};
use roovision::config::{ConfigError, ConfigLoader, RoovisionConfig};
use roovision::display;
use roovision::extract::{Extractor, NoBackfill};
use roovision::format::Formatter;
use roovision::ledger::{Ledger, LedgerError};
use roovision::processor::{ChangelogProcessor, Dispatcher, ProcessorStats};
use roovision::watcher::{discover_conversation_files, TaskWatcher, WatcherError};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Parser)]
#[command(
    name = "roovision",
    about = "Automated changelog extraction for Roo Code",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to load instead of the default search paths.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the tasks folder and write a changelog per completed subtask.
    Run {
        /// Roo Code tasks folder to watch.
        #[arg(long)]
        tasks_path: Option<PathBuf>,
        /// Directory for changelog files.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Directory for the processed-ID ledger.
        #[arg(long)]
        ledger: Option<PathBuf>,
    },
    /// Print every subtask found in one conversation file.
    Scan {
        /// Conversation file to scan from the start.
        file: PathBuf,
        /// Print full instruction and result text.
        #[arg(long)]
        full: bool,
    },
    /// Print the effective configuration.
    Config,
}

#[derive(thiserror::Error, Debug)]
enum AppError {
    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Watcher(#[from] WatcherError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to listen for shutdown signal: {0}")]
    Signal(std::io::Error),

    #[error("Dispatcher task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

/// Load the config and report which file it came from, if any.
fn load_config(path: Option<PathBuf>) -> Result<(RoovisionConfig, Option<PathBuf>), AppError> {
    let loader = match path {
        Some(path) if !path.exists() => return Err(AppError::ConfigNotFound(path)),
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    Ok((loader.load()?, loader.find_config_file()))
}

async fn run(config: RoovisionConfig) -> Result<ProcessorStats, AppError> {
    config.validate().map_err(ConfigError::from)?;
    display::print_banner();
    display::print_config(&config);

    let ledger = Ledger::open(
        &config.ledger_path,
        config.max_log_file_size_bytes,
        config.log_rotation_count,
    )?;
    std::fs::create_dir_all(&config.output_path).map_err(|source| AppError::CreateDir {
        path: config.output_path.clone(),
        source,
    })?;
    let writer: Arc<dyn RecordSink> = Arc::new(ChangelogWriter::new(&config.output_path));
    let processor = Arc::new(ChangelogProcessor::new(&config, ledger, writer));

    let max_age = (config.max_file_age_days > 0)
        .then(|| Duration::from_secs(config.max_file_age_days.saturating_mul(SECONDS_PER_DAY)));
    let discovery =
        discover_conversation_files(&config.tasks_path, &config.conversation_filename, max_age)?;
    for file in &discovery.files {
        if let Err(e) = processor.initialize_file(file) {
            tracing::warn!(path = %file.display(), error = %e, "Failed to baseline file");
        }
    }

    let (watcher, events) = TaskWatcher::new(
        config.tasks_path.clone(),
        &config.conversation_filename,
        Duration::from_millis(config.debounce_ms),
    )?;
    display::print_startup(
        discovery.files.len(),
        discovery.skipped_old,
        processor.processed_count(),
    );

    let cancel = CancellationToken::new();
    let dispatcher = tokio::spawn(Dispatcher::new(Arc::clone(&processor), cancel.clone()).run(events));

    let signal = tokio::signal::ctrl_c().await;
    tracing::info!("Stopping");
    cancel.cancel();
    watcher.stop();
    let stats = dispatcher.await?;
    signal.map_err(AppError::Signal)?;
    Ok(stats)
}

fn scan(config: &RoovisionConfig, file: &Path, full: bool) -> Result<usize, AppError> {
    let bytes = std::fs::read(file).map_err(|source| AppError::Read {
        path: file.to_path_buf(),
        source,
    })?;
    let extraction = Extractor::new().extract(&bytes, 0, &mut NoBackfill);
    let formatter = Formatter::new();
    let now = chrono::Utc::now();

    for raw in &extraction.records {
        display::print_record(&formatter.format(raw, now), full);
    }
    if extraction.dropped > 0 {
        tracing::warn!(dropped = extraction.dropped, "Some results had no matching instruction");
    }
    let skipped = extraction
        .records
        .iter()
        .filter(|r| !config.emits_mode(r.mode))
        .count();
    println!(
        "{} subtask(s) found, {} in skipped modes, {} unpaired",
        extraction.records.len(),
        skipped,
        extraction.dropped
    );
    Ok(extraction.records.len())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let (mut config, source) = match load_config(cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            display::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Run {
            tasks_path,
            output,
            ledger,
        } => {
            if let Some(path) = tasks_path {
                config.tasks_path = path;
            }
            if let Some(path) = output {
                config.output_path = path;
            }
            if let Some(path) = ledger {
                config.ledger_path = path;
            }
            run(config).await.map(|stats| display::print_stats(&stats))
        }
        Commands::Scan { file, full } => scan(&config, &file, full).map(|_| ()),
        Commands::Config => {
            match source {
                Some(path) => println!("Loaded from {}", path.display()),
                None => println!("No config file found, using defaults"),
            }
            display::print_config(&config);
            config.validate().map_err(|e| AppError::Config(e.into()))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            display::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
