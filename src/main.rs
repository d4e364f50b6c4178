// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};

use maktaba::app_config::{self, Config};
use maktaba::catalog::ItemClass;
use maktaba::app_controller::{watch_interrupts, InterruptAction};
use maktaba::transliteration::CancellationFlag;
use maktaba::Controller;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for ItemClass to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliItemClass {
    Authors,
    Books,
    Categories,
}

impl From<CliItemClass> for ItemClass {
    fn from(cli_class: CliItemClass) -> Self {
        match cli_class {
            CliItemClass::Authors => ItemClass::Authors,
            CliItemClass::Books => ItemClass::Books,
            CliItemClass::Categories => ItemClass::Categories,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Transliterate catalog names that do not have a transliteration yet
    Transliterate,

    /// Send existing transliterations back for review and merge corrections
    Verify,

    /// Bundle the stored transliterations into a master.en.json file
    Export {
        /// Output file
        #[arg(short, long, default_value = "master.en.json")]
        output: PathBuf,
    },

    /// Show one catalog item and its transliteration from a library in the data directory
    Lookup {
        /// Library name under <data_dir>/libraries
        library: String,

        /// Item class
        #[arg(value_enum)]
        class: CliItemClass,

        /// Item id
        id: u64,
    },

    /// Generate shell completions for maktaba
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Maktaba - AI-assisted transliteration of a library catalog
#[derive(Parser, Debug)]
#[command(name = "maktaba")]
#[command(version)]
#[command(about = "AI-assisted transliteration of library catalog names")]
#[command(long_about = "Maktaba transliterates the Arabic names of authors, books and categories with Gemini.

EXAMPLES:
    maktaba transliterate                        # Process every class from master.json
    maktaba --class books transliterate          # Only books
    maktaba --chunk-size 100 verify              # Review stored transliterations
    maktaba export -o master.en.json             # Bundle the results
    maktaba lookup shamela authors 1             # Look up one item
    maktaba completions bash > maktaba.bash      # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically. API keys are read from GOOGLE_API_KEY
    (comma-separated) or gemini.api_keys in the config file.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,

    /// Comma-separated Gemini API keys
    #[arg(long, global = true, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_keys: Option<String>,

    /// Gemini model name
    #[arg(short, long, global = true, env = "GEMINI_MODEL")]
    model: Option<String>,

    /// Items per request
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Item classes to process (repeatable)
    #[arg(long = "class", global = true, value_enum)]
    classes: Vec<CliItemClass>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and emoji for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "❌ "),
            Level::Warn => ("\x1B[1;33m", "🚧 "),
            Level::Info => ("\x1B[1;32m", " "),
            Level::Debug => ("\x1B[1;36m", "🔍 "),
            Level::Trace => ("\x1B[1;35m", "📋 "),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, emoji) = Self::style_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "{}{} {} {}\x1B[0m", color, now, emoji, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The logger accepts everything; log::set_max_level does the filtering
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "maktaba", &mut std::io::stdout());
        return Ok(());
    }

    if let Some(cmd_log_level) = &cli.log_level {
        let level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level.into());
    }

    let config = load_config(&cli)?;
    if cli.log_level.is_none() {
        log::set_max_level(config.log_level.into());
    }

    let controller = Controller::with_config(config)?;

    spawn_interrupt_handler(controller.cancellation());

    match cli.command {
        Commands::Transliterate => {
            for summary in controller.run_transliteration(cli.api_keys.as_deref()).await? {
                info!(
                    "{}: {} total, {} already done, {} committed, {} chunks failed, {} orphans removed{}",
                    summary.class,
                    summary.total,
                    summary.already_done,
                    summary.items_committed,
                    summary.chunks_failed,
                    summary.orphans_removed,
                    if summary.cancelled { " (cancelled)" } else { "" }
                );
            }
        }
        Commands::Verify => {
            for summary in controller.run_verification(cli.api_keys.as_deref()).await? {
                info!(
                    "{}: {} chunks, {} clean, {} corrections, {} failed{}",
                    summary.class,
                    summary.chunks,
                    summary.chunks_clean,
                    summary.corrections,
                    summary.chunks_failed,
                    if summary.cancelled { " (cancelled)" } else { "" }
                );
            }
        }
        Commands::Export { output } => {
            controller.export(&output)?;
        }
        Commands::Lookup { library, class, id } => {
            let class: ItemClass = class.into();
            match controller.lookup(&library, class, id)? {
                Some(found) => println!(
                    "{}\t{}\t{}",
                    found.item.id,
                    found.item.name,
                    found.transliteration.as_deref().unwrap_or("-")
                ),
                None => warn!("No {} with id {} in '{}'", class, id, library),
            }
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Exit code used when a second interrupt aborts the process
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Watch Ctrl-C in the background: the first one cancels, the second one exits
fn spawn_interrupt_handler(cancellation: CancellationFlag) {
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, cancellation).await == InterruptAction::ForceExit {
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    });
}

/// Load the config file, creating a default one when missing, then apply CLI overrides
fn load_config(cli: &CommandLineOptions) -> Result<Config> {
    let config_path = Path::new(&cli.config_path);

    let mut config = if config_path.exists() {
        Config::from_file(config_path)?
    } else {
        warn!("Config file not found at '{}', creating default config.", cli.config_path);
        let config = Config::default();
        config.save(config_path)
            .with_context(|| format!("Failed to write default config to file: {}", cli.config_path))?;
        config
    };

    if let Some(log_level) = &cli.log_level {
        config.log_level = log_level.clone().into();
    }

    if let Some(model) = &cli.model {
        config.gemini.model = model.clone();
    }

    if let Some(chunk_size) = cli.chunk_size {
        config.transliteration.chunk_size = chunk_size;
    }

    if !cli.classes.is_empty() {
        config.transliteration.classes = cli.classes.iter().map(|c| (*c).into()).collect();
    }

    config.validate()
        .context("Configuration validation failed")?;

    Ok(config)
}
