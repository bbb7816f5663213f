// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info, warn};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use titlewai::app_config::{self, Config, SourceConfig, TranslationProvider};
use titlewai::app_controller::Controller;
use titlewai::errors::{AppError, PipelineError};
use titlewai::translation::RunOutcome;

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Anthropic,
    Ollama,
    Mock,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::Mock => TranslationProvider::Mock,
        }
    }
}

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

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate catalogue titles (default command)
    #[command(alias = "translate")]
    Run(RunArgs),

    /// Inspect or maintain the translation cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },

    /// Generate shell completions for titlewai
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Show entry, hit and conflict counts
    Stats,

    /// Forget the cached translation of one title
    Invalidate {
        /// Source title, normalized the same way the pipeline does
        title: String,
    },

    /// Forget every cached translation for the target language
    Clear,

    /// List overwritten translations, newest first
    Conflicts {
        /// Maximum number of conflicts to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Args, Debug, Default, Clone)]
struct RunArgs {
    /// Input CSV with identifier and title columns
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output base path (`_translations.csv` is appended)
    #[arg(short, long)]
    output: Option<String>,

    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use for translation
    #[arg(short, long)]
    model: Option<String>,

    /// Number of titles translated concurrently
    #[arg(short, long)]
    workers: Option<usize>,

    /// Process at most this many titles
    #[arg(long)]
    limit: Option<usize>,

    /// Do not read or write the persistent cache
    #[arg(long)]
    no_cache: bool,
}

/// TitlewAI - catalogue title translation with AI
///
/// Reads bibliographic title records, translates each title with an AI
/// backend, and writes the enriched records as CSV.
#[derive(Parser, Debug)]
#[command(name = "titlewai")]
#[command(version)]
#[command(about = "AI-powered catalogue title translation")]
#[command(long_about = "TitlewAI reads title records from a CSV export or a SPARQL endpoint, translates
each title with an AI provider, and writes <base>_translations.csv.

EXAMPLES:
    titlewai                                   # Run with conf.json
    titlewai run -i tibetan_titles.csv --limit 10
    titlewai run -p ollama -m llama3.2:3b -w 8
    titlewai -t fr run                         # Translate into French
    titlewai cache stats                       # Inspect the translation cache
    titlewai cache invalidate \"བཀའ་འགྱུར།\"
    titlewai completions bash > titlewai.bash

CONFIGURATION:
    Configuration is stored in conf.json by default. If the config file doesn't
    exist, a default one will be created automatically. The Anthropic API key is
    read from the config, from ankey.txt, or from ANTHROPIC_API_KEY.

EXIT CODES:
    0 all titles processed    2 some titles failed
    3 cancelled, partial output written    1 run aborted")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "conf.json")]
    config_path: PathBuf,

    /// Source language code (e.g., 'bo')
    #[arg(short, long, global = true)]
    source_language: Option<String>,

    /// Target language code (e.g., 'en', 'fr')
    #[arg(short, long, global = true)]
    target_language: Option<String>,

    /// Set logging level
    #[arg(short, long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,
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
        let logger = Box::new(CustomLogger::new(LevelFilter::Trace));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Start at info; the config or the command line may change it
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    let command = cli.command.unwrap_or(Commands::Run(RunArgs::default()));

    if let Commands::Completions { shell } = command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "titlewai", &mut std::io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(level) = &cli.log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = Config::load_or_create(&cli.config_path)?;

    if let Some(source_lang) = &cli.source_language {
        config.source_language = source_lang.clone();
    }
    if let Some(target_lang) = &cli.target_language {
        config.target_language = target_lang.clone();
    }
    match &cli.log_level {
        Some(level) => config.log_level = level.clone().into(),
        None => log::set_max_level(config.log_level.to_level_filter()),
    }

    match command {
        Commands::Run(args) => run_translate(config, args).await,
        Commands::Cache { action } => Ok(run_cache_command(config, action).await?),
        Commands::Completions { .. } => Ok(ExitCode::SUCCESS),
    }
}

/// Apply run overrides to the loaded configuration
fn apply_run_args(config: &mut Config, args: &RunArgs) {
    if let Some(provider) = &args.provider {
        config.translation.provider = provider.clone().into();
    }
    if let Some(model) = &args.model {
        config.translation.active_provider_config_mut().model = model.clone();
    }
    if let Some(input) = &args.input {
        match &mut config.source {
            SourceConfig::Csv { path, .. } => *path = input.clone(),
            SourceConfig::Sparql { .. } => {
                warn!("--input given; reading {} instead of the configured SPARQL endpoint", input.display());
                config.source = SourceConfig::Csv {
                    path: input.clone(),
                    identifier_column: titlewai::source::csv_file::DEFAULT_IDENTIFIER_COLUMN.to_string(),
                    title_column: titlewai::source::csv_file::DEFAULT_TITLE_COLUMN.to_string(),
                };
            }
        }
    }
    if let Some(output) = &args.output {
        config.output.base = output.clone();
    }
    if let Some(workers) = args.workers {
        config.pipeline.workers = workers;
    }
    if args.limit.is_some() {
        config.pipeline.limit = args.limit;
    }
    if args.no_cache {
        config.cache.disabled = true;
    }
}

async fn run_translate(mut config: Config, args: RunArgs) -> Result<ExitCode> {
    apply_run_args(&mut config, &args);

    let controller = match Controller::with_config(config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("{:#}", e);
            return Ok(ExitCode::from(1));
        }
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after in-flight titles");
            signal_cancel.cancel();
        }
    });

    let summary = match controller.run(cancel).await {
        Ok(summary) => summary,
        Err(e) => {
            match AppError::from(e) {
                AppError::Pipeline(PipelineError::DuplicateRecord { identifier, .. }) => error!(
                    "Run aborted: identifier '{}' appears more than once in the source; nothing was written",
                    identifier
                ),
                other => error!("Run aborted: {}", other),
            }
            return Ok(ExitCode::from(1));
        }
    };

    info!(
        "{} of {} titles have a translation ({} from cache)",
        summary.completed(),
        summary.total,
        summary.cache_hits
    );

    Ok(match summary.outcome() {
        RunOutcome::Completed => ExitCode::SUCCESS,
        RunOutcome::CompletedWithFailures => ExitCode::from(2),
        RunOutcome::Partial => ExitCode::from(3),
    })
}

async fn run_cache_command(config: Config, action: CacheCommand) -> Result<ExitCode, AppError> {
    // Cache maintenance never calls a backend, so the key check is skipped
    let mut config = config;
    config.translation.provider = TranslationProvider::Mock;
    let controller = Controller::with_config(config)?;

    match action {
        CacheCommand::Stats => {
            println!("{}", controller.cache_stats().await?);
        }
        CacheCommand::Invalidate { title } => {
            if controller.cache_invalidate(&title).await? {
                info!("Removed cached translation for '{}'", title);
            } else {
                warn!("No cached translation for '{}'", title);
            }
        }
        CacheCommand::Clear => {
            let removed = controller.cache_clear().await?;
            info!("Removed {} cached translations", removed);
        }
        CacheCommand::Conflicts { limit } => {
            for conflict in controller.cache_conflicts(limit).await? {
                println!(
                    "{}\t{}\t{} -> {}",
                    conflict.recorded_at,
                    conflict.normalized_title,
                    conflict.previous_translation,
                    conflict.new_translation
                );
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
