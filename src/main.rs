// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};

use subbatch::app_config::{self, Config, LogLevel, MODEL_PRESETS, API_KEY_ENV};
use subbatch::app_controller::{Controller, ExportFormat, FileOutcome, RunOptions};
use subbatch::translation::RunOutcome;

/// Exit status after a second Ctrl-C (128 + SIGINT)
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// What a Ctrl-C press does
#[derive(Debug, PartialEq, Eq)]
enum InterruptAction {
    Stop,
    Exit,
}

// @returns: Cooperative stop on the first press, exit on any later one
fn interrupt_action(presses: usize) -> InterruptAction {
    if presses <= 1 {
        InterruptAction::Stop
    } else {
        InterruptAction::Exit
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

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for ExportFormat to implement ValueEnum
#[derive(Debug, Clone, Default, ValueEnum)]
enum CliExportFormat {
    #[default]
    Auto,
    Srt,
    Tsv,
    Xlsx,
    Both,
}

impl From<CliExportFormat> for ExportFormat {
    fn from(cli_format: CliExportFormat) -> Self {
        match cli_format {
            CliExportFormat::Auto => ExportFormat::Auto,
            CliExportFormat::Srt => ExportFormat::Srt,
            CliExportFormat::Tsv => ExportFormat::Tsv,
            CliExportFormat::Xlsx => ExportFormat::Xlsx,
            CliExportFormat::Both => ExportFormat::Both,
        }
    }
}

/// Settings that override conf.json
#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Model display name or id (see `subbatch models`)
    #[arg(short, long)]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(short, long)]
    endpoint: Option<String>,

    /// API key
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    /// Target language (e.g. 'Vietnamese', 'French')
    #[arg(short, long)]
    target_language: Option<String>,

    /// Lines per request
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Requests in flight
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Input subtitle file (.srt, .tsv, .txt, .csv) or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    /// Export format (auto follows the input; both is srt and tsv)
    #[arg(long, value_enum, default_value_t = CliExportFormat::Auto)]
    format: CliExportFormat,

    #[command(flatten)]
    settings: ConfigArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate subtitle files (default command)
    Translate(TranslateArgs),

    /// Send a minimal request to check endpoint, key and model
    Check(ConfigArgs),

    /// Parse a file and print the detected lines without translating
    Parse {
        /// Input subtitle file
        #[arg(value_name = "INPUT_PATH")]
        input_path: PathBuf,
    },

    /// List the model presets
    Models,

    /// Generate shell completions for subbatch
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// subbatch - subtitle batch translation
///
/// Translates SRT files and `index<TAB>text` tables in batches through an
/// OpenAI-compatible chat-completion endpoint.
#[derive(Parser, Debug)]
#[command(name = "subbatch")]
#[command(version)]
#[command(about = "Batch subtitle translation over a chat-completion API")]
#[command(long_about = "subbatch sends subtitle lines in batches to an OpenAI-compatible endpoint and writes the translations back as SRT or TSV.

EXAMPLES:
    subbatch movie.srt                              # Translate using default config
    subbatch translate -f movie.srt                 # Force overwrite existing files
    subbatch translate -m \"Gemini 2.5 Pro\" movie.srt # Use a model preset
    subbatch translate -t French --format both lines.tsv
    subbatch translate -b 50 -j 5 /subtitles/      # Process an entire directory
    subbatch check                                  # Test the connection
    subbatch parse movie.srt                        # Show what would be translated
    subbatch completions bash > subbatch.bash      # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically. The API key may also come from SUBBATCH_API_KEY.

STOPPING:
    Ctrl-C stops after the batches already sent; finished batches are kept in a partial file
    and the next run resends only the missing lines. A second Ctrl-C quits immediately.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input subtitle file or directory to process
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    #[command(flatten)]
    settings: ConfigArgs,
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
        // The logger itself passes everything; log::set_max_level does the filtering
        let logger = Box::new(CustomLogger::new(LevelFilter::Trace));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI color for log level
    fn get_color_for_level(level: Level) -> &'static str {
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
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let emoji = Self::get_emoji_for_level(record.level());
            let color = Self::get_color_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "\x1B[{}m{} {} {}\x1B[0m", color, now, emoji, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the config says otherwise
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "subbatch", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Models) => {
            print_models();
            Ok(())
        }
        Some(Commands::Parse { input_path }) => print_parse(&input_path),
        Some(Commands::Check(settings)) => {
            let config = load_config(&settings)?;
            Controller::with_config(config)?.check_connection().await
        }
        Some(Commands::Translate(args)) => run_translate(args).await,
        None => {
            // Default behavior: top-level args act as `translate`
            let input_path = cli.input_path.ok_or_else(|| {
                anyhow!("INPUT_PATH is required when no subcommand is specified")
            })?;

            let translate_args = TranslateArgs {
                input_path,
                force_overwrite: cli.force_overwrite,
                format: CliExportFormat::Auto,
                settings: cli.settings,
            };
            run_translate(translate_args).await
        }
    }
}

/// Load or create conf.json, then apply command line overrides
fn load_config(settings: &ConfigArgs) -> Result<Config> {
    // Apply a command line log level before anything is logged
    if let Some(cli_level) = &settings.log_level {
        let level: LogLevel = cli_level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = Config::load_or_create(Path::new(&settings.config_path))?;

    if let Some(model) = &settings.model {
        config.model = model.clone();
    }
    if let Some(endpoint) = &settings.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(api_key) = &settings.api_key {
        config.api_key = api_key.clone();
    }
    if let Some(target_language) = &settings.target_language {
        config.target_language = target_language.clone();
    }
    if let Some(batch_size) = settings.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(concurrency) = settings.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(log_level) = &settings.log_level {
        config.log_level = log_level.clone().into();
    } else {
        log::set_max_level(config.log_level.to_level_filter());
    }

    config.validate()?;
    Ok(config)
}

async fn run_translate(args: TranslateArgs) -> Result<()> {
    let config = load_config(&args.settings)?;
    let controller = Controller::with_config(config)?;

    // First Ctrl-C asks for a cooperative stop; in-flight batches still finish.
    // A second one exits without waiting for them.
    let cancel = controller.cancellation();
    tokio::spawn(async move {
        let mut presses = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            presses += 1;
            match interrupt_action(presses) {
                InterruptAction::Stop => {
                    warn!("Stop requested, waiting for batches already sent (Ctrl-C again to quit now)...");
                    cancel.request_stop();
                }
                InterruptAction::Exit => {
                    error!("Interrupted, batches in flight are lost");
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
            }
        }
    });

    let options = RunOptions {
        force_overwrite: args.force_overwrite,
        format: args.format.into(),
    };

    if args.input_path.is_file() {
        let output_dir = args.input_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        match controller.run(args.input_path.clone(), output_dir, options).await? {
            FileOutcome::Skipped => info!("Nothing written"),
            FileOutcome::Finished { report, .. } => {
                if let RunOutcome::Failed(message) = report.outcome {
                    return Err(anyhow!(message));
                }
            }
        }
    } else if args.input_path.is_dir() {
        let summary = controller.run_folder(args.input_path.clone(), options).await?;
        if summary.errors > 0 {
            return Err(anyhow!("{} files failed", summary.errors));
        }
    } else {
        return Err(anyhow!("Input path does not exist: {:?}", args.input_path));
    }

    Ok(())
}

fn print_models() {
    println!("{:<30} MODEL ID", "NAME");
    for (display_name, model_id) in MODEL_PRESETS {
        let note = if app_config::is_image_model(model_id) { "  (image model)" } else { "" };
        println!("{:<30} {}{}", display_name, model_id, note);
    }
}

fn print_parse(input_path: &Path) -> Result<()> {
    let parsed = Controller::parse_file(input_path)?;
    info!("Detected {} format, {} lines", parsed.format, parsed.len());

    let mut stdout = std::io::stdout().lock();
    for unit in &parsed.units {
        writeln!(
            stdout,
            "{}\t{}\t{}",
            unit.index,
            unit.time_range.as_deref().unwrap_or("-"),
            unit.source_text
        )?;
    }
    Ok(())
}
