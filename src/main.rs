// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use mtgateway::app_config::{LogLevel, Settings};
use mtgateway::errors::AppError;
use mtgateway::gateway::{BatchTranslationRequest, HtmlTranslationRequest, TranslationRequest};
use mtgateway::engines::with_cancellation_signal;
use mtgateway::{BuiltinStages, ConfigDocument, Gateway, Registry};

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

/// Language pair of a translation command
#[derive(Args, Debug)]
struct PairArgs {
    /// Source language tag (e.g., 'en', 'en_US')
    #[arg(short, long)]
    src: String,

    /// Target language tag (e.g., 'fr')
    #[arg(short, long)]
    tgt: String,

    /// Alt id selecting between competing models
    #[arg(short, long)]
    alt: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a single text
    Translate {
        #[command(flatten)]
        pair: PairArgs,

        /// Text to translate
        #[arg(value_name = "TEXT")]
        text: String,
    },

    /// Translate several texts independently
    Batch {
        #[command(flatten)]
        pair: PairArgs,

        /// Texts to translate
        #[arg(value_name = "TEXTS", required = true)]
        texts: Vec<String>,
    },

    /// Translate the paragraphs of an HTML file
    Html {
        #[command(flatten)]
        pair: PairArgs,

        /// HTML file to translate
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// List configured languages and the models serving each pair
    Languages,

    /// Build the registry and report loaded models and warnings
    Check,

    /// Generate shell completions for mtgateway
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// mtgateway - multi-backend machine translation gateway
///
/// Builds a model registry from a JSON configuration document and translates
/// through the pipeline serving the requested language pair.
#[derive(Parser, Debug)]
#[command(name = "mtgateway")]
#[command(version)]
#[command(about = "Multi-backend machine translation gateway")]
#[command(long_about = "mtgateway compiles translation pipelines from a JSON model configuration and runs them.

EXAMPLES:
    mtgateway check                                  # Load every model and show the pipelines
    mtgateway translate -s en -t fr 'Hello there.'   # Translate one text
    mtgateway batch -s en -t fr 'One.' 'Two.'        # Translate several texts
    mtgateway html -s en -t fr page.html             # Translate the paragraphs of a page
    mtgateway languages                              # List languages and models
    mtgateway completions bash > mtgateway.bash      # Generate bash completions

ENVIRONMENT:
    MT_API_CONFIG      configuration document
    MODELS_ROOT        directory holding the models
    MT_API_ENGINE_URL  inference endpoint of the remote engine")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration document (overrides MT_API_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Models root directory (overrides MODELS_ROOT)
    #[arg(short, long, global = true)]
    models_root: Option<PathBuf>,

    /// Remote engine inference URL (overrides MT_API_ENGINE_URL)
    #[arg(long, global = true)]
    engine_url: Option<String>,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
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
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour and tag for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("1;31", "ERROR"),
            Level::Warn => ("1;33", "WARN "),
            Level::Info => ("1;32", "INFO "),
            Level::Debug => ("1;36", "DEBUG"),
            Level::Trace => ("1;35", "TRACE"),
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
            let (colour, tag) = Self::style_for_level(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {} {}\x1B[0m",
                colour, now, tag, record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    CustomLogger::init(LevelFilter::Trace)?;

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "mtgateway", &mut std::io::stdout());
        return Ok(());
    }

    let settings = settings_from(&cli)?;
    log::set_max_level(settings.log_level.to_level_filter());

    let registry = Arc::new(load_registry(&settings).await?);
    let gateway = Gateway::new(registry.clone());

    match cli.command {
        Commands::Translate { pair, text } => {
            let request = TranslationRequest {
                src: pair.src,
                tgt: pair.tgt,
                alt: pair.alt,
                text,
            };
            let response = gateway.translate(&request).await.map_err(AppError::from)?;
            print_json(&response)?;
        }
        Commands::Batch { pair, texts } => {
            let request = BatchTranslationRequest {
                src: pair.src,
                tgt: pair.tgt,
                alt: pair.alt,
                texts,
            };
            let response = gateway.translate_batch(&request).await.map_err(AppError::from)?;
            print_json(&response)?;
        }
        Commands::Html { pair, file } => {
            let html = std::fs::read_to_string(&file)
                .map_err(AppError::from)
                .with_context(|| format!("Failed to read HTML file: {:?}", file))?;
            let request = HtmlTranslationRequest {
                src: pair.src,
                tgt: pair.tgt,
                alt: pair.alt,
                html,
            };
            let response = gateway.translate_html(&request).await.map_err(AppError::from)?;
            println!("{}", response.translation);
        }
        Commands::Languages => print_json(&gateway.languages())?,
        Commands::Check => {
            for message in registry.messages() {
                println!("{}", message);
            }
            info!("{} model(s) loaded, {} warning(s)", registry.len(), registry.warnings().len());
            if registry.is_empty() {
                warn!("No model could be loaded");
            }
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Environment settings with command line overrides applied
fn settings_from(cli: &CommandLineOptions) -> Result<Settings> {
    let mut settings = Settings::from_env();

    if let Some(config) = &cli.config {
        settings.config_path = config.clone();
    }
    if let Some(models_root) = &cli.models_root {
        settings.models_root = models_root.clone();
    }
    if let Some(url) = &cli.engine_url {
        settings.engine_url = url.clone();
    }
    if let Some(level) = &cli.log_level {
        settings.log_level = level.clone().into();
    }

    settings.validate().context("Configuration validation failed")?;
    Ok(settings)
}

/// Build the registry, aborting pending readiness checks on Ctrl-C
async fn load_registry(settings: &Settings) -> Result<Registry> {
    let document = ConfigDocument::load(&settings.config_path).map_err(AppError::from)?;

    // Ctrl-C only cancels readiness polling while the registry is built
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let registry = with_cancellation_signal(ctrl_c, |cancel| async move {
        let stages = BuiltinStages::new(settings.clone()).with_cancellation(cancel);
        Registry::build(&document, &settings.models_root, &stages).await
    })
    .await
    .map_err(AppError::from)?;
    Ok(registry)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize response")?;
    println!("{}", json);
    Ok(())
}
