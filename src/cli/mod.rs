//! Command-line interface for chat-etl.
//!
//! Commands:
//! - `transform slack|telegram`: convert one export into an import file
//! - `grid-transform`: split a multi-team export into per-team archives
//! - `completions`: print a shell completion script

mod commands;

pub use commands::*;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

use crate::error::{EtlError, Result};

/// Convert Slack and Telegram exports into a bulk-import file.
#[derive(Debug, Parser)]
#[command(name = "chat-etl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Suppress the progress spinner and summary.
    #[arg(short = 'q', long, global = true, env = "CHAT_ETL_QUIET")]
    pub quiet: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "warn", env = "CHAT_ETL_LOG_LEVEL")]
    pub log_level: LogLevel,

    /// Log format (text, json, compact, pretty).
    #[arg(long, global = true, default_value = "text", env = "CHAT_ETL_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Log output file (default: stderr).
    #[arg(long, global = true, env = "CHAT_ETL_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Path to custom configuration file.
    #[arg(long, global = true, env = "CHAT_ETL_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Log level options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    /// Only errors.
    Error,
    /// Errors and warnings.
    #[default]
    Warn,
    /// Errors, warnings, and informational messages.
    Info,
    /// All of the above plus debug messages.
    Debug,
    /// All messages including trace-level details.
    Trace,
}

/// Log format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format.
    #[default]
    Text,
    /// Structured JSON format for machine consumption.
    Json,
    /// Compact single-line format.
    Compact,
    /// Pretty format with full details.
    Pretty,
}

impl LogLevel {
    /// Convert to tracing filter level.
    #[must_use]
    pub fn to_filter_string(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert a single-team export into a bulk-import file.
    #[command(alias = "t")]
    Transform {
        /// Export provider.
        #[command(subcommand)]
        provider: Provider,
    },

    /// Split a multi-team Slack export into one archive per team.
    #[command(name = "grid-transform", alias = "grid")]
    GridTransform(GridArgs),

    /// Generate shell completions.
    Completions(CompletionsArgs),
}

/// Supported export providers.
#[derive(Debug, Subcommand)]
pub enum Provider {
    /// Slack workspace export (zip or extracted directory).
    Slack(TransformArgs),
    /// Telegram Desktop chat export (zip or directory holding `result.json`).
    Telegram(TransformArgs),
}

/// Arguments shared by the provider transforms.
#[derive(Debug, Clone, clap::Args)]
pub struct TransformArgs {
    /// Export archive or directory.
    #[arg(short = 'f', long)]
    pub file: PathBuf,

    /// Team the export is imported into.
    #[arg(short = 't', long)]
    pub team: Option<String>,

    /// Import file to write.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Working directory for extracted archives.
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Copy attachments into this directory.
    #[arg(long)]
    pub attachments_dir: Option<PathBuf>,

    /// Domain for users without an email address.
    #[arg(long)]
    pub default_email_domain: Option<String>,

    /// Keep provider markup unconverted.
    #[arg(long)]
    pub skip_markup: bool,

    /// Drop all attachments.
    #[arg(long)]
    pub skip_attachments: bool,

    /// Download attachments missing from the export.
    #[arg(long)]
    pub allow_download: bool,

    /// Bearer token sent with attachment downloads.
    #[arg(long, env = "CHAT_ETL_DOWNLOAD_TOKEN", hide_env_values = true)]
    pub download_token: Option<String>,

    /// Drop oversized message props instead of skipping the message.
    #[arg(long)]
    pub discard_invalid_props: bool,

    /// JSON dump of existing server users to reconcile against.
    #[arg(long)]
    pub existing_users: Option<PathBuf>,
}

/// Arguments for the grid-transform command.
#[derive(Debug, Clone, clap::Args)]
pub struct GridArgs {
    /// Multi-team export archive.
    #[arg(short = 'f', long)]
    pub file: PathBuf,

    /// JSON object mapping team IDs to team names.
    #[arg(long)]
    pub teams: PathBuf,

    /// Working directory; team archives land in `<work-dir>/teams`.
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
}

/// Arguments for the completions command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for.
    #[arg(value_enum)]
    pub shell: CompletionShell,
}

/// Supported shells for completion generation.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CompletionShell {
    /// Bash shell.
    Bash,
    /// Zsh shell.
    Zsh,
    /// Fish shell.
    Fish,
    /// PowerShell.
    PowerShell,
    /// Elvish shell.
    Elvish,
}

impl From<CompletionShell> for Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Shell::Bash,
            CompletionShell::Zsh => Shell::Zsh,
            CompletionShell::Fish => Shell::Fish,
            CompletionShell::PowerShell => Shell::PowerShell,
            CompletionShell::Elvish => Shell::Elvish,
        }
    }
}

/// Generate shell completions to stdout.
pub fn generate_completions(shell: CompletionShell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(Shell::from(shell), &mut cmd, name, &mut io::stdout());
}

/// Initialize tracing/logging based on CLI options.
fn init_logging(cli: &Cli) -> Result<()> {
    use std::sync::Mutex;
    use tracing_subscriber::{
        fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
        layer::SubscriberExt,
        util::SubscriberInitExt,
        EnvFilter,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.to_filter_string()));

    let (writer, ansi) = match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| EtlError::io(format!("Failed to open log file: {}", path.display()), e))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let result = match cli.log_format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_span_events(FmtSpan::CLOSE)
                .with_file(true)
                .with_line_number(true)
                .with_writer(writer);
            tracing_subscriber::registry().with(filter).with(layer).try_init()
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_target(false)
                .with_ansi(ansi)
                .with_writer(writer);
            tracing_subscriber::registry().with(filter).with(layer).try_init()
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .pretty()
                .with_file(true)
                .with_line_number(true)
                .with_ansi(ansi)
                .with_writer(writer);
            tracing_subscriber::registry().with(filter).with(layer).try_init()
        }
        LogFormat::Text => {
            let layer = fmt::layer().with_ansi(ansi).with_writer(writer);
            tracing_subscriber::registry().with(filter).with(layer).try_init()
        }
    };

    if let Err(e) = result {
        eprintln!("Warning: Could not initialize logging: {e}");
    }
    Ok(())
}

/// Run the CLI application.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    match &cli.command {
        Commands::Transform { provider } => match provider {
            Provider::Slack(args) => commands::transform::run(&cli, args, commands::transform::Source::Slack),
            Provider::Telegram(args) => {
                commands::transform::run(&cli, args, commands::transform::Source::Telegram)
            }
        },
        Commands::GridTransform(args) => commands::grid::run(&cli, args),
        Commands::Completions(args) => {
            generate_completions(args.shell);
            Ok(())
        }
    }
}
