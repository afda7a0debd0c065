//! Transform command implementation.
//!
//! Parses one export, transforms it, optionally reconciles users against an
//! existing server dump, and writes the import file.

use std::path::PathBuf;

use tracing::info;

use crate::archive::DirSource;
use crate::cli::{Cli, TransformArgs};
use crate::config::Config;
use crate::directory::{reconcile_users, JsonUserDirectory};
use crate::error::{EtlError, Result};
use crate::export::BulkExporter;
use crate::model::Intermediate;
use crate::parser::{ParseOptions, SlackParser, TelegramParser};
use crate::transform::{EmojiTable, TransformOptions, Transformer};

use super::{load_config, prepare_export, spinner, step};

/// Export provider selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Slack workspace export.
    Slack,
    /// Telegram chat export.
    Telegram,
}

/// Effective settings after layering config and flags.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Team name.
    pub team: String,
    /// Import file.
    pub output: PathBuf,
    /// Working directory.
    pub work_dir: PathBuf,
    /// Transformation options.
    pub options: TransformOptions,
}

impl Settings {
    /// Layer command-line flags over the configuration.
    pub fn resolve(config: &Config, args: &TransformArgs) -> Result<Self> {
        let team = args
            .team
            .clone()
            .or_else(|| config.transform.team.clone())
            .ok_or_else(|| EtlError::InvalidArgument {
                name: "team".to_string(),
                reason: "pass --team or set transform.team in the config file".to_string(),
            })?;

        let mut options = config.transform.to_options();
        options.skip_markup |= args.skip_markup;
        options.skip_attachments |= args.skip_attachments;
        options.allow_download |= args.allow_download;
        options.discard_invalid_props |= args.discard_invalid_props;
        if args.default_email_domain.is_some() {
            options.default_email_domain.clone_from(&args.default_email_domain);
        }
        if args.attachments_dir.is_some() {
            options.attachments_dir.clone_from(&args.attachments_dir);
        }
        options.download_token.clone_from(&args.download_token);

        Ok(Self {
            team,
            output: args.output.clone().unwrap_or_else(|| config.output.output_file.clone()),
            work_dir: args.work_dir.clone().unwrap_or_else(|| config.output.work_dir.clone()),
            options,
        })
    }
}

/// Run the transform command.
pub fn run(cli: &Cli, args: &TransformArgs, source: Source) -> Result<()> {
    let config = load_config(cli)?;
    let settings = Settings::resolve(&config, args)?;
    let progress = spinner(cli, "Reading export...");

    let root = prepare_export(&args.file, &settings.work_dir)?;
    let mut entries = DirSource::open(&root)?;
    let parse_options = ParseOptions::new(&settings.team).with_skip_markup(settings.options.skip_markup);

    let emoji = EmojiTable::builtin();
    let transformer = Transformer::new(&emoji, settings.options.clone(), &root)?;

    let mut model: Intermediate = match source {
        Source::Slack => {
            let export = SlackParser::new(parse_options).parse(&mut entries)?;
            step(progress.as_ref(), "Transforming messages...");
            transformer.transform_slack(&export)?
        }
        Source::Telegram => {
            let export = TelegramParser::new(parse_options).parse(&mut entries)?;
            step(progress.as_ref(), "Transforming messages...");
            transformer.transform_telegram(&export)?
        }
    };

    if let Some(path) = &args.existing_users {
        step(progress.as_ref(), "Reconciling users...");
        let directory = JsonUserDirectory::load(path)?;
        let report = reconcile_users(&mut model, &directory);
        info!(
            renamed = report.renamed.len(),
            conflicts = report.conflicts.len(),
            matched = report.matched,
            "User reconciliation complete"
        );
    }

    step(progress.as_ref(), "Writing import file...");
    let stats = BulkExporter::new().export_to_file(&model, &settings.output)?;

    if let Some(progress) = progress {
        progress.finish_and_clear();
    }
    if !cli.quiet {
        eprintln!(
            "Wrote {} lines ({} channels, {} users, {} posts) to {}",
            stats.lines(),
            stats.channels + stats.direct_channels,
            stats.users,
            stats.posts + stats.direct_posts,
            settings.output.display()
        );
    }

    Ok(())
}
