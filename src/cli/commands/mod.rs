//! CLI command implementations.
//!
//! Each command is implemented in its own module with a `run` function
//! that handles the command logic.

pub mod grid;
pub mod transform;

use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::archive::{ArchiveIo, ExtractOutcome, ZipArchiveIo};
use crate::cli::Cli;
use crate::config::Config;
use crate::error::{EtlError, Result};

/// Load the layered configuration for the current directory.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let cwd = std::env::current_dir().map_err(|e| EtlError::io("Failed to read current directory", e))?;
    Config::load_layered(cli.config.as_deref(), &cwd)
}

/// Directory holding the export's files.
///
/// Directories are used in place; archives are extracted under `work_dir`
/// into a directory named after the archive, reusing an earlier extraction.
pub fn prepare_export(file: &Path, work_dir: &Path) -> Result<PathBuf> {
    if file.is_dir() {
        return Ok(file.to_path_buf());
    }
    if !file.is_file() {
        return Err(EtlError::FileNotFound {
            path: file.to_path_buf(),
        });
    }

    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export".to_string());
    let dest = work_dir.join(stem);
    match ZipArchiveIo::new().extract(file, &dest)? {
        ExtractOutcome::Extracted { files } => info!(files, dest = %dest.display(), "Archive extracted"),
        ExtractOutcome::AlreadyExtracted => info!(dest = %dest.display(), "Reusing extracted archive"),
    }
    Ok(dest)
}

/// A spinner on stderr, unless quiet or not attached to a terminal.
pub fn spinner(cli: &Cli, message: &str) -> Option<ProgressBar> {
    if cli.quiet || !console::Term::stderr().is_term() {
        return None;
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    Some(spinner)
}

/// Update the spinner message, if any.
pub fn step(spinner: Option<&ProgressBar>, message: &str) {
    if let Some(spinner) = spinner {
        spinner.set_message(message.to_string());
    }
}
