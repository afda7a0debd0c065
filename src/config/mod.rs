//! Configuration management for chat-etl.
//!
//! Values are layered: built-in defaults, then the user config file, then a
//! `.chat-etl.toml` in the working directory, then command-line flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EtlError, Result};
use crate::transform::TransformOptions;

/// Project-specific configuration filename.
pub const PROJECT_CONFIG_FILENAME: &str = ".chat-etl.toml";

/// Default working directory for extraction and partitioning.
pub const DEFAULT_WORK_DIR: &str = "chat-etl-work";

/// Default import file name.
pub const DEFAULT_OUTPUT_FILE: &str = "bulk-import.jsonl";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Transformation defaults.
    #[serde(default)]
    pub transform: TransformConfig,
    /// Output locations.
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from the default location, or defaults if absent.
    pub fn load() -> Result<Self> {
        let config_path = default_config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration with project-specific overrides.
    ///
    /// An explicit `path` replaces the default location and must exist.
    pub fn load_layered(path: Option<&Path>, project_dir: &Path) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };

        let project_config_path = project_dir.join(PROJECT_CONFIG_FILENAME);
        if project_config_path.exists() {
            let project_config = Self::load_from(&project_config_path)?;
            config.merge_from(&project_config);
        }

        Ok(config)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EtlError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                EtlError::io(format!("Failed to read config file: {}", path.display()), e)
            }
        })?;

        toml::from_str(&content).map_err(|e| EtlError::InvalidConfig {
            message: format!("{}: {e}", path.display()),
        })
    }

    /// Merge another config into this one (other takes precedence).
    ///
    /// Flags can only be switched on by a later layer.
    pub fn merge_from(&mut self, other: &Config) {
        let (t, o) = (&mut self.transform, &other.transform);
        if o.team.is_some() {
            t.team.clone_from(&o.team);
        }
        if o.default_email_domain.is_some() {
            t.default_email_domain.clone_from(&o.default_email_domain);
        }
        if o.attachments_dir.is_some() {
            t.attachments_dir.clone_from(&o.attachments_dir);
        }
        t.skip_markup |= o.skip_markup;
        t.skip_attachments |= o.skip_attachments;
        t.allow_download |= o.allow_download;
        t.discard_invalid_props |= o.discard_invalid_props;

        if other.output.work_dir != Path::new(DEFAULT_WORK_DIR) {
            self.output.work_dir.clone_from(&other.output.work_dir);
        }
        if other.output.output_file != Path::new(DEFAULT_OUTPUT_FILE) {
            self.output.output_file.clone_from(&other.output.output_file);
        }
    }
}

/// `[transform]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Team the export is imported into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    /// Domain for users without an email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_email_domain: Option<String>,
    /// Keep provider markup unconverted.
    #[serde(default)]
    pub skip_markup: bool,
    /// Drop all attachments.
    #[serde(default)]
    pub skip_attachments: bool,
    /// Download attachments missing from the archive.
    #[serde(default)]
    pub allow_download: bool,
    /// Drop oversized props instead of skipping the post.
    #[serde(default)]
    pub discard_invalid_props: bool,
    /// Copy attachments into this directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments_dir: Option<PathBuf>,
}

impl TransformConfig {
    /// Transformation options carrying these values.
    #[must_use]
    pub fn to_options(&self) -> TransformOptions {
        TransformOptions {
            skip_markup: self.skip_markup,
            skip_attachments: self.skip_attachments,
            allow_download: self.allow_download,
            default_email_domain: self.default_email_domain.clone(),
            discard_invalid_props: self.discard_invalid_props,
            attachments_dir: self.attachments_dir.clone(),
            download_token: None,
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Working directory for extraction and partitioning.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Import file to write.
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            output_file: default_output_file(),
        }
    }
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(DEFAULT_WORK_DIR)
}

fn default_output_file() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_FILE)
}

/// Get the default configuration path.
pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| EtlError::Unsupported {
        feature: "config directory discovery".to_string(),
    })?;

    Ok(config_dir.join("chat-etl").join("config.toml"))
}
