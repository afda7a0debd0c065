//! Error types for chat-etl.
//!
//! Errors fall into three tiers. Fatal errors (malformed archive structure,
//! unreadable required files, I/O during extraction or relocation) travel up
//! as [`EtlError`] and end the run. Per-record problems are logged and the
//! record is skipped at the call site. Degraded conditions (unknown markup,
//! unmapped emoji) never produce an error at all.

use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for chat-etl operations.
#[derive(Error, Debug)]
pub enum EtlError {
    /// A required top-level entry is missing from the export.
    #[error("Export is missing required entry: {name}")]
    MissingEntry {
        /// Entry name relative to the export root.
        name: String,
    },

    /// A top-level export file exists but has the wrong shape.
    #[error("Invalid export file {name}: {reason}")]
    InvalidExport {
        /// Entry name relative to the export root.
        name: String,
        /// Reason why the file was rejected.
        reason: String,
    },

    /// JSON parsing of an export entry failed.
    #[error("Failed to parse {name}: {message}")]
    ParseError {
        /// Entry or file being parsed.
        name: String,
        /// Human-readable error message.
        message: String,
        /// Underlying serde_json error.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// File not found.
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Directory not found.
    #[error("Directory not found: {path}")]
    DirectoryNotFound {
        /// Path to the missing directory.
        path: PathBuf,
    },

    /// Reading or writing a zip archive failed.
    #[error("Archive error: {context}")]
    ArchiveError {
        /// Context describing the operation that failed.
        context: String,
        /// Underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },

    /// No message in a channel directory declares a team ID.
    #[error("Team ID not found for channel {channel}")]
    TeamIdNotFound {
        /// Channel name (or ID for direct channels).
        channel: String,
    },

    /// A team ID has no entry in the supplied team map.
    #[error("Team name not found for team ID {team_id}")]
    TeamNameNotFound {
        /// The unmapped team ID.
        team_id: String,
    },

    /// Downloading an attachment failed.
    #[error("Download failed for {url}: {message}")]
    DownloadError {
        /// URL that was requested.
        url: String,
        /// Human-readable error message.
        message: String,
    },

    /// Export error.
    #[error("Export failed: {message}")]
    ExportError {
        /// Human-readable error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {context}")]
    IoError {
        /// Context describing the operation that failed.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Serialization error.
    #[error("Serialization error: {context}")]
    SerializationError {
        /// Context describing the operation that failed.
        context: String,
        /// Underlying serde_json error.
        #[source]
        source: serde_json::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Human-readable error message.
        message: String,
    },

    /// Invalid argument.
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument {
        /// Name of the invalid argument.
        name: String,
        /// Reason why the argument is invalid.
        reason: String,
    },

    /// Unsupported operation or feature.
    #[error("Unsupported: {feature}")]
    Unsupported {
        /// Name of the unsupported feature.
        feature: String,
    },
}

impl EtlError {
    /// Create a new parse error with source.
    #[must_use]
    pub fn parse(name: impl Into<String>, source: serde_json::Error) -> Self {
        Self::ParseError {
            name: name.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a new invalid-export error.
    #[must_use]
    pub fn invalid_export(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidExport {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a new I/O error with context.
    #[must_use]
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoError {
            context: context.into(),
            source,
        }
    }

    /// Create a new archive error with context.
    #[must_use]
    pub fn archive(context: impl Into<String>, source: zip::result::ZipError) -> Self {
        Self::ArchiveError {
            context: context.into(),
            source,
        }
    }

    /// Create a new export error.
    #[must_use]
    pub fn export(message: impl Into<String>) -> Self {
        Self::ExportError {
            message: message.into(),
        }
    }

    /// Get the exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ParseError { .. } | Self::InvalidExport { .. } | Self::MissingEntry { .. } => {
                exit_codes::EXIT_DATA_ERROR
            }
            Self::FileNotFound { .. } | Self::DirectoryNotFound { .. } => {
                exit_codes::EXIT_FILE_NOT_FOUND
            }
            Self::InvalidConfig { .. } => exit_codes::EXIT_CONFIG_ERROR,
            Self::InvalidArgument { .. } => exit_codes::EXIT_USAGE_ERROR,
            Self::ExportError { .. } => exit_codes::EXIT_EXPORT_ERROR,
            Self::IoError { .. } | Self::ArchiveError { .. } => exit_codes::EXIT_IO_ERROR,
            _ => exit_codes::EXIT_GENERAL_ERROR,
        }
    }

    /// Check if this error only affects a single record.
    ///
    /// The partitioner skips a channel on these instead of aborting.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::TeamIdNotFound { .. } | Self::TeamNameNotFound { .. } | Self::DownloadError { .. }
        )
    }
}

/// Result type alias for chat-etl operations.
pub type Result<T> = std::result::Result<T, EtlError>;

impl From<std::io::Error> for EtlError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            context: "I/O operation failed".to_string(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for EtlError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError {
            context: "JSON operation failed".to_string(),
            source: err,
        }
    }
}

impl From<zip::result::ZipError> for EtlError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::ArchiveError {
            context: "Zip operation failed".to_string(),
            source: err,
        }
    }
}

/// Exit codes for CLI operations.
pub mod exit_codes {
    /// Operation completed successfully.
    pub const EXIT_SUCCESS: i32 = 0;
    /// General/unspecified error.
    pub const EXIT_GENERAL_ERROR: i32 = 1;
    /// Specified file or directory not found.
    pub const EXIT_FILE_NOT_FOUND: i32 = 3;
    /// Invalid configuration.
    pub const EXIT_CONFIG_ERROR: i32 = 5;
    /// Export operation failed.
    pub const EXIT_EXPORT_ERROR: i32 = 6;
    /// Invalid command-line usage (BSD standard).
    pub const EXIT_USAGE_ERROR: i32 = 64;
    /// Input data format error (BSD standard).
    pub const EXIT_DATA_ERROR: i32 = 65;
    /// I/O error (BSD standard).
    pub const EXIT_IO_ERROR: i32 = 74;
}
