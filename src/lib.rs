//! chat-etl: convert chat-platform exports into a bulk-import file.
//!
//! Slack workspace exports and Telegram chat exports are parsed, normalised
//! into one canonical model and written as newline-delimited JSON in the
//! target platform's bulk-import schema. Exports spanning several teams are
//! first split into one archive per team.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use chat_etl::archive::DirSource;
//! use chat_etl::export::BulkExporter;
//! use chat_etl::parser::{ParseOptions, SlackParser};
//! use chat_etl::transform::{EmojiTable, TransformOptions, Transformer};
//!
//! fn main() -> chat_etl::Result<()> {
//!     let mut source = DirSource::open("slack-export")?;
//!     let export = SlackParser::new(ParseOptions::new("acme")).parse(&mut source)?;
//!
//!     let emoji = EmojiTable::builtin();
//!     let options = TransformOptions::default().with_default_email_domain("acme.io");
//!     let model = Transformer::new(&emoji, options, "slack-export")?.transform_slack(&export)?;
//!
//!     BulkExporter::new().export_to_file(&model, "bulk-import.jsonl")?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`archive`]: export sources and zip extraction/packaging
//! - [`parser`]: provider adapters producing provider-native exports
//! - [`transform`]: business rules producing the canonical [`model`]
//! - [`partition`]: splitting multi-team exports per team
//! - [`export`]: the newline-delimited import writer
//! - [`directory`]: reconciliation with existing server accounts
//! - [`cli`]: command-line interface
//! - [`config`]: configuration management
//! - [`error`]: error types and handling

#![doc(html_root_url = "https://docs.rs/chat-etl/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod archive;
pub mod cli;
pub mod config;
pub mod directory;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod partition;
pub mod transform;
pub mod util;

// Re-export commonly used types at the crate root
pub use error::{EtlError, Result};
pub use model::Intermediate;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::archive::{DirSource, ExportSource, MemorySource, ZipArchiveIo, ZipSource};
    pub use crate::error::{EtlError, Result};
    pub use crate::export::BulkExporter;
    pub use crate::model::{Channel, ChannelType, Intermediate, Post, PostTarget, Reply, User};
    pub use crate::parser::{ParseOptions, SlackParser, TelegramParser};
    pub use crate::partition::{TeamMap, TeamPartitioner};
    pub use crate::transform::{EmojiTable, TransformOptions, Transformer};
}
