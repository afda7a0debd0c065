//! Provider parsers.
//!
//! Each adapter reads a provider export through an [`ExportSource`] and
//! produces a provider-native export object. Nothing here applies business
//! rules: mention rewriting, markup conversion and validation happen in
//! [`crate::transform`].
//!
//! # Parsing tolerance
//!
//! - Required top-level listings that are missing or malformed abort the run.
//! - A message file that is not a JSON array is skipped with a warning.
//! - A single message that does not fit the expected shape is skipped with a
//!   warning; its siblings are kept.
//!
//! ```rust
//! use chat_etl::archive::MemorySource;
//! use chat_etl::parser::{ParseOptions, SlackParser};
//!
//! let mut source = MemorySource::new()
//!     .with_entry("channels.json", "[]")
//!     .with_entry("users.json", "[]");
//! let export = SlackParser::new(ParseOptions::new("acme")).parse(&mut source)?;
//! assert!(export.public_channels.is_empty());
//! # Ok::<(), chat_etl::EtlError>(())
//! ```

pub mod slack;
pub mod telegram;
pub mod text;

pub use slack::*;
pub use telegram::*;
pub use text::*;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::archive::ExportSource;
use crate::error::{EtlError, Result};

/// Options shared by all provider parsers.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Team the export will be imported into.
    pub team: String,
    /// Keep message text as plain strings instead of styled spans.
    pub skip_markup: bool,
}

impl ParseOptions {
    /// Create options for a team.
    pub fn new(team: impl Into<String>) -> Self {
        Self {
            team: team.into(),
            skip_markup: false,
        }
    }

    /// Builder: skip markup conversion.
    #[must_use]
    pub fn with_skip_markup(mut self, skip: bool) -> Self {
        self.skip_markup = skip;
        self
    }
}

/// Statistics about a parse run.
#[derive(Debug, Clone, Default)]
pub struct ParseStats {
    /// Message files read.
    pub files_read: usize,
    /// Message files skipped as unreadable.
    pub files_skipped: usize,
    /// Messages parsed.
    pub messages_parsed: usize,
    /// Messages skipped as malformed.
    pub messages_skipped: usize,
    /// Per-record problems encountered.
    pub errors: Vec<ParseError>,
}

/// A per-record parse problem.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Entry name.
    pub entry: String,
    /// Index inside the entry, when the problem is a single message.
    pub index: Option<usize>,
    /// Error message.
    pub message: String,
}

impl ParseStats {
    fn skip_file(&mut self, entry: &str, message: impl Into<String>) {
        let message = message.into();
        warn!(entry, error = %message, "Skipping unreadable message file");
        self.files_skipped += 1;
        self.errors.push(ParseError {
            entry: entry.to_string(),
            index: None,
            message,
        });
    }

    fn skip_message(&mut self, entry: &str, index: usize, message: impl Into<String>) {
        let message = message.into();
        warn!(entry, index, error = %message, "Skipping malformed message");
        self.messages_skipped += 1;
        self.errors.push(ParseError {
            entry: entry.to_string(),
            index: Some(index),
            message,
        });
    }
}

/// Read and deserialize a required JSON entry.
pub fn read_json<T: DeserializeOwned>(source: &mut dyn ExportSource, name: &str) -> Result<T> {
    let bytes = source.read_entry(name)?;
    serde_json::from_slice(&bytes).map_err(|e| EtlError::parse(name, e))
}

/// Read an optional JSON entry; absent entries yield `None`.
pub fn read_optional_json<T: DeserializeOwned>(
    source: &mut dyn ExportSource,
    name: &str,
) -> Result<Option<T>> {
    if !source.contains(name) {
        return Ok(None);
    }
    read_json(source, name).map(Some)
}

/// Parse a JSON array entry element by element, skipping malformed elements.
///
/// Returns `None` when the entry itself is not a JSON array.
pub(crate) fn parse_records<T: DeserializeOwned>(
    source: &mut dyn ExportSource,
    name: &str,
    stats: &mut ParseStats,
) -> Option<Vec<T>> {
    let bytes = match source.read_entry(name) {
        Ok(bytes) => bytes,
        Err(e) => {
            stats.skip_file(name, e.to_string());
            return None;
        }
    };

    let values: Vec<Value> = match serde_json::from_slice(&bytes) {
        Ok(values) => values,
        Err(e) => {
            stats.skip_file(name, e.to_string());
            return None;
        }
    };

    stats.files_read += 1;
    Some(parse_values(values, name, stats))
}

/// Deserialize each value, skipping the ones that do not fit.
pub(crate) fn parse_values<T: DeserializeOwned>(
    values: Vec<Value>,
    name: &str,
    stats: &mut ParseStats,
) -> Vec<T> {
    let mut records = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value(value) {
            Ok(record) => {
                stats.messages_parsed += 1;
                records.push(record);
            }
            Err(e) => stats.skip_message(name, index, e.to_string()),
        }
    }
    records
}

/// Deserialize `null` as the type's default.
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Deserialize an ID that may be a JSON number or string.
pub(crate) fn id_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, found {other}"
        ))),
    }
}

/// Like [`id_string`] but for optional fields.
pub(crate) fn opt_id_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let id = id_string(deserializer)?;
    Ok(if id.is_empty() { None } else { Some(id) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemorySource;

    #[derive(Debug, Deserialize)]
    struct Item {
        id: u32,
    }

    #[test]
    fn test_parse_records_skips_bad_elements() {
        let mut source = MemorySource::new().with_entry("a.json", r#"[{"id":1},{"id":"x"},{"id":3}]"#);
        let mut stats = ParseStats::default();

        let items: Vec<Item> = parse_records(&mut source, "a.json", &mut stats).unwrap();

        assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(stats.messages_parsed, 2);
        assert_eq!(stats.messages_skipped, 1);
        assert_eq!(stats.errors[0].index, Some(1));
    }

    #[test]
    fn test_parse_records_rejects_non_array() {
        let mut source = MemorySource::new().with_entry("a.json", r#"{"id":1}"#);
        let mut stats = ParseStats::default();

        let items: Option<Vec<Item>> = parse_records(&mut source, "a.json", &mut stats);

        assert!(items.is_none());
        assert_eq!(stats.files_skipped, 1);
    }

    #[test]
    fn test_read_optional_json_absent() {
        let mut source = MemorySource::new();
        let value: Option<Vec<Item>> = read_optional_json(&mut source, "groups.json").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_read_json_malformed_is_fatal() {
        let mut source = MemorySource::new().with_entry("channels.json", "{not json");
        let result: Result<Vec<Item>> = read_json(&mut source, "channels.json");
        assert!(matches!(result, Err(EtlError::ParseError { .. })));
    }
}
