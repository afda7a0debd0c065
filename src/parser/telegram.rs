//! Telegram chat export adapter.
//!
//! Telegram Desktop writes one chat as a single `result.json` document next
//! to its media folders (`photos/`, `files/`, `stickers/`, ...). Media paths
//! inside the document are relative to that document's directory.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::archive::ExportSource;
use crate::error::{EtlError, Result};

use super::{id_string, null_default, opt_id_string, parse_values, MessageText, ParseOptions, ParseStats};

/// Name of the chat document.
pub const RESULT_FILE: &str = "result.json";

/// A reacting user listed under a reaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TelegramReactor {
    /// Display name.
    #[serde(default)]
    pub from: Option<String>,
    /// Opaque user ID such as `user12345`.
    #[serde(default, deserialize_with = "opt_id_string")]
    pub from_id: Option<String>,
    /// When the reaction was made.
    #[serde(default)]
    pub date: Option<String>,
}

/// A reaction on a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TelegramReaction {
    /// `emoji`, `custom_emoji`, `paid`, ...
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Total count.
    #[serde(default)]
    pub count: u32,
    /// The Unicode emoji for `emoji` reactions.
    #[serde(default)]
    pub emoji: Option<String>,
    /// Sticker document backing a custom emoji.
    #[serde(default)]
    pub document_id: Option<String>,
    /// Most recent reactors.
    #[serde(default, deserialize_with = "null_default")]
    pub recent: Vec<TelegramReactor>,
}

/// One message or service event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TelegramMessage {
    /// Message ID, unique within the chat.
    pub id: i64,
    /// `message` or `service`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Local time, ISO 8601 without offset.
    #[serde(default)]
    pub date: String,
    /// Unix seconds as a string.
    #[serde(default)]
    pub date_unixtime: Option<String>,
    /// Author display name.
    #[serde(default)]
    pub from: Option<String>,
    /// Author ID.
    #[serde(default, deserialize_with = "opt_id_string")]
    pub from_id: Option<String>,
    /// Service message actor display name.
    #[serde(default)]
    pub actor: Option<String>,
    /// Service message actor ID.
    #[serde(default, deserialize_with = "opt_id_string")]
    pub actor_id: Option<String>,
    /// Service action such as `invite_members`.
    #[serde(default)]
    pub action: Option<String>,
    /// New title for `edit_group_title`.
    #[serde(default)]
    pub title: Option<String>,
    /// Message text.
    #[serde(default)]
    pub text: MessageText,
    /// Parent message ID.
    #[serde(default)]
    pub reply_to_message_id: Option<i64>,
    /// Photo path.
    #[serde(default)]
    pub photo: Option<String>,
    /// File path.
    #[serde(default)]
    pub file: Option<String>,
    /// `sticker`, `voice_message`, `video_file`, ...
    #[serde(default)]
    pub media_type: Option<String>,
    /// Emoji a sticker stands for.
    #[serde(default)]
    pub sticker_emoji: Option<String>,
    /// Reactions.
    #[serde(default, deserialize_with = "null_default")]
    pub reactions: Vec<TelegramReaction>,
}

impl TelegramMessage {
    /// Whether this is a service event rather than a user message.
    #[must_use]
    pub fn is_service(&self) -> bool {
        self.kind == "service"
    }

    /// The acting user: author for messages, actor for service events.
    #[must_use]
    pub fn author_id(&self) -> Option<&str> {
        if self.is_service() {
            self.actor_id.as_deref().or(self.from_id.as_deref())
        } else {
            self.from_id.as_deref()
        }
    }

    /// Display name of the acting user.
    #[must_use]
    pub fn author_name(&self) -> Option<&str> {
        if self.is_service() {
            self.actor.as_deref().or(self.from.as_deref())
        } else {
            self.from.as_deref()
        }
    }
}

/// A parsed Telegram chat export.
#[derive(Debug, Clone, Default)]
pub struct TelegramExport {
    /// Team from the parse options.
    pub team: String,
    /// Chat name.
    pub name: String,
    /// Chat type such as `private_supergroup`.
    pub chat_type: String,
    /// Chat ID.
    pub id: String,
    /// Messages in document order.
    pub messages: Vec<TelegramMessage>,
    /// Directory of `result.json` inside the source, `""` for the root.
    pub base_dir: String,
    /// Parse statistics.
    pub stats: ParseStats,
}

impl TelegramExport {
    /// Resolve a media path from the document to an entry name.
    #[must_use]
    pub fn entry_path(&self, relative: &str) -> String {
        if self.base_dir.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{}", self.base_dir, relative)
        }
    }
}

#[derive(Deserialize)]
struct RawChat {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type", default)]
    chat_type: String,
    #[serde(default, deserialize_with = "id_string")]
    id: String,
    messages: Option<Vec<Value>>,
}

/// Parser for Telegram chat exports.
#[derive(Debug, Clone, Default)]
pub struct TelegramParser {
    options: ParseOptions,
}

impl TelegramParser {
    /// Create a parser.
    #[must_use]
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    /// Locate `result.json`, preferring the shallowest one.
    fn find_document(source: &dyn ExportSource) -> Result<String> {
        source
            .entry_names()
            .into_iter()
            .filter(|n| n == RESULT_FILE || n.ends_with(&format!("/{RESULT_FILE}")))
            .min_by_key(|n| (n.matches('/').count(), n.clone()))
            .ok_or_else(|| EtlError::MissingEntry {
                name: RESULT_FILE.to_string(),
            })
    }

    /// Parse an export.
    #[instrument(skip_all, fields(team = %self.options.team))]
    pub fn parse(&self, source: &mut dyn ExportSource) -> Result<TelegramExport> {
        let document = Self::find_document(source)?;
        let bytes = source.read_entry(&document)?;
        let raw: RawChat = serde_json::from_slice(&bytes).map_err(|e| EtlError::parse(&document, e))?;

        let Some(values) = raw.messages else {
            return Err(EtlError::invalid_export(&document, "missing messages array"));
        };

        let mut stats = ParseStats {
            files_read: 1,
            ..ParseStats::default()
        };
        let mut messages: Vec<TelegramMessage> = parse_values(values, &document, &mut stats);
        if self.options.skip_markup {
            for message in &mut messages {
                message.text = std::mem::take(&mut message.text).into_plain();
            }
        }

        let base_dir = document
            .rsplit_once('/')
            .map(|(dir, _)| dir.to_string())
            .unwrap_or_default();

        debug!(document = %document, chat_type = %raw.chat_type, "Read Telegram document");
        info!(
            messages = stats.messages_parsed,
            skipped = stats.messages_skipped,
            "Parsed Telegram export"
        );

        Ok(TelegramExport {
            team: self.options.team.clone(),
            name: raw.name.unwrap_or_default(),
            chat_type: raw.chat_type,
            id: raw.id,
            messages,
            base_dir,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemorySource;

    const CHAT: &str = r#"{
        "name": "Rust Club",
        "type": "private_supergroup",
        "id": 1234567,
        "messages": [
            {"id": 1, "type": "service", "date": "2024-01-01T10:00:00", "date_unixtime": "1704103200",
             "actor": "Alice", "actor_id": "user1", "action": "invite_members", "members": ["Bob"], "text": ""},
            {"id": 2, "type": "message", "date": "2024-01-01T10:01:00", "date_unixtime": "1704103260",
             "from": "Alice", "from_id": "user1", "text": ["hello ", {"type": "bold", "text": "world"}],
             "reactions": [{"type": "emoji", "count": 1, "emoji": "👍", "recent": [{"from": "Bob", "from_id": "user2", "date": "2024-01-01T10:02:00"}]}]},
            {"id": "bad"},
            {"id": 3, "type": "message", "date": "2024-01-01T10:03:00", "from": "Bob", "from_id": "user2",
             "text": "reply", "reply_to_message_id": 2, "photo": "photos/photo_1.jpg"}
        ]
    }"#;

    #[test]
    fn test_parse_chat() {
        let mut source = MemorySource::new().with_entry("ChatExport/result.json", CHAT);
        let export = TelegramParser::new(ParseOptions::new("acme"))
            .parse(&mut source)
            .unwrap();

        assert_eq!(export.name, "Rust Club");
        assert_eq!(export.id, "1234567");
        assert_eq!(export.base_dir, "ChatExport");
        assert_eq!(export.messages.len(), 3);
        assert_eq!(export.stats.messages_skipped, 1);

        let service = &export.messages[0];
        assert!(service.is_service());
        assert_eq!(service.author_id(), Some("user1"));

        let hello = &export.messages[1];
        assert_eq!(hello.text.flatten(), "hello world");
        assert_eq!(hello.reactions[0].recent[0].from_id.as_deref(), Some("user2"));

        let reply = &export.messages[2];
        assert_eq!(reply.reply_to_message_id, Some(2));
        assert_eq!(
            export.entry_path(reply.photo.as_deref().unwrap()),
            "ChatExport/photos/photo_1.jpg"
        );
    }

    #[test]
    fn test_skip_markup_flattens_text() {
        let mut source = MemorySource::new().with_entry(RESULT_FILE, CHAT);
        let export = TelegramParser::new(ParseOptions::new("acme").with_skip_markup(true))
            .parse(&mut source)
            .unwrap();

        assert_eq!(
            export.messages[1].text,
            MessageText::PlainText("hello world".into())
        );
        assert_eq!(export.base_dir, "");
    }

    #[test]
    fn test_missing_document() {
        let mut source = MemorySource::new().with_entry("photos/a.jpg", "x");
        let err = TelegramParser::default().parse(&mut source).unwrap_err();
        assert!(matches!(err, EtlError::MissingEntry { .. }));
    }

    #[test]
    fn test_missing_messages_is_structural_error() {
        let mut source = MemorySource::new().with_entry(RESULT_FILE, r#"{"name":"x","type":"personal_chat","id":1}"#);
        let err = TelegramParser::default().parse(&mut source).unwrap_err();
        assert!(matches!(err, EtlError::InvalidExport { .. }));
    }
}
