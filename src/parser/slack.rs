//! Slack export adapter.
//!
//! A Slack export is a directory tree:
//!
//! ```text
//! channels.json   public channels (required)
//! groups.json     private channels
//! mpims.json      group direct messages
//! dms.json        direct messages
//! users.json      users (required)
//! general/2024-01-01.json     messages, one file per day
//! D0123ABCD/2024-01-01.json   DM messages live under the channel ID
//! __uploads/F0123/photo.png   bundled files, when the export has them
//! ```
//!
//! Channel kind comes from which listing a descriptor appears in.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::archive::{ExportSource, PROGRESS_EVERY};
use crate::error::{EtlError, Result};
use crate::model::ChannelType;

use super::{null_default, parse_records, read_json, read_optional_json, ParseOptions, ParseStats};

/// Public channel listing.
pub const CHANNELS_FILE: &str = "channels.json";
/// Private channel listing.
pub const GROUPS_FILE: &str = "groups.json";
/// Group DM listing.
pub const MPIMS_FILE: &str = "mpims.json";
/// DM listing.
pub const DMS_FILE: &str = "dms.json";
/// User listing.
pub const USERS_FILE: &str = "users.json";
/// Directory holding bundled uploads.
pub const UPLOADS_DIR: &str = "__uploads";

/// The listing file for a channel kind.
#[must_use]
pub const fn listing_file(kind: ChannelType) -> &'static str {
    match kind {
        ChannelType::Open => CHANNELS_FILE,
        ChannelType::Private => GROUPS_FILE,
        ChannelType::Group => MPIMS_FILE,
        ChannelType::Direct => DMS_FILE,
    }
}

/// A `{"value": ...}` wrapper used for purpose and topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackChannelSub {
    /// The text.
    #[serde(default, deserialize_with = "null_default")]
    pub value: String,
}

/// A channel descriptor from one of the listing files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackChannel {
    /// Channel ID.
    pub id: String,
    /// Channel name (absent for DMs).
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    /// Creator user ID.
    #[serde(default, deserialize_with = "null_default")]
    pub creator: String,
    /// Member user IDs.
    #[serde(default, deserialize_with = "null_default")]
    pub members: Vec<String>,
    /// Purpose.
    #[serde(default, deserialize_with = "null_default")]
    pub purpose: SlackChannelSub,
    /// Topic.
    #[serde(default, deserialize_with = "null_default")]
    pub topic: SlackChannelSub,
}

impl SlackChannel {
    /// Directory holding this channel's message files.
    ///
    /// DMs are stored under their ID, everything else under its name.
    #[must_use]
    pub fn directory(&self, kind: ChannelType) -> &str {
        if kind == ChannelType::Direct || self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Profile block of a Slack user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackProfile {
    /// Full name.
    #[serde(default, deserialize_with = "null_default")]
    pub real_name: String,
    /// First name.
    #[serde(default, deserialize_with = "null_default")]
    pub first_name: String,
    /// Last name.
    #[serde(default, deserialize_with = "null_default")]
    pub last_name: String,
    /// Job title.
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    /// Email address.
    #[serde(default, deserialize_with = "null_default")]
    pub email: String,
    /// Full-size avatar URL.
    #[serde(default)]
    pub image_original: Option<String>,
    /// 512px avatar URL.
    #[serde(default)]
    pub image_512: Option<String>,
    /// Bot ID for bot users.
    #[serde(default)]
    pub bot_id: Option<String>,
}

/// A user from `users.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackUser {
    /// User ID.
    pub id: String,
    /// Unique handle.
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    /// Deactivated.
    #[serde(default, deserialize_with = "null_default")]
    pub deleted: bool,
    /// Bot account.
    #[serde(default, deserialize_with = "null_default")]
    pub is_bot: bool,
    /// Profile.
    #[serde(default, deserialize_with = "null_default")]
    pub profile: SlackProfile,
}

/// A file attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackFile {
    /// File ID.
    #[serde(default, deserialize_with = "null_default")]
    pub id: String,
    /// Original file name.
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    /// Title.
    #[serde(default, deserialize_with = "null_default")]
    pub title: String,
    /// Authenticated download URL.
    #[serde(default)]
    pub url_private_download: Option<String>,
    /// Authenticated URL.
    #[serde(default)]
    pub url_private: Option<String>,
    /// `tombstone`, `hidden_by_limit`, ... for files that are not available.
    #[serde(default)]
    pub mode: Option<String>,
}

impl SlackFile {
    /// Whether the file body is unavailable in the export.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self.mode.as_deref(), Some("tombstone" | "hidden_by_limit"))
    }

    /// Best URL to fetch the file from.
    #[must_use]
    pub fn download_url(&self) -> Option<&str> {
        self.url_private_download
            .as_deref()
            .or(self.url_private.as_deref())
    }
}

/// A reaction on a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackReaction {
    /// Emoji short name.
    #[serde(default, deserialize_with = "null_default")]
    pub name: String,
    /// User IDs that reacted.
    #[serde(default, deserialize_with = "null_default")]
    pub users: Vec<String>,
    /// Reaction count.
    #[serde(default, deserialize_with = "null_default")]
    pub count: u32,
}

/// A message from a channel's day file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlackPost {
    /// Author user ID.
    #[serde(default, deserialize_with = "null_default")]
    pub user: String,
    /// Bot ID for bot messages.
    #[serde(default)]
    pub bot_id: Option<String>,
    /// Bot display name.
    #[serde(default)]
    pub username: Option<String>,
    /// Message text.
    #[serde(default, deserialize_with = "null_default")]
    pub text: String,
    /// Timestamp, `"<secs>.<micros>"`.
    #[serde(default, deserialize_with = "null_default")]
    pub ts: String,
    /// Subtype, empty for regular messages.
    #[serde(default, deserialize_with = "null_default")]
    pub subtype: String,
    /// Parent timestamp for threaded messages.
    #[serde(default)]
    pub thread_ts: Option<String>,
    /// Attached files.
    #[serde(default, deserialize_with = "null_default")]
    pub files: Vec<SlackFile>,
    /// Legacy message attachments.
    #[serde(default, deserialize_with = "null_default")]
    pub attachments: Vec<Value>,
    /// Reactions.
    #[serde(default, deserialize_with = "null_default")]
    pub reactions: Vec<SlackReaction>,
    /// Workspace the message was posted from (grid exports).
    #[serde(default, deserialize_with = "null_default")]
    pub team: String,
}

impl SlackPost {
    /// Whether this message replies to another one.
    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.thread_ts
            .as_deref()
            .is_some_and(|parent| !parent.is_empty() && parent != self.ts)
    }
}

/// Convert a Slack timestamp to milliseconds.
///
/// Returns `None` for malformed input.
#[must_use]
pub fn parse_slack_timestamp(ts: &str) -> Option<i64> {
    let (secs, frac) = match ts.split_once('.') {
        Some((s, f)) => (s, f),
        None => (ts, ""),
    };
    let secs: i64 = secs.parse().ok()?;
    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let millis: String = frac.chars().chain(std::iter::repeat('0')).take(3).collect();
    let millis: i64 = millis.parse().ok()?;
    secs.checked_mul(1000)?.checked_add(millis)
}

/// A parsed Slack export.
#[derive(Debug, Clone, Default)]
pub struct SlackExport {
    /// Team from the parse options.
    pub team: String,
    /// Public channels.
    pub public_channels: Vec<SlackChannel>,
    /// Private channels.
    pub private_channels: Vec<SlackChannel>,
    /// Group DMs.
    pub group_channels: Vec<SlackChannel>,
    /// DMs.
    pub direct_channels: Vec<SlackChannel>,
    /// Users.
    pub users: Vec<SlackUser>,
    /// Messages keyed by channel ID, in file then array order.
    pub posts: IndexMap<String, Vec<SlackPost>>,
    /// Bundled upload entry names keyed by file ID.
    pub uploads: IndexMap<String, String>,
    /// Parse statistics.
    pub stats: ParseStats,
}

impl SlackExport {
    /// Channels of one kind.
    #[must_use]
    pub fn channels(&self, kind: ChannelType) -> &[SlackChannel] {
        match kind {
            ChannelType::Open => &self.public_channels,
            ChannelType::Private => &self.private_channels,
            ChannelType::Group => &self.group_channels,
            ChannelType::Direct => &self.direct_channels,
        }
    }

    /// Messages for a channel ID.
    #[must_use]
    pub fn posts_for(&self, channel_id: &str) -> &[SlackPost] {
        self.posts
            .get(channel_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Parser for Slack exports.
#[derive(Debug, Clone, Default)]
pub struct SlackParser {
    options: ParseOptions,
}

impl SlackParser {
    /// Create a parser.
    #[must_use]
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    /// Parse an export.
    #[instrument(skip_all, fields(team = %self.options.team))]
    pub fn parse(&self, source: &mut dyn ExportSource) -> Result<SlackExport> {
        let mut export = SlackExport {
            team: self.options.team.clone(),
            ..SlackExport::default()
        };

        if !source.contains(CHANNELS_FILE) {
            return Err(EtlError::MissingEntry {
                name: CHANNELS_FILE.to_string(),
            });
        }
        if !source.contains(USERS_FILE) {
            return Err(EtlError::MissingEntry {
                name: USERS_FILE.to_string(),
            });
        }

        export.public_channels = read_json(source, CHANNELS_FILE)?;
        export.private_channels = read_optional_json(source, GROUPS_FILE)?.unwrap_or_default();
        export.group_channels = read_optional_json(source, MPIMS_FILE)?.unwrap_or_default();
        export.direct_channels = read_optional_json(source, DMS_FILE)?.unwrap_or_default();
        export.users = read_json(source, USERS_FILE)?;

        debug!(
            public = export.public_channels.len(),
            private = export.private_channels.len(),
            group = export.group_channels.len(),
            direct = export.direct_channels.len(),
            users = export.users.len(),
            "Read Slack listings"
        );

        // Message directory -> channel ID
        let mut directories: IndexMap<String, String> = IndexMap::new();
        for kind in ChannelType::ALL {
            for channel in export.channels(kind) {
                directories
                    .entry(channel.directory(kind).to_string())
                    .or_insert_with(|| channel.id.clone());
            }
        }

        let names = source.entry_names();
        let total = names.len();
        let mut stats = ParseStats::default();
        for (index, name) in names.iter().enumerate() {
            if (index + 1) % PROGRESS_EVERY == 0 {
                info!(processed = index + 1, total, "Parsing Slack export");
            }

            let Some((dir, rest)) = name.split_once('/') else {
                continue;
            };

            if dir == UPLOADS_DIR {
                if let Some((file_id, _)) = rest.split_once('/') {
                    export
                        .uploads
                        .entry(file_id.to_string())
                        .or_insert_with(|| name.clone());
                }
                continue;
            }

            if rest.contains('/') || !rest.ends_with(".json") {
                continue;
            }

            let Some(channel_id) = directories.get(dir) else {
                debug!(entry = %name, "Message file does not belong to a listed channel");
                continue;
            };

            if let Some(posts) = parse_records::<SlackPost>(source, name, &mut stats) {
                export
                    .posts
                    .entry(channel_id.clone())
                    .or_default()
                    .extend(posts);
            }
        }

        if stats.messages_skipped > 0 || stats.files_skipped > 0 {
            warn!(
                files_skipped = stats.files_skipped,
                messages_skipped = stats.messages_skipped,
                "Some Slack messages could not be parsed"
            );
        }
        info!(
            files = stats.files_read,
            messages = stats.messages_parsed,
            uploads = export.uploads.len(),
            "Parsed Slack export"
        );
        export.stats = stats;
        Ok(export)
    }
}
