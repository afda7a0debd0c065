//! Telegram chat export to canonical model.

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::model::{Channel, ChannelType, Intermediate, Post, PostTarget, Reaction, Reply, Team, User};
use crate::parser::{TelegramExport, TelegramMessage};
use crate::util::truncate_chars;

use super::markup::render_telegram_text;
use super::names::{
    derive_email, sanitize_channel_name, split_full_name, ChannelNames, Usernames, MAX_DISPLAY_NAME,
};
use super::posts::{finalize_post, ThreadAssembler, TimestampRegistry, SENTINEL_TIMESTAMP};
use super::slack::MAX_GROUP_MEMBERS;
use super::{push_reaction, AttachmentRequest, NameIndex, TransformStats, Transformer};

const FILE_NOT_INCLUDED: &str = "(File not included";
const ANIMATED_STICKER_EXTENSIONS: [&str; 2] = [".tgs", ".webm"];

/// Channel kind for a Telegram chat type.
#[must_use]
pub fn chat_kind(chat_type: &str) -> ChannelType {
    match chat_type {
        "personal_chat" | "bot_chat" | "saved_messages" => ChannelType::Direct,
        "private_group" | "private_supergroup" | "private_channel" => ChannelType::Private,
        "public_supergroup" | "public_channel" => ChannelType::Open,
        other => {
            warn!(chat_type = other, "Unknown chat type, importing as private channel");
            ChannelType::Private
        }
    }
}

/// Message time in milliseconds.
fn message_timestamp(message: &TelegramMessage) -> i64 {
    if let Some(secs) = message
        .date_unixtime
        .as_deref()
        .and_then(|s| s.trim().parse::<i64>().ok())
    {
        return secs.saturating_mul(1000);
    }
    match NaiveDateTime::parse_from_str(&message.date, "%Y-%m-%dT%H:%M:%S") {
        Ok(naive) => naive.and_utc().timestamp_millis(),
        Err(_) => {
            warn!(message_id = message.id, date = %message.date, "Malformed timestamp, using sentinel");
            SENTINEL_TIMESTAMP
        }
    }
}

fn service_post_type(action: &str) -> Option<&'static str> {
    match action {
        "invite_members" | "join_group_by_link" => Some("system_join_channel"),
        "remove_members" => Some("system_leave_channel"),
        "edit_group_title" => Some("system_displayname_change"),
        _ => None,
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn is_animated_sticker(message: &TelegramMessage, path: &str) -> bool {
    message.media_type.as_deref() == Some("sticker")
        && ANIMATED_STICKER_EXTENSIONS
            .iter()
            .any(|ext| path.to_ascii_lowercase().ends_with(ext))
}

/// Every participant, in order of first appearance, with a display name.
fn discover_users(export: &TelegramExport) -> IndexMap<String, String> {
    let mut users: IndexMap<String, String> = IndexMap::new();
    let mut note = |id: Option<&str>, name: Option<&str>| {
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            let entry = users.entry(id.to_string()).or_default();
            if entry.is_empty() {
                *entry = name.unwrap_or_default().to_string();
            }
        }
    };

    for message in &export.messages {
        note(message.author_id(), message.author_name());
        for reaction in &message.reactions {
            for reactor in &reaction.recent {
                note(reactor.from_id.as_deref(), reactor.from.as_deref());
            }
        }
    }
    users
}

impl Transformer<'_> {
    /// Transform a parsed Telegram chat export.
    #[instrument(skip_all, fields(team = %export.team, chat = %export.name))]
    pub fn transform_telegram(&self, export: &TelegramExport) -> Result<Intermediate> {
        let mut model = Intermediate::new(Team::new(&export.team));
        let mut index = NameIndex::new();

        let mut usernames = Usernames::new();
        for (id, display) in discover_users(export) {
            let username = usernames.allocate(&id);
            let mut user = User::new(&id, &username);
            (user.first_name, user.last_name) = split_full_name(&display);
            user.email = derive_email(None, &username, self.default_domain());
            index.insert_user(&id, &username);
            model.users.insert(id, user);
        }

        let Some(target) = Self::telegram_channel(export, &mut model, &mut index) else {
            model.populate_memberships();
            return Ok(model);
        };
        info!(users = model.users.len(), post_target = ?target, "Transformed Telegram chat");

        let mut stats = TransformStats::default();
        let mut threads = ThreadAssembler::new();
        for message in &export.messages {
            stats.tick();
            let Some(post) = self.telegram_post(message, export, &target, &model, &index, &mut stats)? else {
                stats.skipped += 1;
                continue;
            };

            match message.reply_to_message_id {
                Some(parent) => {
                    let reply = Reply {
                        user: post.user,
                        message: post.message,
                        create_at: post.create_at,
                        attachments: post.attachments,
                        reactions: post.reactions,
                    };
                    if threads.add_reply(&parent, Some(message.id), reply) {
                        stats.replies += 1;
                    }
                }
                None => {
                    threads.add_root(message.id, post);
                    stats.posts += 1;
                }
            }
        }
        stats.orphans = threads.orphans();

        let mut registry = TimestampRegistry::new();
        for post in threads.finish() {
            model.posts.push(finalize_post(post, &mut registry));
        }

        model.populate_memberships();
        stats.log();
        Ok(model)
    }

    /// Create the chat's channel; `None` when it has no participants.
    fn telegram_channel(
        export: &TelegramExport,
        model: &mut Intermediate,
        index: &mut NameIndex,
    ) -> Option<PostTarget> {
        let mut members: Vec<String> = model.users.keys().cloned().collect();
        let mut kind = chat_kind(&export.chat_type);

        if kind == ChannelType::Direct {
            match members.len() {
                0 => {
                    warn!(chat = %export.name, "Direct chat has no participants, skipping");
                    return None;
                }
                1 => {
                    let only = members[0].clone();
                    members.push(only);
                }
                2 => {}
                n if n <= MAX_GROUP_MEMBERS => kind = ChannelType::Group,
                _ => kind = ChannelType::Private,
            }
        }

        let name = if kind.is_direct() {
            sanitize_channel_name(&export.name, &export.id)
        } else {
            ChannelNames::new().allocate(&export.name, &export.id)
        };
        let mut channel = Channel::new(&export.id, &name, kind);
        channel.original_name.clone_from(&export.name);
        if !export.name.trim().is_empty() {
            channel.display_name = truncate_chars(&export.name, MAX_DISPLAY_NAME);
        }
        channel.members = members;

        let target = if kind.is_direct() {
            PostTarget::Direct(
                channel
                    .members
                    .iter()
                    .filter_map(|id| model.username(id).map(str::to_string))
                    .collect(),
            )
        } else {
            index.insert_channel(&export.id, &name);
            PostTarget::Channel(name)
        };
        model.push_channel(channel);
        Some(target)
    }

    fn telegram_post(
        &self,
        message: &TelegramMessage,
        export: &TelegramExport,
        target: &PostTarget,
        model: &Intermediate,
        index: &NameIndex,
        stats: &mut TransformStats,
    ) -> Result<Option<Post>> {
        let create_at = message_timestamp(message);

        let Some(author) = message.author_id().and_then(|id| model.username(id)) else {
            warn!(message_id = message.id, "Message author not found, skipping");
            return Ok(None);
        };

        if message.is_service() {
            let action = message.action.as_deref().unwrap_or_default();
            let Some(post_type) = service_post_type(action) else {
                debug!(message_id = message.id, action, "Unsupported service action, skipping");
                return Ok(None);
            };
            let text = match action {
                "edit_group_title" => message.title.clone().unwrap_or_default(),
                _ => String::new(),
            };
            let mut post = Post::new(target.clone(), author, text, create_at);
            post.post_type = Some(post_type.to_string());
            return Ok(Some(post));
        }

        let mut text = render_telegram_text(&message.text, index, self.options.skip_markup);

        let mut requests = Vec::new();
        for path in [message.photo.as_deref(), message.file.as_deref()].into_iter().flatten() {
            if path.starts_with(FILE_NOT_INCLUDED) {
                warn!(message_id = message.id, "Media was not included in the export, skipping");
                continue;
            }
            if is_animated_sticker(message, path) {
                warn!(message_id = message.id, path, "Animated sticker not supported, dropping");
                if text.is_empty() {
                    text = message.sticker_emoji.clone().unwrap_or_default();
                }
                continue;
            }
            requests.push(AttachmentRequest {
                file_id: message.id.to_string(),
                name: file_name(path).to_string(),
                entry: Some(export.entry_path(path)),
                url: None,
            });
        }
        let attachments = self.resolve_attachments(requests, stats)?;

        if text.trim().is_empty() && attachments.is_empty() {
            debug!(message_id = message.id, "Empty message, skipping");
            return Ok(None);
        }

        let mut post = Post::new(target.clone(), author, text, create_at);
        post.attachments = attachments;

        for reaction in &message.reactions {
            let emoji_name = match reaction.kind.as_str() {
                "emoji" => reaction
                    .emoji
                    .as_deref()
                    .and_then(|emoji| self.emoji.name_for_unicode(emoji)),
                _ => None,
            };
            let Some(emoji_name) = emoji_name else {
                warn!(
                    message_id = message.id,
                    kind = %reaction.kind,
                    emoji = ?reaction.emoji,
                    document_id = ?reaction.document_id,
                    "Custom or unknown emoji reaction, dropping"
                );
                stats.reactions_dropped += 1;
                continue;
            };
            for reactor in &reaction.recent {
                let user = reactor.from_id.as_deref().and_then(|id| model.username(id));
                match user {
                    Some(user) => push_reaction(
                        &mut post.reactions,
                        Reaction {
                            user: user.to_string(),
                            emoji_name: emoji_name.to_string(),
                            create_at,
                        },
                    ),
                    None => stats.reactions_dropped += 1,
                }
            }
        }

        Ok(Some(post))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemorySource;
    use crate::parser::{ParseOptions, TelegramParser};
    use crate::transform::{EmojiTable, TransformOptions};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn transform_in(root: &std::path::Path, document: &str) -> Intermediate {
        let mut source = MemorySource::new().with_entry("result.json", document);
        let export = TelegramParser::new(ParseOptions::new("acme")).parse(&mut source).unwrap();
        let emoji = EmojiTable::builtin();
        Transformer::new(&emoji, TransformOptions::default().with_default_email_domain("tg.local"), root)
            .unwrap()
            .transform_telegram(&export)
            .unwrap()
    }

    fn transform(document: &str) -> Intermediate {
        let root = tempfile::tempdir().unwrap();
        transform_in(root.path(), document)
    }

    const GROUP: &str = r#"{
        "name": "Rust Club", "type": "private_supergroup", "id": 77,
        "messages": [
            {"id": 1, "type": "service", "date": "2024-01-01T10:00:00", "date_unixtime": "1704103200",
             "actor": "Alice A", "actor_id": "user1", "action": "invite_members", "text": ""},
            {"id": 2, "type": "message", "date": "2024-01-01T10:01:00", "date_unixtime": "1704103260",
             "from": "Alice A", "from_id": "user1", "text": ["hi ", {"type": "bold", "text": "all"}],
             "reactions": [
                {"type": "emoji", "count": 1, "emoji": "👍", "recent": [{"from": "Bob", "from_id": "user2", "date": "2024-01-01T10:02:00"}]},
                {"type": "custom_emoji", "count": 1, "document_id": "files/sticker.webp", "recent": [{"from": "Bob", "from_id": "user2"}]}
             ]},
            {"id": 3, "type": "message", "date": "2024-01-01T10:03:00", "from": "Bob", "from_id": "user2",
             "text": "reply", "reply_to_message_id": 2},
            {"id": 4, "type": "message", "date": "2024-01-01T10:04:00", "from": "Alice A", "from_id": "user1",
             "text": "nested", "reply_to_message_id": 3},
            {"id": 5, "type": "message", "date": "2024-01-01T10:05:00", "from": "Bob", "from_id": "user2",
             "text": "orphan", "reply_to_message_id": 1000},
            {"id": 6, "type": "message", "date": "2024-01-01T10:06:00", "from": "Bob", "from_id": "user2",
             "text": "", "file": "stickers/a.tgs", "media_type": "sticker", "sticker_emoji": "😀"},
            {"id": 7, "type": "message", "date": "2024-01-01T10:07:00", "from": "Bob", "from_id": "user2",
             "text": "", "photo": "(File not included. Change data exporting settings to download.)"},
            {"id": 8, "type": "service", "date": "2024-01-01T10:08:00", "actor": "Bob", "actor_id": "user2",
             "action": "pin_message", "text": ""},
            {"id": 9, "type": "service", "date": "2024-01-01T10:09:00", "actor": "Bob", "actor_id": "user2",
             "action": "edit_group_title", "title": "Rustaceans", "text": ""}
        ]
    }"#;

    #[rstest]
    #[case("personal_chat", ChannelType::Direct)]
    #[case("saved_messages", ChannelType::Direct)]
    #[case("private_group", ChannelType::Private)]
    #[case("public_channel", ChannelType::Open)]
    #[case("mystery", ChannelType::Private)]
    fn test_chat_kind(#[case] chat_type: &str, #[case] expected: ChannelType) {
        assert_eq!(chat_kind(chat_type), expected);
    }

    #[test]
    fn test_group_chat() {
        let model = transform(GROUP);

        let users: Vec<(&str, &str)> = model
            .users
            .values()
            .map(|u| (u.username.as_str(), u.email.as_str()))
            .collect();
        assert_eq!(users, vec![("user1", "user1@tg.local"), ("user2", "user2@tg.local")]);
        assert_eq!(model.users["user1"].first_name, "Alice");

        let channel = &model.private_channels[0];
        assert_eq!(channel.name, "77");
        assert_eq!(channel.display_name, "Rust Club");

        let summary: Vec<(&str, Option<&str>)> = model
            .posts
            .iter()
            .map(|p| (p.message.as_str(), p.post_type.as_deref()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("", Some("system_join_channel")),
                ("hi **all**", None),
                ("😀", None),
                ("Rustaceans", Some("system_displayname_change")),
            ]
        );

        let hello = &model.posts[1];
        assert_eq!(hello.create_at, 1_704_103_260_000);
        let replies: Vec<&str> = hello.replies.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(replies, vec!["reply", "nested"]);
        assert_eq!(hello.reactions.len(), 1);
        assert_eq!(hello.reactions[0].emoji_name, "+1");
        assert_eq!(hello.reactions[0].user, "user2");
        assert_eq!(model.users["user2"].memberships, vec!["77"]);
    }

    #[test]
    fn test_naive_date_fallback() {
        let message = TelegramMessage {
            id: 1,
            date: "2024-01-01T00:00:01".into(),
            ..TelegramMessage::default()
        };
        assert_eq!(message_timestamp(&message), 1_704_067_201_000);

        let broken = TelegramMessage {
            id: 2,
            date: "yesterday".into(),
            ..TelegramMessage::default()
        };
        assert_eq!(message_timestamp(&broken), SENTINEL_TIMESTAMP);
    }

    #[test]
    fn test_personal_chat_is_direct() {
        let model = transform(
            r#"{"name": "Bob", "type": "personal_chat", "id": 5, "messages": [
                {"id": 1, "type": "message", "date": "2024-01-01T10:00:00", "from": "Alice", "from_id": "user1", "text": "hi"},
                {"id": 2, "type": "message", "date": "2024-01-01T10:00:00", "from": "Bob", "from_id": "user2", "text": "hey"}
            ]}"#,
        );

        assert_eq!(model.direct_channels.len(), 1);
        let target = PostTarget::Direct(vec!["user1".into(), "user2".into()]);
        assert!(model.posts.iter().all(|p| p.target == target));
        let stamps: Vec<i64> = model.posts.iter().map(|p| p.create_at).collect();
        assert_eq!(stamps, vec![1_704_103_200_000, 1_704_103_200_001]);
    }

    #[test]
    fn test_saved_messages_is_self_dm() {
        let model = transform(
            r#"{"name": "", "type": "saved_messages", "id": 9, "messages": [
                {"id": 1, "type": "message", "date": "2024-01-01T10:00:00", "from": "Me", "from_id": "user1", "text": "note"}
            ]}"#,
        );
        assert_eq!(model.direct_channels[0].members, vec!["user1", "user1"]);
    }

    #[test]
    fn test_photo_attachment_resolved() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("photos")).unwrap();
        std::fs::write(root.path().join("photos/p1.jpg"), b"jpg").unwrap();

        let model = transform_in(
            root.path(),
            r#"{"name": "pics", "type": "public_channel", "id": 3, "messages": [
                {"id": 1, "type": "message", "date": "2024-01-01T10:00:00", "from": "A", "from_id": "user1",
                 "text": "", "photo": "photos/p1.jpg"},
                {"id": 2, "type": "message", "date": "2024-01-01T10:00:00", "from": "A", "from_id": "user1",
                 "text": "", "photo": "photos/missing.jpg"}
            ]}"#,
        );

        assert_eq!(model.public_channels[0].name, "pics");
        assert_eq!(model.posts.len(), 1);
        assert_eq!(model.posts[0].attachments, vec!["photos/p1.jpg"]);
    }
}
