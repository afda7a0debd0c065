//! Slack export to canonical model.

use std::collections::HashMap;

use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::model::{Channel, ChannelType, Intermediate, Post, PostTarget, Reaction, Reply, Team, User};
use crate::parser::{parse_slack_timestamp, SlackChannel, SlackExport, SlackPost, SlackUser};
use crate::util::truncate_chars;

use super::markup::convert_slack_text;
use super::names::{
    derive_email, sanitize_channel_name, split_full_name, ChannelNames, Usernames, MAX_DISPLAY_NAME,
    MAX_HEADER, MAX_PURPOSE,
};
use super::posts::{finalize_post, ThreadAssembler, TimestampRegistry, MAX_PROPS_CHARS, SENTINEL_TIMESTAMP};
use super::{member_usernames, push_reaction, AttachmentRequest, NameIndex, TransformStats, Transformer};

/// Largest group message the target platform accepts.
pub const MAX_GROUP_MEMBERS: usize = 8;

/// What to do with a message of a given subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subtype {
    Regular,
    System(&'static str),
    Bot,
    Skip,
}

fn classify_subtype(subtype: &str) -> Subtype {
    match subtype {
        "" | "thread_broadcast" | "file_share" | "me_message" | "reply_broadcast" => Subtype::Regular,
        "channel_join" | "group_join" => Subtype::System("system_join_channel"),
        "channel_leave" | "group_leave" => Subtype::System("system_leave_channel"),
        "channel_topic" | "group_topic" => Subtype::System("system_header_change"),
        "channel_purpose" | "group_purpose" => Subtype::System("system_purpose_change"),
        "channel_name" | "group_name" => Subtype::System("system_displayname_change"),
        "bot_message" => Subtype::Bot,
        _ => Subtype::Skip,
    }
}

/// Lookups shared by every message of one export.
struct SlackContext<'e> {
    index: NameIndex,
    bots: HashMap<String, String>,
    export: &'e SlackExport,
}

impl Transformer<'_> {
    /// Transform a parsed Slack export.
    #[instrument(skip_all, fields(team = %export.team))]
    pub fn transform_slack(&self, export: &SlackExport) -> Result<Intermediate> {
        let mut model = Intermediate::new(Team::new(&export.team));
        let mut ctx = SlackContext {
            index: NameIndex::new(),
            bots: HashMap::new(),
            export,
        };

        self.slack_users(&export.users, &mut model, &mut ctx);
        let targets = Self::slack_channels(export, &mut model, &mut ctx);
        info!(
            users = model.users.len(),
            public = model.public_channels.len(),
            private = model.private_channels.len(),
            group = model.group_channels.len(),
            direct = model.direct_channels.len(),
            "Transformed Slack users and channels"
        );

        let mut stats = TransformStats::default();
        let mut registry = TimestampRegistry::new();
        for (channel_id, target) in &targets {
            let mut threads = ThreadAssembler::new();
            for message in export.posts_for(channel_id) {
                stats.tick();
                let Some(post) = self.slack_post(message, target, &model, &ctx, &mut stats)? else {
                    stats.skipped += 1;
                    continue;
                };

                if message.is_reply() {
                    let parent = message.thread_ts.clone().unwrap_or_default();
                    let reply = Reply {
                        user: post.user,
                        message: post.message,
                        create_at: post.create_at,
                        attachments: post.attachments,
                        reactions: post.reactions,
                    };
                    if threads.add_reply(&parent, None, reply) {
                        stats.replies += 1;
                    }
                } else {
                    threads.add_root(message.ts.clone(), post);
                    stats.posts += 1;
                }
            }
            stats.orphans += threads.orphans();
            for post in threads.finish() {
                model.posts.push(finalize_post(post, &mut registry));
            }
        }

        model.populate_memberships();
        stats.log();
        Ok(model)
    }

    fn slack_users(&self, users: &[SlackUser], model: &mut Intermediate, ctx: &mut SlackContext<'_>) {
        let mut usernames = Usernames::new();
        for su in users {
            if model.users.contains_key(&su.id) {
                warn!(user_id = %su.id, "Duplicate user ID, keeping the first");
                continue;
            }

            let handle = if su.name.is_empty() { &su.id } else { &su.name };
            let username = usernames.allocate(handle);
            let profile = &su.profile;

            let mut user = User::new(&su.id, &username);
            user.email = derive_email(Some(&profile.email), &username, self.default_domain());
            if profile.first_name.is_empty() && profile.last_name.is_empty() {
                (user.first_name, user.last_name) = split_full_name(&profile.real_name);
            } else {
                user.first_name.clone_from(&profile.first_name);
                user.last_name.clone_from(&profile.last_name);
            }
            user.position.clone_from(&profile.title);
            user.profile_image = profile
                .image_original
                .clone()
                .or_else(|| profile.image_512.clone());
            user.deleted = su.deleted;

            if let Some(bot_id) = &profile.bot_id {
                ctx.bots.insert(bot_id.clone(), su.id.clone());
            }
            ctx.index.insert_user(&su.id, &username);
            model.users.insert(su.id.clone(), user);
        }
    }

    /// Build channels; returns the post target of every usable channel.
    fn slack_channels(
        export: &SlackExport,
        model: &mut Intermediate,
        ctx: &mut SlackContext<'_>,
    ) -> Vec<(String, PostTarget)> {
        let mut names = ChannelNames::new();
        let mut targets = Vec::new();

        for kind in ChannelType::ALL {
            for sc in export.channels(kind) {
                let mut kind = kind;
                if kind == ChannelType::Group && sc.members.len() > MAX_GROUP_MEMBERS {
                    info!(
                        channel = %sc.name,
                        members = sc.members.len(),
                        "Group message has too many members, converting to private channel"
                    );
                    kind = ChannelType::Private;
                }

                let channel = if kind.is_direct() {
                    Self::slack_direct_channel(sc, kind, model)
                } else {
                    let mut channel = Self::slack_team_channel(sc, kind, &mut names);
                    channel.members.clone_from(&sc.members);
                    ctx.index.insert_channel(&sc.id, &channel.name);
                    Some(channel)
                };
                let Some(channel) = channel else {
                    continue;
                };

                let target = if kind.is_direct() {
                    let members = member_usernames(&channel.members, &model.users, &channel.id);
                    PostTarget::Direct(members.into_iter().map(str::to_string).collect())
                } else {
                    PostTarget::Channel(channel.name.clone())
                };
                targets.push((sc.id.clone(), target));
                model.push_channel(channel);
            }
        }
        targets
    }

    fn slack_team_channel(sc: &SlackChannel, kind: ChannelType, names: &mut ChannelNames) -> Channel {
        let name = names.allocate(&sc.name, &sc.id);
        let mut channel = Channel::new(&sc.id, &name, kind);
        channel.original_name.clone_from(&sc.name);
        channel.display_name = if sc.name.trim().is_empty() {
            name
        } else {
            truncate_chars(&sc.name, MAX_DISPLAY_NAME)
        };
        channel.purpose = truncate_chars(&sc.purpose.value, MAX_PURPOSE);
        channel.header = truncate_chars(&sc.topic.value, MAX_HEADER);
        channel.topic.clone_from(&sc.topic.value);
        channel
    }

    fn slack_direct_channel(sc: &SlackChannel, kind: ChannelType, model: &Intermediate) -> Option<Channel> {
        let mut members: Vec<String> = sc
            .members
            .iter()
            .filter(|id| {
                let known = model.users.contains_key(id.as_str());
                if !known {
                    warn!(channel = %sc.id, member = %id, "Direct channel member not found in users, skipping");
                }
                known
            })
            .cloned()
            .collect();

        match members.len() {
            0 => {
                warn!(channel = %sc.id, "Direct channel has no known members, skipping");
                return None;
            }
            1 => {
                debug!(channel = %sc.id, "Single-member direct channel, exporting as self message");
                let only = members[0].clone();
                members.push(only);
            }
            _ => {}
        }

        let name = sanitize_channel_name(&sc.name, &sc.id);
        let mut channel = Channel::new(&sc.id, name, kind);
        channel.original_name.clone_from(&sc.name);
        channel.members = members;
        channel.header = truncate_chars(&sc.topic.value, MAX_HEADER);
        channel.purpose = truncate_chars(&sc.purpose.value, MAX_PURPOSE);
        Some(channel)
    }

    /// Convert one message; `None` means the message is skipped.
    fn slack_post(
        &self,
        message: &SlackPost,
        target: &PostTarget,
        model: &Intermediate,
        ctx: &SlackContext<'_>,
        stats: &mut TransformStats,
    ) -> Result<Option<Post>> {
        let create_at = parse_slack_timestamp(&message.ts).unwrap_or_else(|| {
            warn!(ts = %message.ts, "Malformed timestamp, using sentinel");
            SENTINEL_TIMESTAMP
        });

        let subtype = classify_subtype(&message.subtype);
        let author_id = match subtype {
            Subtype::Skip => {
                warn!(subtype = %message.subtype, ts = %message.ts, "Unsupported message subtype, skipping");
                return Ok(None);
            }
            Subtype::Bot => {
                let owner = message
                    .bot_id
                    .as_deref()
                    .and_then(|bot| ctx.bots.get(bot))
                    .map(String::as_str)
                    .or_else(|| (!message.user.is_empty()).then_some(message.user.as_str()));
                match owner {
                    Some(owner) => owner,
                    None => {
                        warn!(bot_id = ?message.bot_id, ts = %message.ts, "Bot message without a known owner, skipping");
                        return Ok(None);
                    }
                }
            }
            Subtype::Regular | Subtype::System(_) => message.user.as_str(),
        };

        let Some(author) = model.username(author_id) else {
            warn!(user = %author_id, ts = %message.ts, "Message author not found, skipping");
            return Ok(None);
        };

        let text = convert_slack_text(&message.text, &ctx.index, self.options.skip_markup);
        let requests = message.files.iter().filter_map(|file| {
            if file.is_unavailable() {
                warn!(file_id = %file.id, mode = ?file.mode, "File is not available in the export, skipping");
                return None;
            }
            let name = [&file.name, &file.title, &file.id]
                .into_iter()
                .find(|n| !n.is_empty())
                .cloned()
                .unwrap_or_default();
            Some(AttachmentRequest {
                file_id: file.id.clone(),
                name,
                entry: ctx.export.uploads.get(&file.id).cloned(),
                url: file.download_url().map(str::to_string),
            })
        });
        let attachments = self.resolve_attachments(requests, stats)?;

        if text.trim().is_empty()
            && attachments.is_empty()
            && message.attachments.is_empty()
            && matches!(subtype, Subtype::Regular | Subtype::Bot)
        {
            debug!(ts = %message.ts, "Empty message, skipping");
            return Ok(None);
        }

        let mut post = Post::new(target.clone(), author, text, create_at);
        post.attachments = attachments;
        if let Subtype::System(post_type) = subtype {
            post.post_type = Some(post_type.to_string());
        }

        if !message.attachments.is_empty() {
            let props = json!({ "attachments": message.attachments });
            let size = serde_json::to_string(&props).map_or(usize::MAX, |s| s.chars().count());
            if size <= MAX_PROPS_CHARS {
                post.props = Some(props);
            } else if self.options.discard_invalid_props {
                warn!(ts = %message.ts, size, "Message props too large, dropping them");
            } else {
                warn!(ts = %message.ts, size, "Message props too large, skipping message");
                return Ok(None);
            }
        }

        for reaction in &message.reactions {
            let Some(emoji_name) = self.emoji.canonical_name(&reaction.name) else {
                warn!(emoji = %reaction.name, ts = %message.ts, "Custom or unknown emoji reaction, dropping");
                stats.reactions_dropped += 1;
                continue;
            };
            for user_id in &reaction.users {
                match model.username(user_id) {
                    Some(user) => push_reaction(
                        &mut post.reactions,
                        Reaction {
                            user: user.to_string(),
                            emoji_name: emoji_name.to_string(),
                            create_at,
                        },
                    ),
                    None => {
                        warn!(user = %user_id, emoji = %reaction.name, "Reacting user not found, dropping reaction");
                        stats.reactions_dropped += 1;
                    }
                }
            }
        }

        Ok(Some(post))
    }
}
