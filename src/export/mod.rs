//! Bulk-import exporter.
//!
//! Serialises an [`Intermediate`] as newline-delimited JSON. Line order is
//! fixed because the importer resolves references top-down:
//!
//! 1. `version`
//! 2. `channel` lines for public, then private channels
//! 3. `user` lines with their team and channel memberships
//! 4. `direct_channel` lines for group, then one-to-one channels
//! 5. `post` lines, then `direct_post` lines, in model order

pub mod lines;

pub use lines::*;

use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{info, instrument, warn};

use crate::error::{EtlError, Result};
use crate::model::{Channel, Intermediate, Post, PostTarget, Reaction, Reply, User};
use crate::transform::posts::SENTINEL_TIMESTAMP;
use crate::util::AtomicFile;

/// Role given to every imported account.
pub const SYSTEM_USER_ROLE: &str = "system_user";
/// Role inside the target team.
pub const TEAM_USER_ROLE: &str = "team_user";
/// Role inside each team channel.
pub const CHANNEL_USER_ROLE: &str = "channel_user";

/// Line counts of one export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    /// `channel` lines.
    pub channels: usize,
    /// `user` lines.
    pub users: usize,
    /// `direct_channel` lines.
    pub direct_channels: usize,
    /// `post` lines.
    pub posts: usize,
    /// `direct_post` lines.
    pub direct_posts: usize,
    /// Replies nested in posts.
    pub replies: usize,
}

impl ExportStats {
    /// Number of lines written, including the version line.
    #[must_use]
    pub const fn lines(&self) -> usize {
        1 + self.channels + self.users + self.direct_channels + self.posts + self.direct_posts
    }
}

/// Writes the bulk-import format.
#[derive(Debug, Clone, Default)]
pub struct BulkExporter;

impl BulkExporter {
    /// Create an exporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Write `model` to `writer`, one JSON object per line.
    #[instrument(skip_all, fields(team = %model.team.name))]
    pub fn export<W: Write>(&self, model: &Intermediate, writer: &mut W) -> Result<ExportStats> {
        let mut stats = ExportStats::default();
        let team = model.team.name.as_str();

        write_line(writer, &ImportLine::Version {
            version: IMPORT_VERSION,
        })?;

        for channel in model.public_channels.iter().chain(&model.private_channels) {
            write_line(writer, &channel_line(team, channel))?;
            stats.channels += 1;
        }

        let deactivated_at = latest_timestamp(model);
        for user in model.users.values() {
            write_line(writer, &user_line(team, user, deactivated_at))?;
            stats.users += 1;
        }

        for channel in model.group_channels.iter().chain(&model.direct_channels) {
            let members = direct_members(model, channel);
            write_line(writer, &ImportLine::DirectChannel {
                direct_channel: DirectChannelLine {
                    members,
                    header: &channel.header,
                },
            })?;
            stats.direct_channels += 1;
        }

        for post in model.posts.iter().filter(|p| !p.is_direct()) {
            if let PostTarget::Channel(channel) = &post.target {
                write_line(writer, &ImportLine::Post {
                    post: PostLine {
                        team,
                        channel,
                        body: post_body(post),
                    },
                })?;
                stats.posts += 1;
                stats.replies += post.replies.len();
            }
        }

        for post in model.posts.iter().filter(|p| p.is_direct()) {
            if let PostTarget::Direct(members) = &post.target {
                write_line(writer, &ImportLine::DirectPost {
                    direct_post: DirectPostLine {
                        channel_members: members.iter().map(String::as_str).collect(),
                        body: post_body(post),
                    },
                })?;
                stats.direct_posts += 1;
                stats.replies += post.replies.len();
            }
        }

        writer
            .flush()
            .map_err(|e| EtlError::io("Failed to flush import output", e))?;

        info!(
            lines = stats.lines(),
            channels = stats.channels,
            users = stats.users,
            direct_channels = stats.direct_channels,
            posts = stats.posts,
            direct_posts = stats.direct_posts,
            replies = stats.replies,
            "Export complete"
        );
        Ok(stats)
    }

    /// Write `model` to a file, replacing it only once every line is written.
    pub fn export_to_file(&self, model: &Intermediate, path: impl AsRef<Path>) -> Result<ExportStats> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| EtlError::io(format!("Failed to create {}", parent.display()), e))?;
        }

        let mut atomic = AtomicFile::create(path)?;
        let mut writer = BufWriter::new(atomic.writer());
        let stats = self.export(model, &mut writer)?;
        drop(writer);
        atomic.finish()?;
        Ok(stats)
    }

    /// Render `model` to a string.
    pub fn export_to_string(&self, model: &Intermediate) -> Result<String> {
        let mut buffer = Vec::new();
        self.export(model, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| EtlError::export(format!("Output is not UTF-8: {e}")))
    }
}

fn write_line<W: Write>(writer: &mut W, line: &ImportLine<'_>) -> Result<()> {
    serde_json::to_writer(&mut *writer, line).map_err(|e| EtlError::SerializationError {
        context: format!("Failed to serialize {} line", line.kind()),
        source: e,
    })?;
    writer
        .write_all(b"\n")
        .map_err(|e| EtlError::io("Failed to write import output", e))
}

fn channel_line<'a>(team: &'a str, channel: &'a Channel) -> ImportLine<'a> {
    ImportLine::Channel {
        channel: ChannelLine {
            team,
            name: &channel.name,
            display_name: &channel.display_name,
            kind: channel.kind.import_code(),
            header: &channel.header,
            purpose: &channel.purpose,
        },
    }
}

fn user_line<'a>(team: &'a str, user: &'a User, deactivated_at: i64) -> ImportLine<'a> {
    ImportLine::User {
        user: UserLine {
            username: &user.username,
            email: &user.email,
            first_name: &user.first_name,
            last_name: &user.last_name,
            position: &user.position,
            profile_image: user.profile_image.as_deref(),
            roles: SYSTEM_USER_ROLE,
            delete_at: user.deleted.then_some(deactivated_at),
            teams: vec![TeamMembership {
                name: team,
                roles: TEAM_USER_ROLE,
                channels: user
                    .memberships
                    .iter()
                    .map(|name| ChannelMembership {
                        name,
                        roles: CHANNEL_USER_ROLE,
                    })
                    .collect(),
            }],
        },
    }
}

/// Member usernames of a group or direct channel. Unknown IDs are dropped.
fn direct_members<'a>(model: &'a Intermediate, channel: &'a Channel) -> Vec<&'a str> {
    channel
        .members
        .iter()
        .filter_map(|id| {
            let username = model.username(id);
            if username.is_none() {
                warn!(channel = %channel.id, member = %id, "Direct channel member has no user record");
            }
            username
        })
        .collect()
}

/// Deactivation time for deleted users: the newest message in the export.
fn latest_timestamp(model: &Intermediate) -> i64 {
    model
        .posts
        .iter()
        .flat_map(|p| std::iter::once(p.create_at).chain(p.replies.iter().map(|r| r.create_at)))
        .max()
        .unwrap_or(SENTINEL_TIMESTAMP)
}

fn attachments(paths: &[String]) -> Vec<AttachmentLine<'_>> {
    paths.iter().map(|path| AttachmentLine { path }).collect()
}

fn reactions(reactions: &[Reaction]) -> Vec<ReactionLine<'_>> {
    reactions
        .iter()
        .map(|r| ReactionLine {
            user: &r.user,
            emoji_name: &r.emoji_name,
            create_at: r.create_at,
        })
        .collect()
}

fn reply_line(reply: &Reply) -> ReplyLine<'_> {
    ReplyLine {
        user: &reply.user,
        message: &reply.message,
        create_at: reply.create_at,
        attachments: attachments(&reply.attachments),
        reactions: reactions(&reply.reactions),
    }
}

fn post_body(post: &Post) -> PostBody<'_> {
    PostBody {
        user: &post.user,
        post_type: post.post_type.as_deref(),
        message: &post.message,
        props: post.props.as_ref(),
        create_at: post.create_at,
        attachments: attachments(&post.attachments),
        replies: post.replies.iter().map(reply_line).collect(),
        reactions: reactions(&post.reactions),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChannelType, Team};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn lines(model: &Intermediate) -> Vec<Value> {
        BulkExporter::new()
            .export_to_string(model)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn kinds(lines: &[Value]) -> Vec<&str> {
        lines.iter().map(|l| l["type"].as_str().unwrap()).collect()
    }

    fn two_by_two() -> Intermediate {
        let mut model = Intermediate::new(Team::new("acme"));
        let mut alice = User::new("U1", "alice");
        alice.email = "alice@x.io".into();
        let mut bob = User::new("U2", "bob");
        bob.email = "bob@x.io".into();
        model.users.insert("U1".into(), alice);
        model.users.insert("U2".into(), bob);

        let mut general = Channel::new("C1", "general", ChannelType::Open);
        general.members = vec!["U1".into(), "U2".into()];
        let mut secret = Channel::new("C2", "secret", ChannelType::Private);
        secret.members = vec!["U2".into()];
        model.push_channel(general);
        model.push_channel(secret);
        model.populate_memberships();
        model
    }

    #[test]
    fn test_channels_then_users_without_posts() {
        let model = two_by_two();
        let out = lines(&model);

        assert_eq!(kinds(&out), vec!["version", "channel", "channel", "user", "user"]);
        assert_eq!(out.len(), 1 + 2 + 2);
        assert_eq!(out[2]["channel"]["type"], "P");
        assert_eq!(
            out[4]["user"],
            json!({
                "username": "bob",
                "email": "bob@x.io",
                "roles": "system_user",
                "teams": [{
                    "name": "acme",
                    "roles": "team_user",
                    "channels": [
                        {"name": "general", "roles": "channel_user"},
                        {"name": "secret", "roles": "channel_user"}
                    ]
                }]
            })
        );
    }

    #[test]
    fn test_full_line_order() {
        let mut model = two_by_two();
        let mut dm = Channel::new("D1", "d1", ChannelType::Direct);
        dm.members = vec!["U1".into(), "U2".into()];
        let mut group = Channel::new("G1", "g1", ChannelType::Group);
        group.members = vec!["U1".into(), "U2".into(), "U9".into()];
        model.push_channel(dm);
        model.push_channel(group);

        let direct = PostTarget::Direct(vec!["alice".into(), "bob".into()]);
        model.posts.push(Post::new(direct, "alice", "psst", 10));
        let mut post = Post::new(PostTarget::Channel("general".into()), "bob", "hello", 5);
        post.add_reply(Reply::new("alice", "hi", 6));
        model.posts.push(post);

        let out = lines(&model);
        assert_eq!(
            kinds(&out),
            vec![
                "version",
                "channel",
                "channel",
                "user",
                "user",
                "direct_channel",
                "direct_channel",
                "post",
                "direct_post"
            ]
        );
        assert_eq!(out[6]["direct_channel"]["members"], json!(["alice", "bob"]));
        assert_eq!(out[7]["post"]["replies"][0]["message"], "hi");
        assert_eq!(out[8]["direct_post"]["channel_members"], json!(["alice", "bob"]));
    }

    #[test]
    fn test_post_optional_fields() {
        let mut model = Intermediate::new(Team::new("acme"));
        let mut post = Post::new(PostTarget::Channel("general".into()), "bob", "", 5);
        post.post_type = Some("system_join_channel".into());
        post.props = Some(json!({"attachments": [{"text": "x"}]}));
        post.attachments = vec!["files/a.png".into()];
        post.reactions.push(Reaction {
            user: "alice".into(),
            emoji_name: "+1".into(),
            create_at: 5,
        });
        model.posts.push(post);

        let out = lines(&model);
        assert_eq!(
            out[1]["post"],
            json!({
                "team": "acme",
                "channel": "general",
                "user": "bob",
                "type": "system_join_channel",
                "message": "",
                "props": {"attachments": [{"text": "x"}]},
                "create_at": 5,
                "attachments": [{"path": "files/a.png"}],
                "reactions": [{"user": "alice", "emoji_name": "+1", "create_at": 5}]
            })
        );
    }

    #[test]
    fn test_deactivated_user_gets_delete_at() {
        let mut model = Intermediate::new(Team::new("acme"));
        let mut gone = User::new("U1", "gone");
        gone.deleted = true;
        model.users.insert("U1".into(), gone);
        let mut post = Post::new(PostTarget::Channel("general".into()), "gone", "x", 100);
        post.add_reply(Reply::new("gone", "y", 250));
        model.posts.push(post);

        let out = lines(&model);
        assert_eq!(out[1]["user"]["delete_at"], 250);
    }

    #[test]
    fn test_export_is_deterministic() {
        let model = two_by_two();
        let a = BulkExporter::new().export_to_string(&model).unwrap();
        let b = BulkExporter::new().export_to_string(&model).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_export_to_file_reports_stats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/bulk.jsonl");
        let stats = BulkExporter::new().export_to_file(&two_by_two(), &path).unwrap();

        assert_eq!(stats.lines(), 5);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 5);
        assert!(content.ends_with('\n'));
    }
}
