//! Line shapes of the bulk-import format.
//!
//! Every line is a JSON object with a `type` discriminator and a payload under
//! the key of the same name, e.g. `{"type":"user","user":{...}}`.

use serde::Serialize;
use serde_json::Value;

/// Version of the import format written on the first line.
pub const IMPORT_VERSION: u32 = 1;

/// One line of the import file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImportLine<'a> {
    /// Format version header.
    Version {
        /// Format version.
        version: u32,
    },
    /// Public or private channel.
    Channel {
        /// Channel payload.
        channel: ChannelLine<'a>,
    },
    /// User with team and channel memberships.
    User {
        /// User payload.
        user: UserLine<'a>,
    },
    /// Group or one-to-one direct channel.
    DirectChannel {
        /// Channel payload.
        direct_channel: DirectChannelLine<'a>,
    },
    /// Post in a team channel.
    Post {
        /// Post payload.
        post: PostLine<'a>,
    },
    /// Post in a direct channel.
    DirectPost {
        /// Post payload.
        direct_post: DirectPostLine<'a>,
    },
}

impl ImportLine<'_> {
    /// The `type` discriminator of this line.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Version { .. } => "version",
            Self::Channel { .. } => "channel",
            Self::User { .. } => "user",
            Self::DirectChannel { .. } => "direct_channel",
            Self::Post { .. } => "post",
            Self::DirectPost { .. } => "direct_post",
        }
    }
}

/// Payload of a `channel` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelLine<'a> {
    /// Team name.
    pub team: &'a str,
    /// Name.
    pub name: &'a str,
    /// Display name.
    pub display_name: &'a str,
    /// `O` for public, `P` for private.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Header text.
    #[serde(skip_serializing_if = "str::is_empty")]
    pub header: &'a str,
    /// Purpose text.
    #[serde(skip_serializing_if = "str::is_empty")]
    pub purpose: &'a str,
}

/// Channel membership embedded in a user line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelMembership<'a> {
    /// Name.
    pub name: &'a str,
    /// Space-separated roles.
    pub roles: &'static str,
}

/// Team membership embedded in a user line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamMembership<'a> {
    /// Name.
    pub name: &'a str,
    /// Space-separated roles.
    pub roles: &'static str,
    /// Channel memberships.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<ChannelMembership<'a>>,
}

/// Payload of a `user` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserLine<'a> {
    /// Username.
    pub username: &'a str,
    /// Email address.
    pub email: &'a str,
    /// First name.
    #[serde(skip_serializing_if = "str::is_empty")]
    pub first_name: &'a str,
    /// Last name.
    #[serde(skip_serializing_if = "str::is_empty")]
    pub last_name: &'a str,
    /// Job title.
    #[serde(skip_serializing_if = "str::is_empty")]
    pub position: &'a str,
    /// Profile image path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<&'a str>,
    /// Space-separated roles.
    pub roles: &'static str,
    /// Deactivation time in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_at: Option<i64>,
    /// Team memberships.
    pub teams: Vec<TeamMembership<'a>>,
}

/// Payload of a `direct_channel` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectChannelLine<'a> {
    /// Member usernames.
    pub members: Vec<&'a str>,
    /// Header text.
    #[serde(skip_serializing_if = "str::is_empty")]
    pub header: &'a str,
}

/// Attachment reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentLine<'a> {
    /// Attachment path.
    pub path: &'a str,
}

/// Reaction on a post or reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReactionLine<'a> {
    /// Author username.
    pub user: &'a str,
    /// Emoji name.
    pub emoji_name: &'a str,
    /// Creation time in milliseconds.
    pub create_at: i64,
}

/// Reply nested in a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyLine<'a> {
    /// Author username.
    pub user: &'a str,
    /// Message text.
    pub message: &'a str,
    /// Creation time in milliseconds.
    pub create_at: i64,
    /// Attachments.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentLine<'a>>,
    /// Reactions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<ReactionLine<'a>>,
}

/// Fields shared by channel and direct posts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostBody<'a> {
    /// Author username.
    pub user: &'a str,
    /// System post type.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub post_type: Option<&'a str>,
    /// Message text.
    pub message: &'a str,
    /// Extra post properties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub props: Option<&'a Value>,
    /// Creation time in milliseconds.
    pub create_at: i64,
    /// Attachments.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentLine<'a>>,
    /// Thread replies.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<ReplyLine<'a>>,
    /// Reactions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<ReactionLine<'a>>,
}

/// Payload of a `post` line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostLine<'a> {
    /// Team name.
    pub team: &'a str,
    /// Channel name.
    pub channel: &'a str,
    /// Shared post fields.
    #[serde(flatten)]
    pub body: PostBody<'a>,
}

/// Payload of a `direct_post` line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectPostLine<'a> {
    /// Member usernames of the direct channel.
    pub channel_members: Vec<&'a str>,
    /// Shared post fields.
    #[serde(flatten)]
    pub body: PostBody<'a>,
}
