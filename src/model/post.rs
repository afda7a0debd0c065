//! Posts, replies and reactions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a post lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostTarget {
    /// A team channel, by canonical name.
    Channel(String),
    /// A direct or group channel, by member usernames.
    Direct(Vec<String>),
}

impl PostTarget {
    /// Whether this post goes to a direct/group channel.
    #[must_use]
    pub const fn is_direct(&self) -> bool {
        matches!(self, Self::Direct(_))
    }

    /// A key identifying the channel, used for timestamp de-duplication.
    #[must_use]
    pub fn channel_key(&self) -> String {
        match self {
            Self::Channel(name) => format!("channel:{name}"),
            Self::Direct(members) => {
                let mut sorted = members.clone();
                sorted.sort();
                format!("direct:{}", sorted.join(","))
            }
        }
    }
}

/// A reaction on a post or reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    /// Username of the reacting user.
    pub user: String,
    /// Canonical emoji name.
    pub emoji_name: String,
    /// Creation time in milliseconds.
    pub create_at: i64,
}

/// A reply inside a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    /// Author username.
    pub user: String,
    /// Message text.
    pub message: String,
    /// Creation time in milliseconds.
    pub create_at: i64,
    /// Relative attachment paths.
    pub attachments: Vec<String>,
    /// Reactions on this reply.
    pub reactions: Vec<Reaction>,
}

impl Reply {
    /// Create a reply with no attachments or reactions.
    pub fn new(user: impl Into<String>, message: impl Into<String>, create_at: i64) -> Self {
        Self {
            user: user.into(),
            message: message.into(),
            create_at,
            attachments: Vec::new(),
            reactions: Vec::new(),
        }
    }
}

/// A root post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Channel or direct-member target.
    pub target: PostTarget,
    /// Author username.
    pub user: String,
    /// Message text.
    pub message: String,
    /// Creation time in milliseconds.
    pub create_at: i64,
    /// System subtype such as `system_join_channel`.
    pub post_type: Option<String>,
    /// Extra properties carried through to the import line.
    pub props: Option<Value>,
    /// Relative attachment paths.
    pub attachments: Vec<String>,
    /// Thread replies.
    pub replies: Vec<Reply>,
    /// Reactions on this post.
    pub reactions: Vec<Reaction>,
}

impl Post {
    /// Create a plain post.
    pub fn new(
        target: PostTarget,
        user: impl Into<String>,
        message: impl Into<String>,
        create_at: i64,
    ) -> Self {
        Self {
            target,
            user: user.into(),
            message: message.into(),
            create_at,
            post_type: None,
            props: None,
            attachments: Vec::new(),
            replies: Vec::new(),
            reactions: Vec::new(),
        }
    }

    /// Whether this post goes to a direct/group channel.
    #[must_use]
    pub const fn is_direct(&self) -> bool {
        self.target.is_direct()
    }

    /// Append a reply, taking ownership.
    pub fn add_reply(&mut self, reply: Reply) {
        self.replies.push(reply);
    }
}
