//! Canonical in-memory model.
//!
//! Every provider adapter normalises into these types before anything is
//! serialised. The model owns its records outright: replies and reactions
//! belong to exactly one post, attachments are plain relative paths.

pub mod channel;
pub mod post;
pub mod user;

pub use channel::*;
pub use post::*;
pub use user::*;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The team an export is imported into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Team handle on the target platform.
    pub name: String,
    /// Human-readable team name.
    pub display_name: String,
}

impl Team {
    /// Create a team whose display name equals its handle.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
        }
    }
}

/// The transformed export, ready for the exporter.
#[derive(Debug, Clone, Default)]
pub struct Intermediate {
    /// Target team.
    pub team: Team,
    /// Open channels.
    pub public_channels: Vec<Channel>,
    /// Private channels.
    pub private_channels: Vec<Channel>,
    /// Group direct-message channels.
    pub group_channels: Vec<Channel>,
    /// One-to-one direct-message channels.
    pub direct_channels: Vec<Channel>,
    /// Users keyed by provider ID, in discovery order.
    pub users: IndexMap<String, User>,
    /// Posts in population order.
    pub posts: Vec<Post>,
}

impl Intermediate {
    /// Create an empty model for a team.
    #[must_use]
    pub fn new(team: Team) -> Self {
        Self {
            team,
            ..Self::default()
        }
    }

    /// Channels of one kind.
    #[must_use]
    pub fn channels(&self, kind: ChannelType) -> &[Channel] {
        match kind {
            ChannelType::Open => &self.public_channels,
            ChannelType::Private => &self.private_channels,
            ChannelType::Group => &self.group_channels,
            ChannelType::Direct => &self.direct_channels,
        }
    }

    /// Push a channel into the list matching its kind.
    pub fn push_channel(&mut self, channel: Channel) {
        match channel.kind {
            ChannelType::Open => self.public_channels.push(channel),
            ChannelType::Private => self.private_channels.push(channel),
            ChannelType::Group => self.group_channels.push(channel),
            ChannelType::Direct => self.direct_channels.push(channel),
        }
    }

    /// All channels, team channels first.
    pub fn all_channels(&self) -> impl Iterator<Item = &Channel> {
        self.public_channels
            .iter()
            .chain(&self.private_channels)
            .chain(&self.group_channels)
            .chain(&self.direct_channels)
    }

    /// Look up a user by provider ID.
    #[must_use]
    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.get(id)
    }

    /// Username for a provider user ID.
    #[must_use]
    pub fn username(&self, id: &str) -> Option<&str> {
        self.users.get(id).map(|u| u.username.as_str())
    }

    /// Recompute every user's channel memberships.
    ///
    /// Scans the member lists of all public and private channels and records
    /// each channel name on every member. Must run after channels are final
    /// and before users are exported.
    pub fn populate_memberships(&mut self) {
        for user in self.users.values_mut() {
            user.memberships.clear();
        }

        for channel in self.public_channels.iter().chain(&self.private_channels) {
            for member in &channel.members {
                if let Some(user) = self.users.get_mut(member) {
                    if !user.memberships.contains(&channel.name) {
                        user.memberships.push(channel.name.clone());
                    }
                }
            }
        }
    }

    /// Number of posts including replies.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.posts.iter().map(|p| 1 + p.replies.len()).sum()
    }
}
