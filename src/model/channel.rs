//! Channels.

use serde::{Deserialize, Serialize};

/// Channel visibility / kind.
///
/// Open and private channels belong to the team and carry no member list on
/// export; group and direct channels are exported with explicit members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    /// Public channel.
    Open,
    /// Private channel.
    Private,
    /// Group direct message.
    Group,
    /// One-to-one direct message.
    Direct,
}

impl ChannelType {
    /// All kinds in export order of their listings.
    pub const ALL: [Self; 4] = [Self::Open, Self::Private, Self::Group, Self::Direct];

    /// Single-letter code used by the import schema for team channels.
    #[must_use]
    pub const fn import_code(self) -> &'static str {
        match self {
            Self::Open => "O",
            Self::Private => "P",
            Self::Group => "G",
            Self::Direct => "D",
        }
    }

    /// Whether channels of this kind are addressed by member list.
    #[must_use]
    pub const fn is_direct(self) -> bool {
        matches!(self, Self::Group | Self::Direct)
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Open => "public",
            Self::Private => "private",
            Self::Group => "group",
            Self::Direct => "direct",
        };
        f.write_str(label)
    }
}

/// A channel in the canonical model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Provider channel ID.
    pub id: String,
    /// Name as it appeared in the export.
    pub original_name: String,
    /// Sanitised, team-unique name.
    pub name: String,
    /// Display name.
    pub display_name: String,
    /// Channel kind.
    pub kind: ChannelType,
    /// Provider user IDs of the members.
    pub members: Vec<String>,
    /// Purpose text.
    pub purpose: String,
    /// Header text.
    pub header: String,
    /// Topic text.
    pub topic: String,
}

impl Channel {
    /// Create a channel with empty metadata; the name doubles as display name.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ChannelType) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            original_name: name.clone(),
            display_name: name.clone(),
            name,
            kind,
            members: Vec::new(),
            purpose: String::new(),
            header: String::new(),
            topic: String::new(),
        }
    }
}
