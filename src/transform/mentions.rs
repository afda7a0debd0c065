//! Mention and link token rewriting for Slack text.
//!
//! Slack encodes every reference inside angle brackets:
//!
//! | token                      | becomes          |
//! |----------------------------|------------------|
//! | `<@U123>` / `<@U123\|bob>` | `@bob`           |
//! | `<#C123\|general>`         | `~general`       |
//! | `<!channel>`               | `@channel`       |
//! | `<!here>`                  | `@here`          |
//! | `<!everyone>`              | `@all`           |
//! | `<!subteam^S1\|@devs>`     | `@devs`          |
//! | `<https://x.y\|docs>`      | `[docs](https://x.y)` |
//! | `<https://x.y>`            | `https://x.y`    |

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([^<>\n]+)>").expect("valid regex"));

/// Provider ID to canonical name lookups used while rewriting text.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    users: HashMap<String, String>,
    channels: HashMap<String, String>,
}

impl NameIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user's username.
    pub fn insert_user(&mut self, id: impl Into<String>, username: impl Into<String>) {
        self.users.insert(id.into(), username.into());
    }

    /// Record a channel's canonical name.
    pub fn insert_channel(&mut self, id: impl Into<String>, name: impl Into<String>) {
        self.channels.insert(id.into(), name.into());
    }

    /// Username for a provider user ID.
    #[must_use]
    pub fn username(&self, id: &str) -> Option<&str> {
        self.users.get(id).map(String::as_str)
    }

    /// Canonical name for a provider channel ID.
    #[must_use]
    pub fn channel(&self, id: &str) -> Option<&str> {
        self.channels.get(id).map(String::as_str)
    }
}

fn rewrite_token(token: &str, index: &NameIndex, links_as_markdown: bool) -> String {
    let (target, label) = match token.split_once('|') {
        Some((target, label)) => (target, Some(label)),
        None => (token, None),
    };

    if let Some(user_id) = target.strip_prefix('@') {
        return match index.username(user_id) {
            Some(username) => format!("@{username}"),
            None => {
                warn!(user_id, "Unresolved user mention, keeping provider ID");
                format!("@{user_id}")
            }
        };
    }

    if let Some(channel_id) = target.strip_prefix('#') {
        let name = index
            .channel(channel_id)
            .map(str::to_string)
            .or_else(|| label.map(str::to_lowercase));
        return match name {
            Some(name) => format!("~{name}"),
            None => {
                warn!(channel_id, "Unresolved channel mention, keeping provider ID");
                format!("~{channel_id}")
            }
        };
    }

    if let Some(special) = target.strip_prefix('!') {
        return match special {
            "channel" => "@channel".to_string(),
            "here" => "@here".to_string(),
            "everyone" => "@all".to_string(),
            s if s.starts_with("subteam^") => match label {
                Some(handle) => format!("@{}", handle.trim_start_matches('@')),
                None => {
                    warn!(group = s, "User group mention without handle");
                    format!("@{}", s.trim_start_matches("subteam^"))
                }
            },
            other => label.map_or_else(|| other.to_string(), str::to_string),
        };
    }

    match label {
        Some(label) if links_as_markdown && label != target => format!("[{label}]({target})"),
        _ => target.to_string(),
    }
}

/// Rewrite every `<...>` token in Slack text.
///
/// With `links_as_markdown` off, labelled links collapse to their bare URL.
#[must_use]
pub fn rewrite_slack_tokens(text: &str, index: &NameIndex, links_as_markdown: bool) -> String {
    TOKEN
        .replace_all(text, |caps: &Captures<'_>| rewrite_token(&caps[1], index, links_as_markdown))
        .into_owned()
}
