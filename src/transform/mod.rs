//! Provider-agnostic transformation into the canonical model.
//!
//! The [`Transformer`] borrows an immutable [`EmojiTable`] and owns an
//! [`AttachmentStore`]; each `transform_*` call builds a fresh
//! [`Intermediate`]. Business rules applied here:
//!
//! - usernames and emails are normalised and made unique
//! - mentions and inline markup are rewritten to the target dialect
//! - unknown and custom emoji reactions are dropped
//! - replies are attached to their thread root; orphans are dropped
//! - timestamps are made unique per channel
//! - oversized text and attachment lists are split into synthetic replies
//! - channel memberships are computed once channels are final

pub mod attachments;
pub mod emoji;
pub mod markup;
pub mod mentions;
pub mod names;
pub mod posts;
mod slack;
mod telegram;

pub use attachments::{AttachmentRequest, AttachmentStore, Downloader, HttpDownloader};
pub use emoji::EmojiTable;
pub use mentions::NameIndex;
pub use posts::{finalize_post, split_attachment_overflow, ThreadAssembler, TimestampRegistry};

use std::path::PathBuf;

use tracing::{info, warn};

use crate::archive::PROGRESS_EVERY;
use crate::error::Result;
use crate::model::{Reaction, User};

/// Transformation options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOptions {
    /// Keep text as-is instead of converting markup.
    pub skip_markup: bool,
    /// Drop every attachment.
    pub skip_attachments: bool,
    /// Download attachments missing from the export.
    pub allow_download: bool,
    /// Domain for users without an email address.
    pub default_email_domain: Option<String>,
    /// Drop oversized props instead of skipping the post.
    pub discard_invalid_props: bool,
    /// Copy attachments into this directory.
    pub attachments_dir: Option<PathBuf>,
    /// Bearer token sent with attachment downloads.
    pub download_token: Option<String>,
}

impl TransformOptions {
    /// Builder: set the default email domain.
    #[must_use]
    pub fn with_default_email_domain(mut self, domain: impl Into<String>) -> Self {
        self.default_email_domain = Some(domain.into());
        self
    }

    /// Builder: skip markup conversion.
    #[must_use]
    pub fn with_skip_markup(mut self, skip: bool) -> Self {
        self.skip_markup = skip;
        self
    }

    /// Builder: drop attachments.
    #[must_use]
    pub fn with_skip_attachments(mut self, skip: bool) -> Self {
        self.skip_attachments = skip;
        self
    }

    /// Builder: drop oversized props.
    #[must_use]
    pub fn with_discard_invalid_props(mut self, discard: bool) -> Self {
        self.discard_invalid_props = discard;
        self
    }

    /// Builder: copy attachments into a directory.
    #[must_use]
    pub fn with_attachments_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.attachments_dir = Some(dir.into());
        self
    }
}

/// Counters for one transformation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformStats {
    /// Messages examined.
    pub messages: usize,
    /// Root posts produced.
    pub posts: usize,
    /// Replies produced, excluding synthetic ones.
    pub replies: usize,
    /// Messages skipped.
    pub skipped: usize,
    /// Replies dropped because their parent was missing.
    pub orphans: usize,
    /// Reactions dropped.
    pub reactions_dropped: usize,
    /// Attachments resolved.
    pub attachments: usize,
}

impl TransformStats {
    fn tick(&mut self) {
        self.messages += 1;
        if self.messages % PROGRESS_EVERY == 0 {
            info!(processed = self.messages, "Transforming messages");
        }
    }

    fn log(&self) {
        info!(
            messages = self.messages,
            posts = self.posts,
            replies = self.replies,
            skipped = self.skipped,
            orphans = self.orphans,
            reactions_dropped = self.reactions_dropped,
            attachments = self.attachments,
            "Transformation complete"
        );
    }
}

/// Converts provider exports into the canonical model.
#[derive(Debug)]
pub struct Transformer<'a> {
    emoji: &'a EmojiTable,
    options: TransformOptions,
    attachments: AttachmentStore,
}

impl<'a> Transformer<'a> {
    /// Create a transformer for an export extracted at `export_root`.
    pub fn new(emoji: &'a EmojiTable, options: TransformOptions, export_root: impl Into<PathBuf>) -> Result<Self> {
        let mut attachments = AttachmentStore::new(export_root)
            .with_attachments_dir(options.attachments_dir.clone())
            .with_skip(options.skip_attachments);
        if options.allow_download {
            attachments =
                attachments.with_downloader(Box::new(HttpDownloader::new(options.download_token.as_deref())?));
        }
        Ok(Self {
            emoji,
            options,
            attachments,
        })
    }

    /// Builder: replace the attachment downloader.
    #[must_use]
    pub fn with_downloader(mut self, downloader: Box<dyn Downloader>) -> Self {
        self.attachments = self.attachments.with_downloader(downloader);
        self
    }

    /// The options in effect.
    #[must_use]
    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    fn default_domain(&self) -> Option<&str> {
        self.options.default_email_domain.as_deref()
    }

    fn resolve_attachments(
        &self,
        requests: impl IntoIterator<Item = AttachmentRequest>,
        stats: &mut TransformStats,
    ) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        for request in requests {
            if let Some(path) = self.attachments.resolve(&request)? {
                stats.attachments += 1;
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

/// Add a reaction unless the same user already reacted with the same emoji.
fn push_reaction(reactions: &mut Vec<Reaction>, reaction: Reaction) {
    if !reactions
        .iter()
        .any(|r| r.user == reaction.user && r.emoji_name == reaction.emoji_name)
    {
        reactions.push(reaction);
    }
}

/// Resolve provider user IDs to usernames, dropping unknown ones.
fn member_usernames<'u>(
    members: &[String],
    users: &'u indexmap::IndexMap<String, User>,
    channel: &str,
) -> Vec<&'u str> {
    members
        .iter()
        .filter_map(|id| match users.get(id) {
            Some(user) => Some(user.username.as_str()),
            None => {
                warn!(channel, member = %id, "Channel member not found in users, skipping");
                None
            }
        })
        .collect()
}
