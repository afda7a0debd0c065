//! Post finalisation: thread assembly, timestamp de-duplication, and
//! splitting of records that exceed the import limits.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use tracing::{debug, warn};

use crate::model::{Post, Reply};
use crate::util::split_chars;

/// Most attachments a post or reply may carry.
pub const MAX_ATTACHMENTS: usize = 5;
/// Longest message text, in characters.
pub const MAX_MESSAGE_CHARS: usize = 16_383;
/// Largest serialised props, in characters.
pub const MAX_PROPS_CHARS: usize = 800_000;
/// Timestamp used when the provider timestamp cannot be parsed.
pub const SENTINEL_TIMESTAMP: i64 = 1;

/// Hands out creation timestamps that are unique per channel.
#[derive(Debug, Default)]
pub struct TimestampRegistry {
    used: HashMap<String, HashSet<i64>>,
}

impl TimestampRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the smallest unused timestamp `>= wanted` in a channel.
    pub fn claim(&mut self, channel_key: &str, wanted: i64) -> i64 {
        let used = self.used.entry(channel_key.to_string()).or_default();
        let mut ts = wanted;
        while !used.insert(ts) {
            ts += 1;
        }
        if ts != wanted {
            debug!(channel = channel_key, wanted, assigned = ts, "Timestamp collision resolved");
        }
        ts
    }
}

/// Move attachments past the limit out of `attachments`, in chunks of at
/// most [`MAX_ATTACHMENTS`].
pub fn split_attachment_overflow(attachments: &mut Vec<String>) -> Vec<Vec<String>> {
    if attachments.len() <= MAX_ATTACHMENTS {
        return Vec::new();
    }
    let overflow = attachments.split_off(MAX_ATTACHMENTS);
    overflow
        .chunks(MAX_ATTACHMENTS)
        .map(<[String]>::to_vec)
        .collect()
}

/// Synthetic replies for a record's oversized text and attachments.
///
/// The record keeps its first text chunk and first [`MAX_ATTACHMENTS`]
/// attachments. Text continuations come before attachment chunks.
fn overflow_replies(
    user: &str,
    message: &mut String,
    attachments: &mut Vec<String>,
) -> Vec<(String, Vec<String>)> {
    let mut extra = Vec::new();

    if message.chars().count() > MAX_MESSAGE_CHARS {
        let mut chunks = split_chars(message, MAX_MESSAGE_CHARS).into_iter();
        *message = chunks.next().unwrap_or_default();
        extra.extend(chunks.map(|chunk| (chunk, Vec::new())));
        debug!(user, chunks = extra.len(), "Split long message");
    }

    for chunk in split_attachment_overflow(attachments) {
        extra.push((String::new(), chunk));
    }
    extra
}

fn synthetic_replies(
    registry: &mut TimestampRegistry,
    key: &str,
    user: &str,
    after: i64,
    extra: Vec<(String, Vec<String>)>,
) -> Vec<Reply> {
    let mut last = after;
    extra
        .into_iter()
        .map(|(message, attachments)| {
            last = registry.claim(key, last + 1);
            let mut reply = Reply::new(user, message, last);
            reply.attachments = attachments;
            reply
        })
        .collect()
}

/// Make a post ready for export.
///
/// Claims unique timestamps for the post and every reply, and splits
/// oversized text and attachment lists into synthetic replies by the same
/// author, timestamped strictly after the record they came from.
pub fn finalize_post(mut post: Post, registry: &mut TimestampRegistry) -> Post {
    let key = post.target.channel_key();
    post.create_at = registry.claim(&key, post.create_at);

    let extra = overflow_replies(&post.user, &mut post.message, &mut post.attachments);
    let mut replies = synthetic_replies(registry, &key, &post.user, post.create_at, extra);

    for mut reply in std::mem::take(&mut post.replies) {
        reply.create_at = registry.claim(&key, reply.create_at);
        let extra = overflow_replies(&reply.user, &mut reply.message, &mut reply.attachments);
        let user = reply.user.clone();
        let after = reply.create_at;
        replies.push(reply);
        replies.extend(synthetic_replies(registry, &key, &user, after, extra));
    }

    post.replies = replies;
    post
}

/// Assembles flat message streams into threads.
///
/// Messages are added in stream order. A reply names its parent by key; a
/// reply to a reply is attached to the thread root.
#[derive(Debug)]
pub struct ThreadAssembler<K> {
    posts: Vec<Post>,
    roots: HashMap<K, usize>,
    orphans: usize,
}

impl<K> Default for ThreadAssembler<K> {
    fn default() -> Self {
        Self {
            posts: Vec::new(),
            roots: HashMap::new(),
            orphans: 0,
        }
    }
}

impl<K: Hash + Eq + std::fmt::Debug> ThreadAssembler<K> {
    /// Create an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root post.
    pub fn add_root(&mut self, key: K, post: Post) {
        self.roots.insert(key, self.posts.len());
        self.posts.push(post);
    }

    /// Add a reply to a previously seen message.
    ///
    /// Returns `false` and drops the reply when the parent is unknown.
    pub fn add_reply(&mut self, parent: &K, key: Option<K>, reply: Reply) -> bool {
        let Some(&root) = self.roots.get(parent) else {
            warn!(parent = ?parent, user = %reply.user, "Parent message not found, dropping orphaned reply");
            self.orphans += 1;
            return false;
        };
        self.posts[root].add_reply(reply);
        if let Some(key) = key {
            self.roots.entry(key).or_insert(root);
        }
        true
    }

    /// Number of dropped replies.
    #[must_use]
    pub fn orphans(&self) -> usize {
        self.orphans
    }

    /// The assembled posts in insertion order.
    #[must_use]
    pub fn finish(self) -> Vec<Post> {
        self.posts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PostTarget;
    use pretty_assertions::assert_eq;

    fn paths(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{i}.png")).collect()
    }

    fn post(ts: i64) -> Post {
        Post::new(PostTarget::Channel("general".into()), "alice", "hi", ts)
    }

    #[test]
    fn test_registry_claims_next_free() {
        let mut registry = TimestampRegistry::new();
        assert_eq!(registry.claim("a", 10), 10);
        assert_eq!(registry.claim("a", 10), 11);
        assert_eq!(registry.claim("a", 10), 12);
        assert_eq!(registry.claim("b", 10), 10);
    }

    #[test]
    fn test_split_overflow_chunks() {
        let mut attachments = paths(12);
        let chunks = split_attachment_overflow(&mut attachments);
        assert_eq!(attachments.len(), 5);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 5);
        assert_eq!(chunks[1], vec!["f10.png", "f11.png"]);
    }

    #[test]
    fn test_split_overflow_noop_at_limit() {
        let mut attachments = paths(5);
        assert!(split_attachment_overflow(&mut attachments).is_empty());
        assert_eq!(attachments.len(), 5);
    }

    #[test]
    fn test_finalize_attachment_overflow() {
        let mut p = post(1000);
        p.attachments = paths(11);
        let mut registry = TimestampRegistry::new();

        let p = finalize_post(p, &mut registry);

        assert_eq!(p.attachments.len(), 5);
        let stamps: Vec<i64> = p.replies.iter().map(|r| r.create_at).collect();
        assert_eq!(stamps, vec![1001, 1002]);
        assert!(p.replies.iter().all(|r| r.message.is_empty() && r.user == "alice"));
        assert_eq!(p.replies[1].attachments, vec!["f10.png"]);
    }

    #[test]
    fn test_finalize_skips_taken_timestamps() {
        let mut registry = TimestampRegistry::new();
        let key = PostTarget::Channel("general".into()).channel_key();
        registry.claim(&key, 1001);

        let mut p = post(1000);
        p.attachments = paths(7);
        let p = finalize_post(p, &mut registry);

        assert_eq!(p.create_at, 1000);
        assert_eq!(p.replies[0].create_at, 1002);
    }

    #[test]
    fn test_finalize_long_message() {
        let mut p = post(5);
        p.message = "x".repeat(MAX_MESSAGE_CHARS * 2 + 1);
        p.attachments = paths(6);
        let p = finalize_post(p, &mut TimestampRegistry::new());

        assert_eq!(p.message.len(), MAX_MESSAGE_CHARS);
        assert_eq!(p.replies.len(), 3);
        assert_eq!(p.replies[1].message, "x");
        assert!(p.replies[2].message.is_empty());
        assert_eq!(p.replies[2].attachments, vec!["f5.png"]);
    }

    #[test]
    fn test_finalize_reply_overflow_follows_reply() {
        let mut p = post(100);
        let mut reply = Reply::new("bob", "look", 200);
        reply.attachments = paths(6);
        p.add_reply(reply);

        let p = finalize_post(p, &mut TimestampRegistry::new());

        let summary: Vec<(&str, i64, usize)> = p
            .replies
            .iter()
            .map(|r| (r.user.as_str(), r.create_at, r.attachments.len()))
            .collect();
        assert_eq!(summary, vec![("bob", 200, 5), ("bob", 201, 1)]);
    }

    #[test]
    fn test_duplicate_post_timestamps_in_channel() {
        let mut registry = TimestampRegistry::new();
        let a = finalize_post(post(50), &mut registry);
        let b = finalize_post(post(50), &mut registry);
        assert_eq!((a.create_at, b.create_at), (50, 51));
    }

    #[test]
    fn test_thread_assembler_attaches_to_root() {
        let mut threads = ThreadAssembler::new();
        threads.add_root(1, post(1));
        assert!(threads.add_reply(&1, Some(2), Reply::new("bob", "r1", 2)));
        assert!(threads.add_reply(&2, Some(3), Reply::new("carol", "r2", 3)));
        assert!(!threads.add_reply(&99, Some(4), Reply::new("dave", "lost", 4)));

        assert_eq!(threads.orphans(), 1);
        let posts = threads.finish();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].replies.len(), 2);
    }
}
