//! Channel names, usernames and emails.
//!
//! Everything here is deterministic: the same provider input always yields
//! the same names, in the same order.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::util::truncate_chars;

/// Longest channel name the importer accepts.
pub const MAX_CHANNEL_NAME: usize = 64;
/// Shortest channel name the importer accepts.
pub const MIN_CHANNEL_NAME: usize = 2;
/// Longest channel display name.
pub const MAX_DISPLAY_NAME: usize = 64;
/// Longest channel purpose.
pub const MAX_PURPOSE: usize = 250;
/// Longest channel header.
pub const MAX_HEADER: usize = 1024;
/// Longest username.
pub const MAX_USERNAME: usize = 64;

const FALLBACK_CHANNEL_NAME: &str = "channel";

fn is_channel_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'
}

/// Whether `name` is already an acceptable channel name.
#[must_use]
pub fn is_valid_channel_name(name: &str) -> bool {
    let len = name.chars().count();
    (MIN_CHANNEL_NAME..=MAX_CHANNEL_NAME).contains(&len) && name.chars().all(is_channel_char)
}

/// Name derived from a channel ID.
///
/// IDs too short for a channel name get a `-channel` suffix, so the result
/// is always valid.
#[must_use]
pub fn channel_name_from_id(id: &str) -> String {
    let derived: String = id
        .to_lowercase()
        .chars()
        .map(|c| if is_channel_char(c) { c } else { '-' })
        .take(MAX_CHANNEL_NAME)
        .collect();
    match derived.chars().count() {
        0 => FALLBACK_CHANNEL_NAME.to_string(),
        n if n < MIN_CHANNEL_NAME => format!("{derived}-{FALLBACK_CHANNEL_NAME}"),
        _ => derived,
    }
}

/// Canonical channel name.
///
/// The lowercased provider name is used when valid, otherwise the name is
/// derived from the ID. Sanitising an already sanitised name returns it
/// unchanged.
#[must_use]
pub fn sanitize_channel_name(name: &str, id: &str) -> String {
    let lowered = name.to_lowercase();
    if is_valid_channel_name(&lowered) {
        lowered
    } else {
        debug!(name, id, "Channel name is not valid, deriving from ID");
        channel_name_from_id(id)
    }
}

/// Hands out team-unique channel names.
#[derive(Debug, Default)]
pub struct ChannelNames {
    used: HashSet<String>,
}

impl ChannelNames {
    /// Create an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a unique name for a channel.
    ///
    /// A name already taken falls back to the ID-derived name; a clash on
    /// that too gets a numeric suffix.
    pub fn allocate(&mut self, name: &str, id: &str) -> String {
        let candidate = sanitize_channel_name(name, id);
        if self.used.insert(candidate.clone()) {
            return candidate;
        }

        let from_id = channel_name_from_id(id);
        warn!(name = %candidate, id, fallback = %from_id, "Duplicate channel name");
        if self.used.insert(from_id.clone()) {
            return from_id;
        }

        let mut n = 2;
        loop {
            let suffix = format!("-{n}");
            let base = truncate_chars(&from_id, MAX_CHANNEL_NAME - suffix.len());
            let next = format!("{base}{suffix}");
            if self.used.insert(next.clone()) {
                return next;
            }
            n += 1;
        }
    }
}

fn is_username_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '-' | '_')
}

/// Normalise a handle into a valid username.
///
/// Lowercases, replaces disallowed characters with `_`, makes sure the name
/// starts with a letter and caps the length.
#[must_use]
pub fn normalize_username(raw: &str) -> String {
    let mut name: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if is_username_char(c) { c } else { '_' })
        .collect();
    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        name.insert(0, 'u');
    }
    truncate_chars(&name, MAX_USERNAME)
}

/// Hands out unique usernames in provider order.
#[derive(Debug, Default)]
pub struct Usernames {
    used: HashSet<String>,
}

impl Usernames {
    /// Create an empty allocator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a unique username; collisions get `-2`, `-3`, ...
    pub fn allocate(&mut self, raw: &str) -> String {
        let base = normalize_username(raw);
        if self.used.insert(base.clone()) {
            return base;
        }

        let mut n = 2;
        loop {
            let suffix = format!("-{n}");
            let next = format!("{}{suffix}", truncate_chars(&base, MAX_USERNAME - suffix.len()));
            if self.used.insert(next.clone()) {
                warn!(raw, username = %next, "Username collision resolved with suffix");
                return next;
            }
            n += 1;
        }
    }
}

/// Derive a user's email address.
///
/// A provider address wins; otherwise `<username>@<default_domain>`.
/// Returns an empty string (with a warning) when neither is available.
#[must_use]
pub fn derive_email(provided: Option<&str>, username: &str, default_domain: Option<&str>) -> String {
    if let Some(email) = provided.map(str::trim).filter(|e| !e.is_empty()) {
        return email.to_lowercase();
    }
    match default_domain.map(str::trim).filter(|d| !d.is_empty()) {
        Some(domain) => format!("{username}@{}", domain.trim_start_matches('@')).to_lowercase(),
        None => {
            warn!(username, "No email address and no default email domain");
            String::new()
        }
    }
}

/// Split a display name into first and last name at the first space.
#[must_use]
pub fn split_full_name(full: &str) -> (String, String) {
    match full.trim().split_once(' ') {
        Some((first, last)) => (first.to_string(), last.trim().to_string()),
        None => (full.trim().to_string(), String::new()),
    }
}
