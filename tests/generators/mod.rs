//! Synthetic export generators.
//!
//! Builds Slack and Telegram exports on disk (or as zip archives) so the
//! integration tests can run the full pipeline without real data.

#![allow(dead_code)]

use std::path::Path;

use chat_etl::archive::{ArchiveIo, ZipArchiveIo};
use serde_json::{json, Value};

/// A Slack workspace export under construction.
#[derive(Debug, Clone, Default)]
pub struct SlackExportBuilder {
    channels: Vec<Value>,
    groups: Vec<Value>,
    mpims: Vec<Value>,
    dms: Vec<Value>,
    users: Vec<Value>,
    files: Vec<(String, Vec<u8>)>,
}

impl SlackExportBuilder {
    /// Start an empty export.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with an email address.
    pub fn user(mut self, id: &str, name: &str, email: &str) -> Self {
        self.users.push(json!({
            "id": id,
            "name": name,
            "profile": {"email": email, "real_name": format!("{name} Tester")}
        }));
        self
    }

    /// Add a public channel.
    pub fn channel(mut self, id: &str, name: &str, members: &[&str]) -> Self {
        self.channels.push(json!({"id": id, "name": name, "members": members}));
        self
    }

    /// Add a private channel.
    pub fn group(mut self, id: &str, name: &str, members: &[&str]) -> Self {
        self.groups.push(json!({"id": id, "name": name, "members": members}));
        self
    }

    /// Add a direct channel.
    pub fn dm(mut self, id: &str, members: &[&str]) -> Self {
        self.dms.push(json!({"id": id, "members": members}));
        self
    }

    /// Add one day file of messages for a channel directory.
    pub fn messages(mut self, dir: &str, day: &str, messages: Value) -> Self {
        self.files.push((
            format!("{dir}/{day}.json"),
            serde_json::to_vec(&messages).unwrap(),
        ));
        self
    }

    /// Add an uploaded file body.
    pub fn upload(mut self, file_id: &str, name: &str, body: &[u8]) -> Self {
        self.files.push((format!("__uploads/{file_id}/{name}"), body.to_vec()));
        self
    }

    /// Write the export into `dir`.
    pub fn write_to(&self, dir: &Path) {
        write(dir, "channels.json", &serde_json::to_vec(&self.channels).unwrap());
        write(dir, "users.json", &serde_json::to_vec(&self.users).unwrap());
        if !self.groups.is_empty() {
            write(dir, "groups.json", &serde_json::to_vec(&self.groups).unwrap());
        }
        if !self.mpims.is_empty() {
            write(dir, "mpims.json", &serde_json::to_vec(&self.mpims).unwrap());
        }
        if !self.dms.is_empty() {
            write(dir, "dms.json", &serde_json::to_vec(&self.dms).unwrap());
        }
        for (name, body) in &self.files {
            write(dir, name, body);
        }
    }

    /// Write the export as a zip archive at `path`.
    pub fn write_zip(&self, path: &Path) {
        let staging = tempfile::tempdir().unwrap();
        self.write_to(staging.path());
        ZipArchiveIo::new().compress(staging.path(), path).unwrap();
    }
}

/// A Slack message.
pub fn slack_message(user: &str, text: &str, ts: &str) -> Value {
    json!({"user": user, "text": text, "ts": ts})
}

/// A Slack message carrying a team ID, as found in grid exports.
pub fn grid_message(user: &str, text: &str, ts: &str, team: &str) -> Value {
    json!({"user": user, "text": text, "ts": ts, "team": team})
}

/// A Slack message with `count` uploaded files `F0..F{count-1}`.
pub fn message_with_files(user: &str, ts: &str, count: usize) -> Value {
    let files: Vec<Value> = (0..count)
        .map(|i| json!({"id": format!("F{i}"), "name": format!("file{i}.txt")}))
        .collect();
    json!({"user": user, "text": "files", "ts": ts, "files": files})
}

/// A Telegram chat export document.
pub fn telegram_chat(name: &str, chat_type: &str, id: i64, messages: Value) -> Value {
    json!({"name": name, "type": chat_type, "id": id, "messages": messages})
}

/// A Telegram text message.
pub fn telegram_message(id: i64, from_id: &str, from: &str, unix: i64, text: Value) -> Value {
    json!({
        "id": id,
        "type": "message",
        "date": "2024-01-01T00:00:00",
        "date_unixtime": unix.to_string(),
        "from": from,
        "from_id": from_id,
        "text": text
    })
}

/// Write `body` to `dir/name`, creating parent directories.
pub fn write(dir: &Path, name: &str, body: &[u8]) {
    let path = dir.join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}
