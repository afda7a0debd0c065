//! Reconciliation against accounts that already exist on the target server.
//!
//! Runs after transformation and before export. The lookup is abstracted
//! behind [`UserDirectory`]; [`JsonUserDirectory`] reads an offline dump.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{EtlError, Result};
use crate::model::{Intermediate, PostTarget};

/// An account on the target server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DirectoryUser {
    /// Username.
    pub username: String,
    /// Email address.
    #[serde(default)]
    pub email: String,
}

/// Lookup of existing accounts.
pub trait UserDirectory {
    /// Find an account by username.
    fn find_by_username(&self, username: &str) -> Option<DirectoryUser>;

    /// Find an account by email address.
    fn find_by_email(&self, email: &str) -> Option<DirectoryUser>;
}

/// Directory loaded from a JSON array of `{"username", "email"}` objects.
///
/// Lookups are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct JsonUserDirectory {
    by_username: HashMap<String, DirectoryUser>,
    by_email: HashMap<String, DirectoryUser>,
}

impl JsonUserDirectory {
    /// Build from a list of accounts.
    #[must_use]
    pub fn from_users(users: Vec<DirectoryUser>) -> Self {
        let mut directory = Self::default();
        for user in users {
            let user = DirectoryUser {
                username: user.username.to_lowercase(),
                email: user.email.to_lowercase(),
            };
            if !user.email.is_empty() {
                directory.by_email.insert(user.email.clone(), user.clone());
            }
            directory.by_username.insert(user.username.clone(), user);
        }
        directory
    }

    /// Load a dump file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EtlError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                EtlError::io(format!("Failed to read {}", path.display()), e)
            }
        })?;
        let users: Vec<DirectoryUser> =
            serde_json::from_slice(&bytes).map_err(|e| EtlError::parse(path.display().to_string(), e))?;
        debug!(path = %path.display(), users = users.len(), "Loaded user directory");
        Ok(Self::from_users(users))
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_username.len()
    }

    /// Whether the directory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_username.is_empty()
    }
}

impl UserDirectory for JsonUserDirectory {
    fn find_by_username(&self, username: &str) -> Option<DirectoryUser> {
        self.by_username.get(&username.to_lowercase()).cloned()
    }

    fn find_by_email(&self, email: &str) -> Option<DirectoryUser> {
        self.by_email.get(&email.to_lowercase()).cloned()
    }
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// `(old, new)` usernames adopted from existing accounts.
    pub renamed: Vec<(String, String)>,
    /// Usernames taken by an account with a different email, or left alone
    /// because the existing username is already held by another exported user.
    pub conflicts: Vec<String>,
    /// Users already present with the same username and email.
    pub matched: usize,
}

/// Align exported users with existing accounts.
///
/// A user whose email belongs to an existing account adopts that account's
/// username everywhere it is referenced, unless another exported user already
/// holds that username. A username owned by an account with a different email
/// is reported and left alone.
pub fn reconcile_users(model: &mut Intermediate, directory: &dyn UserDirectory) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let mut renames: HashMap<String, String> = HashMap::new();
    let mut taken: HashSet<String> = model.users.values().map(|u| u.username.clone()).collect();

    for user in model.users.values_mut() {
        if !user.email.is_empty() {
            if let Some(existing) = directory.find_by_email(&user.email) {
                if existing.username == user.username {
                    report.matched += 1;
                } else if taken.contains(&existing.username) {
                    warn!(
                        username = %user.username,
                        existing = %existing.username,
                        email = %user.email,
                        "Existing username is held by another exported user, keeping the exported one"
                    );
                    report.conflicts.push(user.username.clone());
                } else {
                    info!(
                        from = %user.username,
                        to = %existing.username,
                        email = %user.email,
                        "Adopting existing username"
                    );
                    renames.insert(user.username.clone(), existing.username.clone());
                    report.renamed.push((user.username.clone(), existing.username.clone()));
                    taken.remove(&user.username);
                    taken.insert(existing.username.clone());
                    user.username = existing.username;
                }
                continue;
            }
        }

        if let Some(existing) = directory.find_by_username(&user.username) {
            warn!(
                username = %user.username,
                email = %user.email,
                existing_email = %existing.email,
                "Username already taken by an account with a different email"
            );
            report.conflicts.push(user.username.clone());
        }
    }

    if !renames.is_empty() {
        rename_references(model, &renames);
    }
    report
}

fn rename(name: &mut String, renames: &HashMap<String, String>) {
    if let Some(new) = renames.get(name.as_str()) {
        name.clone_from(new);
    }
}

fn rename_references(model: &mut Intermediate, renames: &HashMap<String, String>) {
    for post in &mut model.posts {
        rename(&mut post.user, renames);
        if let PostTarget::Direct(members) = &mut post.target {
            members.iter_mut().for_each(|m| rename(m, renames));
        }
        post.reactions.iter_mut().for_each(|r| rename(&mut r.user, renames));
        for reply in &mut post.replies {
            rename(&mut reply.user, renames);
            reply.reactions.iter_mut().for_each(|r| rename(&mut r.user, renames));
        }
    }
}
