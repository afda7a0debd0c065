//! Users.

use serde::{Deserialize, Serialize};

/// A user in the canonical model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable provider ID.
    pub id: String,
    /// Lowercase, team-unique username.
    pub username: String,
    /// Lowercase email address (may be empty when none could be derived).
    pub email: String,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Job title.
    pub position: String,
    /// Profile image reference, if the provider supplied one.
    pub profile_image: Option<String>,
    /// Names of the team channels this user belongs to.
    pub memberships: Vec<String>,
    /// Whether the account is deactivated.
    pub deleted: bool,
}

impl User {
    /// Create a user with only ID and username set.
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            ..Self::default()
        }
    }
}
