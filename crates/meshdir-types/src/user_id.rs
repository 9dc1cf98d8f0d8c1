//! user identifier type.

use serde::{Deserialize, Serialize};

/// unique identifier for a user.
///
/// user ids are opaque strings minted by the identity provider; meshdir
/// never interprets them beyond equality. the id doubles as the message
/// signed by clients to authenticate mutations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// create a user id from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// get the raw string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// the byte form used as the canonical signed message.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
