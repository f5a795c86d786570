//! User identifiers and profile records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a user account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse a caller-supplied identifier, treating blank input as absent.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A full profile as held by the directory, including credentials.
///
/// Never handed out by ledger queries; see [`PublicProfile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub avatar: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl UserProfile {
    pub fn new(id: impl Into<UserId>, full_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            email: email.into(),
            avatar: String::new(),
            password: String::new(),
            refresh_token: None,
        }
    }

    /// Project onto the fields safe to return to other users.
    pub fn to_public(&self) -> PublicProfile {
        PublicProfile {
            id: self.id.clone(),
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

/// Profile fields exposed by friend listing and search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub avatar: String,
}
