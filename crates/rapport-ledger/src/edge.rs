//! Edge types: one directed record per friendship pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::user::UserId;

/// Lifecycle state of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStatus {
    Pending,
    Accepted,
}

impl EdgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeStatus::Pending => "pending",
            EdgeStatus::Accepted => "accepted",
        }
    }
}

impl fmt::Display for EdgeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored friendship record.
///
/// Directed while pending (only `receiver` may accept). Once accepted the
/// orientation carries no meaning beyond who initiated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub sender: UserId,
    pub receiver: UserId,
    pub status: EdgeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Edge {
    /// Canonical unordered-pair key of this edge.
    pub fn pair_key(&self) -> PairKey {
        PairKey::new(&self.sender, &self.receiver)
    }

    pub fn involves(&self, user: &UserId) -> bool {
        self.sender == *user || self.receiver == *user
    }

    /// The endpoint that is not `user`.
    ///
    /// Returns `None` when `user` is not an endpoint of this edge.
    pub fn other_party(&self, user: &UserId) -> Option<&UserId> {
        if self.sender == *user {
            Some(&self.receiver)
        } else if self.receiver == *user {
            Some(&self.sender)
        } else {
            None
        }
    }

    pub(crate) fn touch_updated_at(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Insert payload for a new edge; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEdge {
    pub sender: UserId,
    pub receiver: UserId,
    pub status: EdgeStatus,
}

impl NewEdge {
    pub fn pending(sender: UserId, receiver: UserId) -> Self {
        Self {
            sender,
            receiver,
            status: EdgeStatus::Pending,
        }
    }

    pub fn pair_key(&self) -> PairKey {
        PairKey::new(&self.sender, &self.receiver)
    }

    pub(crate) fn into_edge(self) -> Edge {
        let now = Utc::now();
        Edge {
            id: uuid::Uuid::new_v4().to_string(),
            sender: self.sender,
            receiver: self.receiver,
            status: self.status,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Sorted identifier tuple naming an unordered pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairKey(UserId, UserId);

impl PairKey {
    pub fn new(a: &UserId, b: &UserId) -> Self {
        if a <= b {
            Self(a.clone(), b.clone())
        } else {
            Self(b.clone(), a.clone())
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}}}", self.0, self.1)
    }
}
