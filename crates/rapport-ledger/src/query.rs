//! Typed predicates for the store boundary.

use regex::{Regex, RegexBuilder};

use crate::edge::{Edge, EdgeStatus};
use crate::user::{UserId, UserProfile};

/// Which edges a store call selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgePredicate {
    /// One orientation only: `sender -> receiver`.
    Exact {
        sender: UserId,
        receiver: UserId,
        status: Option<EdgeStatus>,
    },
    /// Either orientation between `a` and `b`.
    Between {
        a: UserId,
        b: UserId,
        status: Option<EdgeStatus>,
    },
    /// Any edge with `user` as an endpoint.
    Involving {
        user: UserId,
        status: Option<EdgeStatus>,
    },
}

impl EdgePredicate {
    pub fn exact(sender: &UserId, receiver: &UserId) -> Self {
        Self::Exact {
            sender: sender.clone(),
            receiver: receiver.clone(),
            status: None,
        }
    }

    pub fn between(a: &UserId, b: &UserId) -> Self {
        Self::Between {
            a: a.clone(),
            b: b.clone(),
            status: None,
        }
    }

    pub fn involving(user: &UserId) -> Self {
        Self::Involving {
            user: user.clone(),
            status: None,
        }
    }

    /// Restrict the predicate to edges in `wanted` state.
    pub fn with_status(mut self, wanted: EdgeStatus) -> Self {
        match &mut self {
            Self::Exact { status, .. } | Self::Between { status, .. } | Self::Involving { status, .. } => {
                *status = Some(wanted);
            }
        }
        self
    }

    fn status(&self) -> Option<EdgeStatus> {
        match self {
            Self::Exact { status, .. } | Self::Between { status, .. } | Self::Involving { status, .. } => {
                *status
            }
        }
    }

    pub fn matches(&self, edge: &Edge) -> bool {
        if self.status().is_some_and(|status| status != edge.status) {
            return false;
        }
        match self {
            Self::Exact {
                sender, receiver, ..
            } => edge.sender == *sender && edge.receiver == *receiver,
            Self::Between { a, b, .. } => {
                (edge.sender == *a && edge.receiver == *b)
                    || (edge.sender == *b && edge.receiver == *a)
            }
            Self::Involving { user, .. } => edge.involves(user),
        }
    }
}

/// Field updates applied by `find_one_and_update`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgePatch {
    pub status: Option<EdgeStatus>,
}

impl EdgePatch {
    pub fn status(status: EdgeStatus) -> Self {
        Self {
            status: Some(status),
        }
    }

    /// Apply to `edge`; returns whether any field changed.
    pub fn apply(&self, edge: &mut Edge) -> bool {
        let mut changed = false;
        if let Some(status) = self.status
            && edge.status != status
        {
            edge.status = status;
            changed = true;
        }
        changed
    }
}

/// Profile lookup: identifier set membership plus optional text filter.
#[derive(Debug, Clone, Default)]
pub struct ProfileQuery {
    pub ids: Vec<UserId>,
    text: Option<Regex>,
}

impl ProfileQuery {
    pub fn ids(ids: Vec<UserId>) -> Self {
        Self { ids, text: None }
    }

    /// Case-insensitive literal substring match on full name or email.
    pub fn containing(mut self, needle: &str) -> Result<Self, regex::Error> {
        // Escaped, so the needle is a literal and never a pattern.
        let pattern = RegexBuilder::new(&regex::escape(needle))
            .case_insensitive(true)
            .build()?;
        self.text = Some(pattern);
        Ok(self)
    }

    pub fn matches(&self, profile: &UserProfile) -> bool {
        if !self.ids.contains(&profile.id) {
            return false;
        }
        match &self.text {
            Some(pattern) => pattern.is_match(&profile.full_name) || pattern.is_match(&profile.email),
            None => true,
        }
    }
}
