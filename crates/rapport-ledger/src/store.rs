//! Storage contracts consumed by the ledger.
//!
//! Implementations must make each call atomic on its own. `create` in
//! particular is a conditional insert: it checks the unordered-pair key and
//! inserts inside one critical section, so two racing requests for the same
//! pair cannot both land.

use crate::edge::{Edge, EdgeStatus, NewEdge};
use crate::jsonl::JsonlError;
use crate::query::{EdgePatch, EdgePredicate, ProfileQuery};
use crate::user::{PublicProfile, UserProfile};

/// Errors raised by store adapters.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Jsonl(#[from] JsonlError),

    #[error("ledger lock busy: {lock_path}")]
    LockBusy { lock_path: String },

    #[error("failed to acquire ledger lock {lock_path}: {message}")]
    LockIo { lock_path: String, message: String },

    /// The conditional insert lost: an edge already occupies the pair.
    #[error("edge already exists for pair with status: {existing}")]
    DuplicatePair { existing: EdgeStatus },

    #[error("store mutex poisoned")]
    Poisoned,

    #[error("corrupted ledger: {0}")]
    Corrupt(String),
}

/// Edge persistence.
pub trait EdgeStore {
    fn find_one(&self, predicate: &EdgePredicate) -> Result<Option<Edge>, StoreError>;

    fn find(&self, predicate: &EdgePredicate) -> Result<Vec<Edge>, StoreError>;

    /// Insert unless the unordered pair is already taken.
    fn create(&self, edge: NewEdge) -> Result<Edge, StoreError>;

    /// Patch the first matching edge and return it post-update.
    fn find_one_and_update(
        &self,
        predicate: &EdgePredicate,
        patch: EdgePatch,
    ) -> Result<Option<Edge>, StoreError>;

    /// Remove the first matching edge and return it.
    fn find_one_and_delete(&self, predicate: &EdgePredicate) -> Result<Option<Edge>, StoreError>;
}

/// Read access to user profiles, owned outside the ledger.
pub trait ProfileDirectory {
    /// Profiles matching `query`, stripped to public fields.
    fn profiles(&self, query: &ProfileQuery) -> Result<Vec<PublicProfile>, StoreError>;

    fn upsert_profile(&self, profile: UserProfile) -> Result<Option<UserProfile>, StoreError>;
}
