//! Canonical in-memory representation of ledger state.
//!
//! This is the memory boundary for `rapport-ledger`:
//! - load/store JSONL
//! - keep edges indexed by their unordered pair, so duplicates are
//!   unrepresentable
//! - expose the store contract to single- and multi-threaded callers

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::edge::{Edge, NewEdge, PairKey};
use crate::jsonl::{StoreRecord, read_records_from_path, write_records_to_path};
use crate::query::{EdgePatch, EdgePredicate, ProfileQuery};
use crate::store::{EdgeStore, ProfileDirectory, StoreError};
use crate::user::{PublicProfile, UserId, UserProfile};

/// In-memory edges and profiles.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    edges: BTreeMap<PairKey, Edge>,
    users: BTreeMap<UserId, UserProfile>,
}

impl MemoryStore {
    /// Build a store from persisted records.
    ///
    /// Users resolve with last-write-wins. Two edges on one unordered pair
    /// mean the file was edited by hand or by a broken writer, and are
    /// rejected.
    pub fn from_records(records: Vec<StoreRecord>) -> Result<Self, StoreError> {
        let mut store = Self::default();
        for record in records {
            match record {
                StoreRecord::User(profile) => {
                    if profile.id.is_blank() {
                        return Err(StoreError::Corrupt(format!(
                            "user record <{}> has a blank id",
                            profile.email
                        )));
                    }
                    store.users.insert(profile.id.clone(), profile);
                }
                StoreRecord::Edge(edge) => {
                    if edge.id.trim().is_empty()
                        || edge.sender.is_blank()
                        || edge.receiver.is_blank()
                    {
                        return Err(StoreError::Corrupt(format!(
                            "edge `{}` ({} -> {}) has a blank identifier",
                            edge.id, edge.sender, edge.receiver
                        )));
                    }
                    if edge.sender == edge.receiver {
                        return Err(StoreError::Corrupt(format!(
                            "edge {} links {} to itself",
                            edge.id, edge.sender
                        )));
                    }
                    let key = edge.pair_key();
                    if let Some(existing) = store.edges.get(&key) {
                        return Err(StoreError::Corrupt(format!(
                            "edges {} and {} share pair {key}",
                            existing.id, edge.id
                        )));
                    }
                    store.edges.insert(key, edge);
                }
            }
        }
        Ok(store)
    }

    /// Load store state from a JSONL file.
    pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let records = read_records_from_path(path)?;
        Self::from_records(records)
    }

    /// Load from `path`, or start empty when the file does not exist yet.
    pub fn load_jsonl_or_empty(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_jsonl(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Persist store state to a JSONL file.
    pub fn save_jsonl(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        write_records_to_path(path, &self.records())?;
        Ok(())
    }

    /// Users first, then edges, each in key order.
    pub fn records(&self) -> Vec<StoreRecord> {
        self.users
            .values()
            .cloned()
            .map(StoreRecord::User)
            .chain(self.edges.values().cloned().map(StoreRecord::Edge))
            .collect()
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn user(&self, id: &UserId) -> Option<&UserProfile> {
        self.users.get(id)
    }

    pub fn find_one(&self, predicate: &EdgePredicate) -> Option<&Edge> {
        self.edges.values().find(|edge| predicate.matches(edge))
    }

    pub fn find(&self, predicate: &EdgePredicate) -> Vec<&Edge> {
        self.edges
            .values()
            .filter(|edge| predicate.matches(edge))
            .collect()
    }

    /// Conditional insert keyed on the unordered pair.
    pub fn create(&mut self, new_edge: NewEdge) -> Result<Edge, StoreError> {
        let key = new_edge.pair_key();
        if let Some(existing) = self.edges.get(&key) {
            return Err(StoreError::DuplicatePair {
                existing: existing.status,
            });
        }
        let edge = new_edge.into_edge();
        self.edges.insert(key, edge.clone());
        Ok(edge)
    }

    pub fn update_one(&mut self, predicate: &EdgePredicate, patch: &EdgePatch) -> Option<Edge> {
        let edge = self.edges.values_mut().find(|edge| predicate.matches(edge))?;
        if patch.apply(edge) {
            edge.touch_updated_at();
        }
        Some(edge.clone())
    }

    pub fn delete_one(&mut self, predicate: &EdgePredicate) -> Option<Edge> {
        let key = self.find_one(predicate)?.pair_key();
        self.edges.remove(&key)
    }

    pub fn profiles(&self, query: &ProfileQuery) -> Vec<PublicProfile> {
        self.users
            .values()
            .filter(|profile| query.matches(profile))
            .map(UserProfile::to_public)
            .collect()
    }

    /// Insert or replace a profile by ID; returns the previous value.
    pub fn upsert_profile(&mut self, profile: UserProfile) -> Option<UserProfile> {
        self.users.insert(profile.id.clone(), profile)
    }
}

/// Thread-safe handle over one [`MemoryStore`].
///
/// Every trait call holds the mutex for its whole read-check-write window.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<Mutex<MemoryStore>>,
}

impl SharedStore {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryStore>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> Result<MemoryStore, StoreError> {
        Ok(self.lock()?.clone())
    }
}

impl EdgeStore for SharedStore {
    fn find_one(&self, predicate: &EdgePredicate) -> Result<Option<Edge>, StoreError> {
        Ok(self.lock()?.find_one(predicate).cloned())
    }

    fn find(&self, predicate: &EdgePredicate) -> Result<Vec<Edge>, StoreError> {
        Ok(self.lock()?.find(predicate).into_iter().cloned().collect())
    }

    fn create(&self, edge: NewEdge) -> Result<Edge, StoreError> {
        self.lock()?.create(edge)
    }

    fn find_one_and_update(
        &self,
        predicate: &EdgePredicate,
        patch: EdgePatch,
    ) -> Result<Option<Edge>, StoreError> {
        Ok(self.lock()?.update_one(predicate, &patch))
    }

    fn find_one_and_delete(&self, predicate: &EdgePredicate) -> Result<Option<Edge>, StoreError> {
        Ok(self.lock()?.delete_one(predicate))
    }
}

impl ProfileDirectory for SharedStore {
    fn profiles(&self, query: &ProfileQuery) -> Result<Vec<PublicProfile>, StoreError> {
        Ok(self.lock()?.profiles(query))
    }

    fn upsert_profile(&self, profile: UserProfile) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.lock()?.upsert_profile(profile))
    }
}
