//! # rapport-ledger
//!
//! Friendship ledger over a document-style edge store.
//!
//! This crate provides:
//! - `Edge`, `EdgeStatus`, `PairKey` (one directed record per unordered pair)
//! - `UserProfile` / `PublicProfile` (credentials never leave the directory)
//! - `EdgeStore` / `ProfileDirectory` contracts with typed predicates
//! - `MemoryStore`, `SharedStore`, and the lock-scoped `JsonlStore`
//! - `FriendshipLedger`, which owns every edge transition
//!
//! Transport concerns (HTTP envelopes, CLI output) live in `rapport-http`
//! and `rapport-cli`.
//!
//! ## Data model
//!
//! ```text
//! JSONL (on disk, one line per user or edge)
//!     ↕  load / save under <path>.lock
//! MemoryStore (edges keyed by PairKey)
//!     ↑
//! FriendshipLedger (acting user passed explicitly)
//! ```

pub mod atomic_store;
pub mod edge;
pub mod error;
pub mod jsonl;
pub mod ledger;
pub mod memory;
pub mod query;
pub mod store;
pub mod user;

pub use atomic_store::{DEFAULT_LOCK_WAIT, JsonlStore, ledger_lock_path, mutate_store_jsonl};
pub use edge::{Edge, EdgeStatus, NewEdge, PairKey};
pub use error::LedgerError;
pub use jsonl::{JsonlError, StoreRecord, read_records_from_path, write_records_to_path};
pub use ledger::FriendshipLedger;
pub use memory::{MemoryStore, SharedStore};
pub use query::{EdgePatch, EdgePredicate, ProfileQuery};
pub use store::{EdgeStore, ProfileDirectory, StoreError};
pub use user::{PublicProfile, UserId, UserProfile};
