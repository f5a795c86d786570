//! Lock-scoped atomic mutation over a JSONL ledger file.

use chrono::Utc;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::edge::{Edge, NewEdge};
use crate::memory::MemoryStore;
use crate::query::{EdgePatch, EdgePredicate, ProfileQuery};
use crate::store::{EdgeStore, ProfileDirectory, StoreError};
use crate::user::{PublicProfile, UserProfile};

pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_millis(2000);
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub fn ledger_lock_path(ledger_path: &Path) -> PathBuf {
    let mut path: OsString = ledger_path.as_os_str().to_os_string();
    path.push(".lock");
    PathBuf::from(path)
}

/// Execute one lock-scoped store mutation against a ledger JSONL path.
///
/// The mutator returns `(value, changed)`; `changed=true` persists the store
/// before the lock is released. A missing file starts as an empty store.
pub fn mutate_store_jsonl<T, F>(
    path: impl AsRef<Path>,
    lock_wait: Duration,
    mutator: F,
) -> Result<T, StoreError>
where
    F: FnOnce(&mut MemoryStore) -> Result<(T, bool), StoreError>,
{
    let path = path.as_ref();
    let _guard = LedgerFileLockGuard::acquire(path, lock_wait)?;

    let mut store = MemoryStore::load_jsonl_or_empty(path)?;
    let (value, changed) = mutator(&mut store)?;
    if changed {
        store.save_jsonl(path)?;
        log::debug!("persisted ledger {}", path.display());
    }
    Ok(value)
}

struct LedgerFileLockGuard {
    lock_path: PathBuf,
    _file: File,
}

impl LedgerFileLockGuard {
    fn acquire(path: &Path, lock_wait: Duration) -> Result<Self, StoreError> {
        let lock_path = ledger_lock_path(path);
        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| lock_io(&lock_path, e.to_string()))?;
        }

        let deadline = Instant::now() + lock_wait;
        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(mut file) => {
                    let _ = writeln!(
                        file,
                        "pid={}\nutc={}",
                        std::process::id(),
                        Utc::now().to_rfc3339()
                    );
                    log::debug!("acquired ledger lock {}", lock_path.display());
                    return Ok(Self {
                        lock_path,
                        _file: file,
                    });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(StoreError::LockBusy {
                            lock_path: lock_path.display().to_string(),
                        });
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(err) => return Err(lock_io(&lock_path, err.to_string())),
            }
        }
    }
}

impl Drop for LedgerFileLockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

fn lock_io(lock_path: &Path, message: String) -> StoreError {
    StoreError::LockIo {
        lock_path: lock_path.display().to_string(),
        message,
    }
}

/// File-backed store: every call is one load (and, for writes, one locked
/// load-mutate-persist cycle) against the JSONL file.
#[derive(Debug, Clone)]
pub struct JsonlStore {
    path: PathBuf,
    lock_wait: Duration,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_wait: DEFAULT_LOCK_WAIT,
        }
    }

    pub fn with_lock_wait(mut self, lock_wait: Duration) -> Self {
        self.lock_wait = lock_wait;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<MemoryStore, StoreError> {
        MemoryStore::load_jsonl_or_empty(&self.path)
    }

    fn mutate<T, F>(&self, mutator: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut MemoryStore) -> Result<(T, bool), StoreError>,
    {
        mutate_store_jsonl(&self.path, self.lock_wait, mutator)
    }
}

impl EdgeStore for JsonlStore {
    fn find_one(&self, predicate: &EdgePredicate) -> Result<Option<Edge>, StoreError> {
        Ok(self.read()?.find_one(predicate).cloned())
    }

    fn find(&self, predicate: &EdgePredicate) -> Result<Vec<Edge>, StoreError> {
        Ok(self.read()?.find(predicate).into_iter().cloned().collect())
    }

    fn create(&self, edge: NewEdge) -> Result<Edge, StoreError> {
        self.mutate(|store| store.create(edge).map(|created| (created, true)))
    }

    fn find_one_and_update(
        &self,
        predicate: &EdgePredicate,
        patch: EdgePatch,
    ) -> Result<Option<Edge>, StoreError> {
        self.mutate(|store| {
            let updated = store.update_one(predicate, &patch);
            let changed = updated.is_some();
            Ok((updated, changed))
        })
    }

    fn find_one_and_delete(&self, predicate: &EdgePredicate) -> Result<Option<Edge>, StoreError> {
        self.mutate(|store| {
            let removed = store.delete_one(predicate);
            let changed = removed.is_some();
            Ok((removed, changed))
        })
    }
}

impl ProfileDirectory for JsonlStore {
    fn profiles(&self, query: &ProfileQuery) -> Result<Vec<PublicProfile>, StoreError> {
        Ok(self.read()?.profiles(query))
    }

    fn upsert_profile(&self, profile: UserProfile) -> Result<Option<UserProfile>, StoreError> {
        self.mutate(|store| Ok((store.upsert_profile(profile), true)))
    }
}
