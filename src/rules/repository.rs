//! Rule repositories.
//!
//! The engine only needs [`RuleRepository::resolve`]. How rule sets are stored
//! and cached is up to the implementation:
//!
//! ```text
//! MemoryRepository      caller inserts RuleSets up front (tests, embedding)
//! DirectoryRepository   <dir>/<key>.json documents
//!     Eager  -> every document loaded at open()/reload()
//!     Lazy   -> a document is loaded on the first resolve() of its key;
//!               keys without a document are not cached
//! ```
//!
//! ## Invariants
//!
//! - `resolve` never fails: an unknown key yields the empty rule set.
//! - Keys are compared lower-cased.
//! - `DirectoryRepository` keeps an immutable [`Snapshot`] behind an `Arc`.
//!   Reloads and lazy loads build a new snapshot and swap it in under a short
//!   write lock; a rule set is never changed in place.

use super::set::{RuleSet, RuleSetKey};
use crate::error::{Error, Result};
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Source of rule sets for the calculation engine.
pub trait RuleRepository: Send + Sync {
    /// Rule set stored under `key`, or an empty one when there is none.
    fn resolve(&self, key: &RuleSetKey) -> Arc<RuleSet>;
}

// --- In-memory ---------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    sets: HashMap<RuleSetKey, Arc<RuleSet>>,
    empty: Arc<RuleSet>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl AsRef<str>, set: RuleSet) {
        self.sets.insert(RuleSetKey::new(key), Arc::new(set));
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl AsRef<str>, set: RuleSet) -> Self {
        self.insert(key, set);
        self
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl RuleRepository for MemoryRepository {
    fn resolve(&self, key: &RuleSetKey) -> Arc<RuleSet> {
        match self.sets.get(&RuleSetKey::new(key.as_str())) {
            Some(set) => Arc::clone(set),
            None => Arc::clone(&self.empty),
        }
    }
}

// --- Directory-backed --------------------------------------------------------

/// When a [`DirectoryRepository`] reads its documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStrategy {
    /// Read every `*.json` document at `open` and on each `reload`.
    #[default]
    Eager,
    /// Read a document the first time its key is resolved.
    Lazy,
}

/// Immutable view of the rule sets a [`DirectoryRepository`] has loaded.
#[derive(Debug, Clone)]
pub struct Snapshot {
    sets: HashMap<RuleSetKey, Arc<RuleSet>>,
    loaded_at: DateTime<Local>,
}

impl Snapshot {
    fn empty() -> Self {
        Snapshot { sets: HashMap::new(), loaded_at: Local::now() }
    }

    pub fn get(&self, key: &RuleSetKey) -> Option<&Arc<RuleSet>> {
        self.sets.get(key)
    }

    /// Loaded keys, sorted.
    pub fn keys(&self) -> Vec<&RuleSetKey> {
        let mut keys: Vec<&RuleSetKey> = self.sets.keys().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// When this snapshot was built.
    pub fn loaded_at(&self) -> DateTime<Local> {
        self.loaded_at
    }
}

/// Rule sets stored as `<key>.json` documents in one directory.
#[derive(Debug)]
pub struct DirectoryRepository {
    dir: PathBuf,
    strategy: LoadStrategy,
    snapshot: RwLock<Arc<Snapshot>>,
    empty: Arc<RuleSet>,
}

impl DirectoryRepository {
    /// Open `dir`. With [`LoadStrategy::Eager`] every document is read now.
    ///
    /// A directory that does not exist is not an error: the repository starts
    /// empty and every key resolves to the empty rule set.
    pub fn open(dir: impl Into<PathBuf>, strategy: LoadStrategy) -> Result<Self> {
        let repo = DirectoryRepository {
            dir: dir.into(),
            strategy,
            snapshot: RwLock::new(Arc::new(Snapshot::empty())),
            empty: Arc::new(RuleSet::empty()),
        };
        if strategy == LoadStrategy::Eager {
            repo.reload()?;
        }
        Ok(repo)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn strategy(&self) -> LoadStrategy {
        self.strategy
    }

    /// The current snapshot. Holding it does not block reloads.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Re-read documents from disk and swap in a fresh snapshot.
    ///
    /// Eager repositories rescan the whole directory; lazy ones re-read the
    /// keys they had already loaded. Returns the number of rule sets in the
    /// new snapshot.
    pub fn reload(&self) -> Result<usize> {
        let sets = match self.strategy {
            LoadStrategy::Eager => self.load_all()?,
            LoadStrategy::Lazy => {
                let current = self.snapshot();
                let mut sets = HashMap::new();
                for key in current.sets.keys() {
                    if let Some(set) = self.load_key(key) {
                        sets.insert(key.clone(), set);
                    }
                }
                sets
            }
        };

        let next = Arc::new(Snapshot { sets, loaded_at: Local::now() });
        let count = next.len();
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = next;

        tracing::info!(dir = %self.dir.display(), rule_sets = count, "rule sets reloaded");
        Ok(count)
    }

    /// Drop every cached rule set.
    ///
    /// A lazy repository reads documents again on demand; an eager one stays
    /// empty until the next [`reload`](Self::reload).
    pub fn invalidate(&self) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(Snapshot::empty());
        tracing::debug!(dir = %self.dir.display(), "rule set cache invalidated");
    }

    fn load_all(&self) -> Result<HashMap<RuleSetKey, Arc<RuleSet>>> {
        let mut sets = HashMap::new();
        if !self.dir.is_dir() {
            tracing::warn!(dir = %self.dir.display(), "no rules directory found");
            return Ok(sets);
        }

        let entries =
            std::fs::read_dir(&self.dir).map_err(|source| Error::RuleSetIo { path: self.dir.clone(), source })?;

        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(err) => {
                    tracing::warn!(dir = %self.dir.display(), error = %err, "skipping unreadable directory entry");
                    continue;
                }
            };
            let Some(key) = document_key(&path) else {
                continue;
            };
            match load_document(&path) {
                Ok(set) => {
                    tracing::debug!(key = %key, path = %path.display(), "loaded rule set");
                    sets.insert(key, Arc::new(set));
                }
                Err(err) => tracing::warn!(error = %err, "skipping rule set"),
            }
        }

        Ok(sets)
    }

    /// Read the document for `key`; `None` when it is missing or malformed.
    fn load_key(&self, key: &RuleSetKey) -> Option<Arc<RuleSet>> {
        let Some(path) = self.find_document(key) else {
            tracing::debug!(key = %key, dir = %self.dir.display(), "no rule set document");
            return None;
        };
        match load_document(&path) {
            Ok(set) => Some(Arc::new(set)),
            Err(err) => {
                tracing::warn!(error = %err, "failed to load rule set, using empty set");
                None
            }
        }
    }

    /// Locate `<key>.json`, falling back to a case-insensitive scan so
    /// `hingedMetalDoors.json` answers for `hingedmetaldoors`.
    fn find_document(&self, key: &RuleSetKey) -> Option<PathBuf> {
        let direct = self.dir.join(key.file_name());
        if direct.is_file() {
            return Some(direct);
        }
        std::fs::read_dir(&self.dir)
            .ok()?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .find(|path| document_key(path).as_ref() == Some(key))
    }
}

impl RuleRepository for DirectoryRepository {
    fn resolve(&self, key: &RuleSetKey) -> Arc<RuleSet> {
        let key = RuleSetKey::new(key.as_str());
        if let Some(set) = self.snapshot().get(&key) {
            return Arc::clone(set);
        }

        match self.strategy {
            LoadStrategy::Eager => Arc::clone(&self.empty),
            LoadStrategy::Lazy => {
                // Misses are not cached: keys come from free-text styles.
                let Some(set) = self.load_key(&key) else {
                    return Arc::clone(&self.empty);
                };
                let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
                let mut next = Snapshot::clone(&guard);
                next.sets.insert(key, Arc::clone(&set));
                *guard = Arc::new(next);
                set
            }
        }
    }
}

/// Key for a `*.json` path (its lower-cased stem), or `None` for other files.
fn document_key(path: &Path) -> Option<RuleSetKey> {
    let is_json = path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if !is_json || !path.is_file() {
        return None;
    }
    path.file_stem().and_then(|s| s.to_str()).map(RuleSetKey::new)
}

fn load_document(path: &Path) -> Result<RuleSet> {
    let content =
        std::fs::read_to_string(path).map_err(|source| Error::RuleSetIo { path: path.to_path_buf(), source })?;
    RuleSet::from_json_str(&content).map_err(|source| Error::RuleSetFormat { path: path.to_path_buf(), source })
}
