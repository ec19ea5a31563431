//! PR status cache
//!
//! One JSON file under the state directory, loaded wholesale at start and
//! written wholesale at the end of a run, only if something changed. The
//! cache is an optimization: a missing or unreadable file yields an empty
//! store.
//!
//! Entries are keyed by repository path plus branch so identically named
//! branches in different repositories never collide, and so a worktree can
//! move on disk without losing its cached status.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{WtError, WtResult};
use crate::forge::{PrInfo, PrState};

/// Build the composite cache key for a branch of a repository
pub fn cache_key(repo_path: &Path, branch: &str) -> String {
    // NUL cannot appear in a path component or a ref name
    format!("{}\u{0}{}", repo_path.display(), branch)
}

/// Cached PR status for one branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrCacheEntry {
    #[serde(default)]
    pub number: u64,
    pub state: PrState,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub comment_count: u32,
    #[serde(default)]
    pub has_reviews: bool,
    #[serde(default)]
    pub is_approved: bool,
    pub fetched_at: DateTime<Utc>,
    /// True once a forge lookup actually completed for this branch
    #[serde(default)]
    pub fetched: bool,
}

impl PrCacheEntry {
    /// Entry for a successful lookup; `None` means the branch has no PR
    pub fn from_lookup(info: Option<PrInfo>, fetched_at: DateTime<Utc>) -> Self {
        match info {
            Some(info) => Self {
                number: info.number,
                state: info.state,
                is_draft: info.is_draft,
                url: info.url,
                author: info.author,
                comment_count: info.comment_count,
                has_reviews: info.has_reviews,
                is_approved: info.is_approved,
                fetched_at,
                fetched: true,
            },
            None => Self {
                number: 0,
                state: PrState::NoPr,
                is_draft: false,
                url: String::new(),
                author: String::new(),
                comment_count: 0,
                has_reviews: false,
                is_approved: false,
                fetched_at,
                fetched: true,
            },
        }
    }

    /// Merged is terminal; such entries never need refetching
    pub fn is_settled(&self) -> bool {
        self.fetched && self.state == PrState::Merged
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    entries: HashMap<String, PrCacheEntry>,
}

/// Shared PR cache store.
///
/// All access goes through these methods; the map itself is never handed
/// out. Entry mutation is serialized by an internal lock so refresh tasks
/// can share one store behind an `Arc`.
#[derive(Debug)]
pub struct PrCache {
    path: PathBuf,
    entries: Mutex<HashMap<String, PrCacheEntry>>,
    dirty: AtomicBool,
}

impl PrCache {
    /// Empty store that will persist to `path`
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(HashMap::new()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Load the store from `path`. Never fails: missing or corrupt files
    /// start an empty cache.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<CacheFile>(&content) {
                Ok(file) => file.entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "PR cache is corrupt, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no PR cache yet");
                HashMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "PR cache unreadable, starting empty");
                HashMap::new()
            }
        };

        Self {
            path,
            entries: Mutex::new(entries),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PrCacheEntry>> {
        // A panicking writer cannot leave a half-written entry: inserts are atomic
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<PrCacheEntry> {
        self.lock().get(key).cloned()
    }

    pub fn set(&self, key: String, entry: PrCacheEntry) {
        self.lock().insert(key, entry);
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Remove an entry; only marks the store dirty if something was removed
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.lock().remove(key).is_some();
        if removed {
            self.dirty.store(true, Ordering::SeqCst);
        }
        removed
    }

    /// Drop every entry
    pub fn reset(&self) {
        self.lock().clear();
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Persist the store if it changed since load. Returns whether a write
    /// happened. A clean store never touches the file.
    pub fn save_if_dirty(&self) -> WtResult<bool> {
        if !self.is_dirty() {
            return Ok(false);
        }

        let snapshot = CacheFile {
            entries: self.lock().clone(),
        };
        let content = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write-then-rename so a crash never leaves a truncated cache
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| WtError::Cache(format!("{}: {}", self.path.display(), e)))?;

        self.dirty.store(false, Ordering::SeqCst);
        debug!(path = %self.path.display(), "saved PR cache");
        Ok(true)
    }
}
