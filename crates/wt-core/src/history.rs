//! Recently used worktrees

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::WtResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub path: PathBuf,
    pub repo: String,
    pub branch: String,
    pub last_used: DateTime<Utc>,
}

/// Worktree usage history, most recent first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub entries: Vec<HistoryEntry>,
}

impl History {
    /// Load history; a missing or corrupt file yields empty history
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "history unreadable, starting empty");
                return Self::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "history is corrupt, starting empty");
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> WtResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Move `path` to the front, replacing any earlier entry for it
    pub fn record(&mut self, path: &Path, repo: &str, branch: &str) {
        self.entries.retain(|e| e.path != path);
        self.entries.insert(
            0,
            HistoryEntry {
                path: path.to_path_buf(),
                repo: repo.to_string(),
                branch: branch.to_string(),
                last_used: Utc::now(),
            },
        );
    }

    /// Drop entries for `path`; true if any were removed
    pub fn remove_by_path(&mut self, path: &Path) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.path != path);
        self.entries.len() != before
    }
}
