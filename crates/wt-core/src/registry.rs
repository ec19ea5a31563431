//! Registry of repositories managed by wt
//!
//! Loaded once per invocation and written back only when mutated.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{WtError, WtResult};

/// A registered repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Unique, human-chosen name
    pub name: String,
    /// Filesystem root of the main worktree
    pub path: PathBuf,
    /// Grouping labels
    #[serde(default)]
    pub labels: BTreeSet<String>,
}

impl Repository {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            labels: BTreeSet::new(),
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

/// Process-wide set of registered repositories
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub repos: Vec<Repository>,
}

impl Registry {
    pub fn new(repos: Vec<Repository>) -> Self {
        Self { repos }
    }

    /// Load the registry; a missing file is an empty registry
    pub fn load(path: &Path) -> WtResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the registry, creating the parent directory if needed
    pub fn save(&self, path: &Path) -> WtResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn find_by_name(&self, name: &str) -> WtResult<&Repository> {
        self.repos
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| WtError::RepoNotFound {
                name: name.to_string(),
            })
    }

    pub fn find_by_label(&self, label: &str) -> Vec<&Repository> {
        self.repos.iter().filter(|r| r.has_label(label)).collect()
    }

    pub fn find_by_path(&self, path: &Path) -> Option<&Repository> {
        self.repos.iter().find(|r| r.path == path)
    }

    /// Repositories whose root still exists on disk
    pub fn reachable(&self) -> Vec<&Repository> {
        self.repos
            .iter()
            .filter(|r| {
                let exists = r.path.is_dir();
                if !exists {
                    warn!(repo = %r.name, path = %r.path.display(), "registered repository is not reachable");
                }
                exists
            })
            .collect()
    }

    /// Register a repository; names and paths must both be unique
    pub fn add(&mut self, repo: Repository) -> WtResult<()> {
        if self
            .repos
            .iter()
            .any(|r| r.name == repo.name || r.path == repo.path)
        {
            return Err(WtError::DuplicateRepoName { name: repo.name });
        }
        self.repos.push(repo);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> WtResult<Repository> {
        let idx = self
            .repos
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| WtError::RepoNotFound {
                name: name.to_string(),
            })?;
        Ok(self.repos.remove(idx))
    }

    pub fn set_labels(&mut self, name: &str, labels: BTreeSet<String>) -> WtResult<()> {
        let repo = self
            .repos
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| WtError::RepoNotFound {
                name: name.to_string(),
            })?;
        repo.labels = labels;
        Ok(())
    }

    /// Register `path` under its directory name if it is not yet known.
    ///
    /// Returns true when the registry changed and needs saving.
    pub fn ensure_registered(&mut self, path: &Path) -> bool {
        if self.find_by_path(path).is_some() {
            return false;
        }

        let base = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("repo")
            .to_string();

        let mut name = base.clone();
        let mut n = 2;
        while self.repos.iter().any(|r| r.name == name) {
            name = format!("{}-{}", base, n);
            n += 1;
        }

        self.repos.push(Repository::new(name, path));
        true
    }
}
