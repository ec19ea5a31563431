//! Configuration handling for wt
//!
//! `config.toml` lives in the config directory alongside the repository
//! registry. Mutable state (PR cache, history) lives in the state directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{WtError, WtResult};
use crate::hooks::HookConfig;

/// Environment variable overriding both config and state directories
pub const WT_HOME_ENV: &str = "WT_HOME";

/// Default admission bound for concurrent forge calls
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// wt configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Forge detection and request settings
    #[serde(default)]
    pub forge: ForgeConfig,

    /// Prune defaults
    #[serde(default)]
    pub prune: PruneConfig,

    /// Worktree placement
    #[serde(default)]
    pub worktree: WorktreeConfig,

    /// User-defined hooks
    #[serde(default)]
    pub hooks: Vec<HookConfig>,
}

/// Which forge API a host speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForgeKind {
    Github,
    Gitlab,
}

/// Forge settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeConfig {
    /// Explicit host -> forge mappings for self-hosted instances
    #[serde(default)]
    pub hosts: HashMap<String, ForgeKind>,

    /// Per-call deadline for forge requests
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum number of forge calls in flight during a refresh
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            hosts: HashMap::new(),
            timeout_secs: default_timeout_secs(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// Prune settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PruneConfig {
    /// Delete the local branch after its worktree is removed
    #[serde(default)]
    pub delete_branches: bool,
}

/// Worktree placement settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorktreeConfig {
    /// Base directory for new worktrees; defaults to a sibling of the repo
    #[serde(default)]
    pub root: Option<PathBuf>,
}

impl WorktreeConfig {
    /// Directory new worktrees of `repo_name` are created under
    pub fn base_dir(&self, repo_name: &str, repo_path: &Path) -> PathBuf {
        match &self.root {
            Some(root) => root.join(repo_name),
            None => {
                let parent = repo_path.parent().unwrap_or(repo_path);
                parent.join(format!("{}-worktrees", repo_name))
            }
        }
    }
}

impl Config {
    /// Load configuration from `path`, falling back to defaults if it does not exist
    pub fn load(path: &Path) -> WtResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| WtError::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Resolved on-disk locations for config and state
#[derive(Debug, Clone)]
pub struct Paths {
    pub config_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl Paths {
    /// Resolve directories from `WT_HOME` or the platform defaults
    pub fn discover() -> WtResult<Self> {
        if let Some(home) = std::env::var_os(WT_HOME_ENV) {
            return Ok(Self::under(Path::new(&home)));
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| WtError::Config("cannot determine config directory".to_string()))?
            .join("wt");
        let state_dir = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .ok_or_else(|| WtError::Config("cannot determine state directory".to_string()))?
            .join("wt");

        Ok(Self {
            config_dir,
            state_dir,
        })
    }

    /// All files under a single root (used by `WT_HOME` and tests)
    pub fn under(root: &Path) -> Self {
        Self {
            config_dir: root.to_path_buf(),
            state_dir: root.join("state"),
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn registry_file(&self) -> PathBuf {
        self.config_dir.join("repos.json")
    }

    pub fn cache_file(&self) -> PathBuf {
        self.state_dir.join("pr_cache.json")
    }

    pub fn history_file(&self) -> PathBuf {
        self.state_dir.join("history.json")
    }
}
