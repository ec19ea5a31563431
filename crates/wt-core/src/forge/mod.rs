//! Forge clients: PR status from GitHub- and GitLab-style hosts
//!
//! Both clients shell out to the forge's own CLI (`gh`, `glab`), which
//! already owns authentication. Detection maps an origin URL to a client
//! using the host name and the configured host overrides.

mod github;
mod gitlab;

use std::fmt;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::{ForgeConfig, ForgeKind};
use crate::error::{WtError, WtResult};

pub use github::GithubCli;
pub use gitlab::GitlabCli;

/// Pull/merge request state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrState {
    Open,
    Merged,
    Closed,
    /// Lookup succeeded but the branch has no PR
    NoPr,
}

impl fmt::Display for PrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrState::Open => write!(f, "open"),
            PrState::Merged => write!(f, "merged"),
            PrState::Closed => write!(f, "closed"),
            PrState::NoPr => write!(f, "none"),
        }
    }
}

/// PR details returned by a forge lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrInfo {
    pub number: u64,
    pub state: PrState,
    pub is_draft: bool,
    pub url: String,
    pub author: String,
    pub comment_count: u32,
    pub has_reviews: bool,
    pub is_approved: bool,
}

/// A forge reachable for one origin
#[async_trait]
pub trait Forge: Send + Sync {
    /// Short name for logs ("github", "gitlab")
    fn name(&self) -> &'static str;

    /// Verify the forge is reachable and we are authenticated
    async fn check(&self, cancel: &CancellationToken) -> WtResult<()>;

    /// Most recent PR whose head is `branch`, or `None` if there is none
    async fn get_pr_for_branch(
        &self,
        cancel: &CancellationToken,
        origin_url: &str,
        branch: &str,
    ) -> WtResult<Option<PrInfo>>;
}

/// Picks a [`Forge`] for an origin URL
pub trait ForgeProvider: Send + Sync {
    fn detect(&self, origin_url: &str) -> WtResult<Arc<dyn Forge>>;
}

/// Host and project path parsed from a git remote URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    pub host: String,
    /// `owner/repo`, or `group/subgroup/repo` on GitLab
    pub path: String,
}

static URL_FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?|ssh|git)://(?:[^@/]+@)?([^/:]+)(?::\d+)?/(.+?)(?:\.git)?/?$")
        .expect("valid regex")
});

static SCP_FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[^@/]+@)?([^/:]+):(.+?)(?:\.git)?/?$").expect("valid regex")
});

impl RemoteUrl {
    /// Parse `https://host/owner/repo(.git)`, `ssh://git@host[:port]/owner/repo`
    /// and scp-like `git@host:owner/repo(.git)`
    pub fn parse(url: &str) -> Option<Self> {
        let url = url.trim();
        let caps = URL_FORM.captures(url).or_else(|| {
            if url.contains("://") {
                None
            } else {
                SCP_FORM.captures(url)
            }
        })?;

        let host = caps.get(1)?.as_str().to_lowercase();
        let path = caps.get(2)?.as_str().trim_matches('/').to_string();
        if path.split('/').count() < 2 {
            return None;
        }
        Some(Self { host, path })
    }
}

/// Decide which forge speaks for `host`
pub fn forge_kind(host: &str, config: &ForgeConfig) -> Option<ForgeKind> {
    if let Some(kind) = config.hosts.get(host) {
        return Some(*kind);
    }
    if host == "github.com" || host.ends_with(".github.com") {
        Some(ForgeKind::Github)
    } else if host.contains("gitlab") {
        Some(ForgeKind::Gitlab)
    } else {
        None
    }
}

/// Build the forge client for `origin_url`
pub fn detect(origin_url: &str, config: &ForgeConfig) -> WtResult<Arc<dyn Forge>> {
    let unsupported = || WtError::UnsupportedForge {
        url: origin_url.to_string(),
    };
    let remote = RemoteUrl::parse(origin_url).ok_or_else(unsupported)?;
    match forge_kind(&remote.host, config).ok_or_else(unsupported)? {
        ForgeKind::Github => Ok(Arc::new(GithubCli::new(remote))),
        ForgeKind::Gitlab => Ok(Arc::new(GitlabCli::new(remote))),
    }
}

/// Detects forges using the CLI-backed clients and configured host map
#[derive(Debug, Clone, Default)]
pub struct CliForgeProvider {
    config: ForgeConfig,
}

impl CliForgeProvider {
    pub fn new(config: ForgeConfig) -> Self {
        Self { config }
    }
}

impl ForgeProvider for CliForgeProvider {
    fn detect(&self, origin_url: &str) -> WtResult<Arc<dyn Forge>> {
        detect(origin_url, &self.config)
    }
}
