//! GitHub via the `gh` CLI

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Forge, PrInfo, PrState, RemoteUrl};
use crate::error::{WtError, WtResult};
use crate::exec;

const PR_FIELDS: &str = "number,state,isDraft,url,author,comments,reviews,reviewDecision";

/// One element of `gh pr list --json ...`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhPr {
    number: u64,
    state: String,
    #[serde(default)]
    is_draft: bool,
    #[serde(default)]
    url: String,
    #[serde(default)]
    author: Option<GhAuthor>,
    #[serde(default)]
    comments: Vec<serde_json::Value>,
    #[serde(default)]
    reviews: Vec<serde_json::Value>,
    #[serde(default)]
    review_decision: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GhAuthor {
    login: String,
}

/// Counts above `u32::MAX` saturate
fn saturating_count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

impl From<GhPr> for PrInfo {
    fn from(pr: GhPr) -> Self {
        let state = match pr.state.as_str() {
            "MERGED" => PrState::Merged,
            "CLOSED" => PrState::Closed,
            _ => PrState::Open,
        };
        Self {
            number: pr.number,
            state,
            is_draft: pr.is_draft,
            url: pr.url,
            author: pr.author.map(|a| a.login).unwrap_or_default(),
            comment_count: saturating_count(pr.comments.len()),
            has_reviews: !pr.reviews.is_empty(),
            is_approved: pr.review_decision.as_deref() == Some("APPROVED"),
        }
    }
}

/// Parse `gh pr list` output; the first (newest) PR wins
fn parse_pr_list(stdout: &str) -> WtResult<Option<PrInfo>> {
    let prs: Vec<GhPr> = serde_json::from_str(stdout).map_err(|e| WtError::Forge {
        reason: format!("failed to parse gh pr list output: {}", e),
    })?;
    Ok(prs.into_iter().next().map(PrInfo::from))
}

/// GitHub client for one remote
#[derive(Debug, Clone)]
pub struct GithubCli {
    remote: RemoteUrl,
    gh_path: String,
}

impl GithubCli {
    pub fn new(remote: RemoteUrl) -> Self {
        Self {
            remote,
            gh_path: "gh".to_string(),
        }
    }

    fn repo_arg(&self) -> String {
        format!("{}/{}", self.remote.host, self.remote.path)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.gh_path);
        cmd.env("GH_PROMPT_DISABLED", "1");
        cmd
    }
}

#[async_trait]
impl Forge for GithubCli {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn check(&self, cancel: &CancellationToken) -> WtResult<()> {
        let mut cmd = self.command();
        cmd.args(["auth", "status", "--hostname", self.remote.host.as_str()]);

        let output = exec::run(cmd, cancel).await.map_err(|e| match e {
            WtError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => WtError::ForgeAuth {
                host: self.remote.host.clone(),
                reason: "gh CLI not found. Install from https://cli.github.com/".to_string(),
            },
            other => other,
        })?;

        if !output.status.success() {
            return Err(WtError::ForgeAuth {
                host: self.remote.host.clone(),
                reason: exec::failure_text(&output),
            });
        }
        Ok(())
    }

    async fn get_pr_for_branch(
        &self,
        cancel: &CancellationToken,
        _origin_url: &str,
        branch: &str,
    ) -> WtResult<Option<PrInfo>> {
        let repo = self.repo_arg();
        let mut cmd = self.command();
        cmd.args([
            "pr", "list", "--repo", repo.as_str(), "--head", branch, "--state", "all", "--limit", "1",
            "--json", PR_FIELDS,
        ]);

        debug!(repo = %repo, branch, "gh pr list");
        let output = exec::run(cmd, cancel).await?;
        if !output.status.success() {
            return Err(WtError::Forge {
                reason: format!("gh pr list failed: {}", exec::failure_text(&output)),
            });
        }

        parse_pr_list(&String::from_utf8_lossy(&output.stdout))
    }
}
