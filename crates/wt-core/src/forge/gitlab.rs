//! GitLab via the `glab` CLI

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Forge, PrInfo, PrState, RemoteUrl};
use crate::error::{WtError, WtResult};
use crate::exec;

/// One element of `glab mr list --output json`
#[derive(Debug, Deserialize)]
struct GlabMr {
    iid: u64,
    state: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    work_in_progress: bool,
    #[serde(default)]
    web_url: String,
    #[serde(default)]
    author: Option<GlabAuthor>,
    #[serde(default)]
    user_notes_count: u32,
}

#[derive(Debug, Deserialize)]
struct GlabAuthor {
    username: String,
}

impl From<GlabMr> for PrInfo {
    fn from(mr: GlabMr) -> Self {
        let state = match mr.state.as_str() {
            "merged" => PrState::Merged,
            "closed" | "locked" => PrState::Closed,
            _ => PrState::Open,
        };
        Self {
            number: mr.iid,
            state,
            is_draft: mr.draft || mr.work_in_progress,
            url: mr.web_url,
            author: mr.author.map(|a| a.username).unwrap_or_default(),
            comment_count: mr.user_notes_count,
            // The list endpoint carries no approval data
            has_reviews: false,
            is_approved: false,
        }
    }
}

fn parse_mr_list(stdout: &str) -> WtResult<Option<PrInfo>> {
    // glab prints nothing at all when there are no matches
    if stdout.trim().is_empty() {
        return Ok(None);
    }
    let mrs: Vec<GlabMr> = serde_json::from_str(stdout).map_err(|e| WtError::Forge {
        reason: format!("failed to parse glab mr list output: {}", e),
    })?;
    Ok(mrs.into_iter().next().map(PrInfo::from))
}

/// GitLab client for one remote
#[derive(Debug, Clone)]
pub struct GitlabCli {
    remote: RemoteUrl,
    glab_path: String,
}

impl GitlabCli {
    pub fn new(remote: RemoteUrl) -> Self {
        Self {
            remote,
            glab_path: "glab".to_string(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.glab_path);
        cmd.env("GITLAB_HOST", &self.remote.host)
            .env("NO_PROMPT", "1");
        cmd
    }
}

#[async_trait]
impl Forge for GitlabCli {
    fn name(&self) -> &'static str {
        "gitlab"
    }

    async fn check(&self, cancel: &CancellationToken) -> WtResult<()> {
        let mut cmd = self.command();
        cmd.args(["auth", "status", "--hostname", self.remote.host.as_str()]);

        let output = exec::run(cmd, cancel).await.map_err(|e| match e {
            WtError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => WtError::ForgeAuth {
                host: self.remote.host.clone(),
                reason: "glab CLI not found. Install from https://gitlab.com/gitlab-org/cli"
                    .to_string(),
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
        let mut cmd = self.command();
        cmd.args([
            "mr",
            "list",
            "--repo",
            self.remote.path.as_str(),
            "--source-branch",
            branch,
            "--all",
            "--per-page",
            "1",
            "--output",
            "json",
        ]);

        debug!(repo = %self.remote.path, branch, "glab mr list");
        let output = exec::run(cmd, cancel).await?;
        if !output.status.success() {
            return Err(WtError::Forge {
                reason: format!("glab mr list failed: {}", exec::failure_text(&output)),
            });
        }

        parse_mr_list(&String::from_utf8_lossy(&output.stdout))
    }
}
