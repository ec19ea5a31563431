//! Git plumbing for worktree operations
//!
//! `GitClient` is the narrow surface the refresh and prune pipelines need;
//! `GitCli` implements it by running `git -C <repo> ...` subprocesses.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{WtError, WtResult};
use crate::exec;

/// One entry of `git worktree list --porcelain`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    /// Short branch name; `None` when detached or bare
    pub branch: Option<String>,
    pub head: String,
    /// The repository's primary worktree (listed first by git)
    pub is_main: bool,
    pub is_bare: bool,
    pub is_detached: bool,
    pub is_locked: bool,
}

/// Parse `git worktree list --porcelain` output
pub fn parse_worktree_list(output: &str) -> Vec<WorktreeInfo> {
    let mut worktrees = Vec::new();
    let mut current: Option<WorktreeInfo> = None;

    for line in output.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(done) = current.take() {
                worktrees.push(done);
            }
            current = Some(WorktreeInfo {
                path: PathBuf::from(path),
                is_main: worktrees.is_empty(),
                ..Default::default()
            });
            continue;
        }

        let Some(wt) = current.as_mut() else {
            continue;
        };

        if let Some(head) = line.strip_prefix("HEAD ") {
            wt.head = head.to_string();
        } else if let Some(branch) = line.strip_prefix("branch ") {
            let short = branch.strip_prefix("refs/heads/").unwrap_or(branch);
            wt.branch = Some(short.to_string());
        } else if line == "detached" {
            wt.is_detached = true;
        } else if line == "bare" {
            wt.is_bare = true;
        } else if line == "locked" || line.starts_with("locked ") {
            wt.is_locked = true;
        }
    }

    if let Some(done) = current {
        worktrees.push(done);
    }
    worktrees
}

/// Git operations used by wt
#[async_trait]
pub trait GitClient: Send + Sync {
    async fn list_worktrees(
        &self,
        cancel: &CancellationToken,
        repo_path: &Path,
    ) -> WtResult<Vec<WorktreeInfo>>;

    /// True if the working tree has uncommitted or untracked changes
    async fn is_dirty(&self, cancel: &CancellationToken, path: &Path) -> WtResult<bool>;

    /// Upstream branch name (without the remote prefix), if one is configured
    async fn upstream_branch(
        &self,
        cancel: &CancellationToken,
        repo_path: &Path,
        branch: &str,
    ) -> WtResult<Option<String>>;

    async fn origin_url(&self, cancel: &CancellationToken, repo_path: &Path)
    -> WtResult<Option<String>>;

    /// True if a local branch named `branch` exists
    async fn branch_exists(
        &self,
        cancel: &CancellationToken,
        repo_path: &Path,
        branch: &str,
    ) -> WtResult<bool>;

    /// Add a worktree at `path`; `create_branch` creates `branch` from HEAD
    async fn add_worktree(
        &self,
        cancel: &CancellationToken,
        repo_path: &Path,
        path: &Path,
        branch: &str,
        create_branch: bool,
    ) -> WtResult<()>;

    async fn remove_worktree(
        &self,
        cancel: &CancellationToken,
        repo_path: &Path,
        path: &Path,
        force: bool,
    ) -> WtResult<()>;

    /// `git branch -d`, or `-D` when `force`
    async fn delete_local_branch(
        &self,
        cancel: &CancellationToken,
        repo_path: &Path,
        branch: &str,
        force: bool,
    ) -> WtResult<()>;

    /// Drop stale worktree administrative files
    async fn prune_worktrees(&self, cancel: &CancellationToken, repo_path: &Path) -> WtResult<()>;
}

/// `GitClient` backed by the git CLI
#[derive(Debug, Clone)]
pub struct GitCli {
    git_path: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            git_path: "git".to_string(),
        }
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self::default()
    }

    fn command(&self, dir: &Path) -> Command {
        let mut cmd = Command::new(&self.git_path);
        cmd.arg("-C").arg(dir);
        cmd
    }

    /// Run a git command that must succeed, returning stdout
    async fn run_checked(
        &self,
        cancel: &CancellationToken,
        dir: &Path,
        args: &[&str],
    ) -> WtResult<String> {
        let mut cmd = self.command(dir);
        cmd.args(args);
        debug!(dir = %dir.display(), ?args, "git");

        let output = exec::run(cmd, cancel).await.map_err(|e| match e {
            WtError::Io(io) => WtError::Git {
                command: args.join(" "),
                reason: format!("failed to run git: {}", io),
            },
            other => other,
        })?;

        if !output.status.success() {
            return Err(WtError::Git {
                command: args.join(" "),
                reason: exec::failure_text(&output),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Main repository root containing `dir`, or `None` outside a repository.
    ///
    /// Resolves through the common git dir so a linked worktree maps to the
    /// repository it was created from.
    pub async fn repo_root(&self, cancel: &CancellationToken, dir: &Path) -> WtResult<Option<PathBuf>> {
        let mut cmd = self.command(dir);
        cmd.args(["rev-parse", "--path-format=absolute", "--git-common-dir"]);
        let output = exec::run(cmd, cancel).await?;
        if !output.status.success() {
            return Ok(None);
        }
        let common = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());
        Ok(Some(repo_root_from_common_dir(&common)))
    }
}

/// `<repo>/.git` -> `<repo>`; a bare repository is its own root
fn repo_root_from_common_dir(common: &Path) -> PathBuf {
    match (common.file_name(), common.parent()) {
        (Some(name), Some(parent)) if name == ".git" => parent.to_path_buf(),
        _ => common.to_path_buf(),
    }
}

fn path_arg(path: &Path) -> WtResult<&str> {
    path.to_str().ok_or_else(|| WtError::Git {
        command: "worktree".to_string(),
        reason: format!("path is not valid UTF-8: {}", path.display()),
    })
}

#[async_trait]
impl GitClient for GitCli {
    async fn list_worktrees(
        &self,
        cancel: &CancellationToken,
        repo_path: &Path,
    ) -> WtResult<Vec<WorktreeInfo>> {
        let stdout = self
            .run_checked(cancel, repo_path, &["worktree", "list", "--porcelain"])
            .await?;
        Ok(parse_worktree_list(&stdout))
    }

    async fn is_dirty(&self, cancel: &CancellationToken, path: &Path) -> WtResult<bool> {
        let stdout = self
            .run_checked(cancel, path, &["status", "--porcelain"])
            .await?;
        Ok(!stdout.trim().is_empty())
    }

    async fn upstream_branch(
        &self,
        cancel: &CancellationToken,
        repo_path: &Path,
        branch: &str,
    ) -> WtResult<Option<String>> {
        let refname = format!("refs/heads/{}", branch);
        let stdout = self
            .run_checked(
                cancel,
                repo_path,
                &["for-each-ref", "--format=%(upstream:lstrip=3)", refname.as_str()],
            )
            .await?;
        let upstream = stdout.trim();
        Ok((!upstream.is_empty()).then(|| upstream.to_string()))
    }

    async fn origin_url(
        &self,
        cancel: &CancellationToken,
        repo_path: &Path,
    ) -> WtResult<Option<String>> {
        let mut cmd = self.command(repo_path);
        cmd.args(["remote", "get-url", "origin"]);
        let output = exec::run(cmd, cancel).await?;
        if !output.status.success() {
            // No origin remote configured
            return Ok(None);
        }
        let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!url.is_empty()).then_some(url))
    }

    async fn branch_exists(
        &self,
        cancel: &CancellationToken,
        repo_path: &Path,
        branch: &str,
    ) -> WtResult<bool> {
        let refname = format!("refs/heads/{}", branch);
        let mut cmd = self.command(repo_path);
        cmd.args(["show-ref", "--verify", "--quiet", refname.as_str()]);
        let output = exec::run(cmd, cancel).await?;
        Ok(output.status.success())
    }

    async fn add_worktree(
        &self,
        cancel: &CancellationToken,
        repo_path: &Path,
        path: &Path,
        branch: &str,
        create_branch: bool,
    ) -> WtResult<()> {
        let path_str = path_arg(path)?;
        let args: Vec<&str> = if create_branch {
            vec!["worktree", "add", "-b", branch, path_str]
        } else {
            vec!["worktree", "add", path_str, branch]
        };
        self.run_checked(cancel, repo_path, &args).await?;
        Ok(())
    }

    async fn remove_worktree(
        &self,
        cancel: &CancellationToken,
        repo_path: &Path,
        path: &Path,
        force: bool,
    ) -> WtResult<()> {
        let path_str = path_arg(path)?;
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(path_str);
        self.run_checked(cancel, repo_path, &args).await?;
        Ok(())
    }

    async fn delete_local_branch(
        &self,
        cancel: &CancellationToken,
        repo_path: &Path,
        branch: &str,
        force: bool,
    ) -> WtResult<()> {
        let flag = if force { "-D" } else { "-d" };
        self.run_checked(cancel, repo_path, &["branch", flag, branch])
            .await?;
        Ok(())
    }

    async fn prune_worktrees(&self, cancel: &CancellationToken, repo_path: &Path) -> WtResult<()> {
        self.run_checked(cancel, repo_path, &["worktree", "prune"])
            .await?;
        Ok(())
    }
}
