//! Worktree creation for `[scope:]branch` targets

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::PrCache;
use crate::config::WorktreeConfig;
use crate::error::{WtError, WtResult};
use crate::git::GitClient;
use crate::history::History;
use crate::hooks::{HookContext, HookMatch, HookRunner};
use crate::registry::{Registry, Repository};
use crate::scope::{ResolvedTarget, resolve_scoped_target};
use crate::worktree::{collect_worktrees, worktree_path};

/// Where the requested branch ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutOutcome {
    pub repo: String,
    pub branch: String,
    pub path: PathBuf,
    /// False when a worktree for the branch already existed
    pub created: bool,
}

/// Collaborators a checkout uses
pub struct CheckoutContext<'a> {
    pub git: &'a dyn GitClient,
    pub hook_runner: &'a dyn HookRunner,
    /// Hooks already selected for `post-create`
    pub hooks: &'a [HookMatch],
    pub cache: &'a PrCache,
    pub history: &'a mut History,
    pub history_path: &'a Path,
    pub layout: &'a WorktreeConfig,
}

/// Exactly one hit is usable; a checkout never fans out
fn single<T>(target: &ResolvedTarget, hits: Vec<T>, repo_name: impl Fn(&T) -> &str) -> WtResult<T> {
    let mut hits = target.select_hits(hits, &repo_name)?;
    if hits.len() > 1 {
        return Err(WtError::AmbiguousTarget {
            identifier: target.identifier.clone(),
            repos: hits.iter().map(|h| repo_name(h).to_string()).collect(),
        });
    }
    hits.pop().ok_or_else(|| WtError::BranchNotFound {
        target: target.to_string(),
    })
}

/// Switch to `target`, creating a worktree for it when none exists.
///
/// An existing worktree for the branch is reported as is. Otherwise the
/// branch must exist in exactly one candidate repository, or `create` must
/// be set with exactly one candidate repository.
pub async fn checkout(
    cancel: &CancellationToken,
    registry: &Registry,
    ctx: &mut CheckoutContext<'_>,
    target: &str,
    create: bool,
) -> WtResult<CheckoutOutcome> {
    let resolved = resolve_scoped_target(registry, target)?;
    let branch = resolved.identifier.clone();

    let worktrees = collect_worktrees(cancel, ctx.git, &resolved.repos, ctx.cache).await?;
    let existing: Vec<_> = worktrees.iter().filter(|wt| wt.branch == branch).collect();

    if !existing.is_empty() {
        let wt = single(&resolved, existing, |wt| wt.repo_name.as_str())?;
        ctx.history.record(&wt.path, &wt.repo_name, &wt.branch);
        save_history(ctx);
        return Ok(CheckoutOutcome {
            repo: wt.repo_name.clone(),
            branch,
            path: wt.path.clone(),
            created: false,
        });
    }

    let mut with_branch: Vec<&Repository> = Vec::new();
    for repo in &resolved.repos {
        if ctx.git.branch_exists(cancel, &repo.path, &branch).await? {
            with_branch.push(repo);
        }
    }

    let (repo, create_branch) = if !with_branch.is_empty() {
        (single(&resolved, with_branch, |r| r.name.as_str())?, false)
    } else if create {
        let candidates: Vec<&Repository> = resolved.repos.iter().collect();
        (single(&resolved, candidates, |r| r.name.as_str())?, true)
    } else {
        return Err(WtError::BranchNotFound {
            target: resolved.to_string(),
        });
    };

    let path = worktree_path(&ctx.layout.base_dir(&repo.name, &repo.path), &branch);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    ctx.git
        .add_worktree(cancel, &repo.path, &path, &branch, create_branch)
        .await?;
    info!(repo = %repo.name, branch = %branch, path = %path.display(), "created worktree");

    ctx.history.record(&path, &repo.name, &branch);
    save_history(ctx);

    let hook_context = HookContext {
        repo: repo.name.clone(),
        branch: branch.clone(),
        path: path.clone(),
    };
    ctx.hook_runner
        .run_for_each(cancel, ctx.hooks, &hook_context, &path)
        .await;

    Ok(CheckoutOutcome {
        repo: repo.name.clone(),
        branch,
        path,
        created: true,
    })
}

fn save_history(ctx: &CheckoutContext<'_>) {
    if let Err(e) = ctx.history.save(ctx.history_path) {
        warn!(error = %e, "failed to save history");
    }
}
