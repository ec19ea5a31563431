//! Prune decision pipeline
//!
//! Worktrees move through `collected -> classified -> removed | failed`.
//! Auto-prune classifies from cached PR state plus live cleanliness;
//! targeted prune resolves explicit `[scope:]branch` arguments and skips
//! classification. Removal itself is strictly sequential.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::PrCache;
use crate::error::{WtError, WtResult};
use crate::git::GitClient;
use crate::history::History;
use crate::hooks::{HookContext, HookMatch, HookRunner};
use crate::registry::{Registry, Repository};
use crate::scope::{dedup_by_path, resolve_scoped_target};
use crate::worktree::{Worktree, collect_worktrees, find_branch};

/// Why a worktree was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Uncommitted changes; never auto-pruned
    Dirty,
    /// No merged PR in the cache
    NotMerged,
    /// Left out by interactive selection
    Deselected,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SkipReason::Dirty => "uncommitted changes",
            SkipReason::NotMerged => "PR not merged",
            SkipReason::Deselected => "not selected",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Prunable,
    Skipped(SkipReason),
}

/// Prunable iff the cached PR is merged and the working tree is clean.
///
/// Reads only the cache; never calls the forge.
pub fn classify(wt: &Worktree, cache: &PrCache) -> Classification {
    if wt.is_dirty {
        return Classification::Skipped(SkipReason::Dirty);
    }
    if confirmed_merged(wt, cache) {
        Classification::Prunable
    } else {
        Classification::Skipped(SkipReason::NotMerged)
    }
}

/// True only when a completed forge lookup recorded the PR as merged
fn confirmed_merged(wt: &Worktree, cache: &PrCache) -> bool {
    cache
        .get(&wt.cache_key())
        .is_some_and(|entry| entry.is_settled())
}

/// A worktree scheduled for removal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PruneCandidate {
    pub worktree: Worktree,
    /// Forge confirmed the PR merged; allows force branch deletion
    pub confirmed_merged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedWorktree {
    pub worktree: Worktree,
    pub reason: SkipReason,
}

/// What a prune run will do
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrunePlan {
    pub to_remove: Vec<PruneCandidate>,
    pub skipped: Vec<SkippedWorktree>,
}

impl PrunePlan {
    /// Every worktree in the plan, removable ones first
    pub fn worktrees(&self) -> impl Iterator<Item = &Worktree> {
        self.to_remove
            .iter()
            .map(|c| &c.worktree)
            .chain(self.skipped.iter().map(|s| &s.worktree))
    }
}

/// Classify every non-main worktree of the scoped set
pub fn plan_auto_prune(worktrees: &[Worktree], cache: &PrCache) -> PrunePlan {
    let mut plan = PrunePlan::default();
    for wt in worktrees.iter().filter(|wt| !wt.is_main) {
        match classify(wt, cache) {
            Classification::Prunable => plan.to_remove.push(PruneCandidate {
                worktree: wt.clone(),
                confirmed_merged: true,
            }),
            Classification::Skipped(reason) => plan.skipped.push(SkippedWorktree {
                worktree: wt.clone(),
                reason,
            }),
        }
    }
    plan
}

/// Replace the rule-based split with an interactive selection.
///
/// The selection is final: selected paths are removed, everything else is
/// skipped, whatever the classification said.
pub fn apply_selection(plan: PrunePlan, selected: &HashSet<PathBuf>, cache: &PrCache) -> PrunePlan {
    let all: Vec<Worktree> = plan
        .to_remove
        .into_iter()
        .map(|c| c.worktree)
        .chain(plan.skipped.into_iter().map(|s| s.worktree))
        .collect();

    let mut result = PrunePlan::default();
    for wt in all {
        if selected.contains(&wt.path) {
            let confirmed_merged = confirmed_merged(&wt, cache);
            result.to_remove.push(PruneCandidate {
                worktree: wt,
                confirmed_merged,
            });
        } else {
            result.skipped.push(SkippedWorktree {
                worktree: wt,
                reason: SkipReason::Deselected,
            });
        }
    }
    result
}

/// Resolve explicit `[scope:]branch` targets into removal candidates.
///
/// Resolution errors abort before anything is removed. A label scope may
/// select the same branch in several repositories; a bare branch found in
/// more than one repository is ambiguous. Duplicate targets collapse to a
/// single candidate per path. Merge is never confirmed on this path.
pub async fn resolve_prune_targets(
    cancel: &CancellationToken,
    registry: &Registry,
    git: &dyn GitClient,
    cache: &PrCache,
    targets: &[String],
) -> WtResult<Vec<PruneCandidate>> {
    let resolved = targets
        .iter()
        .map(|t| resolve_scoped_target(registry, t))
        .collect::<WtResult<Vec<_>>>()?;

    let repos: Vec<Repository> =
        dedup_by_path(resolved.iter().flat_map(|r| r.repos.iter().cloned()));
    let worktrees = collect_worktrees(cancel, git, &repos, cache).await?;

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for target in &resolved {
        let in_scope: Vec<&Worktree> = find_branch(&worktrees, &target.identifier)
            .into_iter()
            .filter(|wt| target.repos.iter().any(|r| r.path == wt.repo_path))
            .collect();

        let hits = target.select_hits(in_scope, |wt| wt.repo_name.as_str())?;
        reject_multiple_per_repo(&target.identifier, &hits)?;

        for wt in hits {
            if seen.insert(wt.path.clone()) {
                candidates.push(PruneCandidate {
                    worktree: wt.clone(),
                    confirmed_merged: false,
                });
            } else {
                debug!(path = %wt.path.display(), "duplicate prune target");
            }
        }
    }

    Ok(candidates)
}

/// One target may name at most one worktree per repository
fn reject_multiple_per_repo(identifier: &str, hits: &[&Worktree]) -> WtResult<()> {
    for (i, wt) in hits.iter().enumerate() {
        if hits[..i].iter().any(|other| other.repo_path == wt.repo_path) {
            return Err(WtError::AmbiguousTarget {
                identifier: identifier.to_string(),
                repos: hits
                    .iter()
                    .filter(|h| h.repo_path == wt.repo_path)
                    .map(|h| h.identifier())
                    .collect(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct PruneOptions {
    /// Pass `--force` to `git worktree remove`
    pub force: bool,
    /// Delete the local branch after removal
    pub delete_branches: bool,
    /// Report only; touch nothing
    pub dry_run: bool,
}

/// Collaborators and state a prune run mutates
pub struct PruneContext<'a> {
    pub git: &'a dyn GitClient,
    pub hook_runner: &'a dyn HookRunner,
    /// Hooks already selected for `post-remove`
    pub hooks: &'a [HookMatch],
    pub cache: &'a PrCache,
    pub history: &'a mut History,
    pub history_path: &'a Path,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedWorktree {
    pub repo: String,
    pub branch: String,
    pub path: PathBuf,
    pub branch_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRemoval {
    pub repo: String,
    pub branch: String,
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a prune run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub dry_run: bool,
    pub removed: Vec<RemovedWorktree>,
    pub skipped: Vec<SkippedWorktree>,
    pub failed: Vec<FailedRemoval>,
}

impl PruneReport {
    /// Removal was requested and nothing succeeded
    pub fn all_failed(&self) -> bool {
        !self.failed.is_empty() && self.removed.is_empty()
    }

    pub fn summary(&self) -> String {
        let verb = if self.dry_run { "would remove" } else { "removed" };
        format!(
            "{} {}, skipped {}, failed {}",
            verb,
            self.removed.len(),
            self.skipped.len(),
            self.failed.len()
        )
    }
}

/// Execute `plan` one worktree at a time.
///
/// A failed removal is recorded and the batch continues. After the batch
/// each repository that had a removal attempted gets one stale-reference
/// prune. The cache is saved only if it changed.
pub async fn execute_prune(
    cancel: &CancellationToken,
    ctx: &mut PruneContext<'_>,
    plan: PrunePlan,
    options: &PruneOptions,
) -> PruneReport {
    let mut report = PruneReport {
        dry_run: options.dry_run,
        skipped: plan.skipped,
        ..Default::default()
    };

    if options.dry_run {
        report.removed = plan
            .to_remove
            .into_iter()
            .map(|c| RemovedWorktree {
                repo: c.worktree.repo_name,
                branch: c.worktree.branch,
                path: c.worktree.path,
                branch_deleted: false,
            })
            .collect();
        return report;
    }

    let mut touched_repos: Vec<PathBuf> = Vec::new();
    let mut history_changed = false;

    for candidate in plan.to_remove {
        let wt = candidate.worktree;
        if !touched_repos.contains(&wt.repo_path) {
            touched_repos.push(wt.repo_path.clone());
        }

        if let Err(e) = ctx
            .git
            .remove_worktree(cancel, &wt.repo_path, &wt.path, options.force)
            .await
        {
            warn!(worktree = %wt.identifier(), error = %e, "failed to remove worktree");
            report.failed.push(FailedRemoval {
                repo: wt.repo_name,
                branch: wt.branch,
                path: wt.path,
                error: e.to_string(),
            });
            continue;
        }
        info!(worktree = %wt.identifier(), path = %wt.path.display(), "removed worktree");

        ctx.cache.delete(&wt.cache_key());
        history_changed |= ctx.history.remove_by_path(&wt.path);

        let branch_deleted = options.delete_branches
            && delete_branch(cancel, ctx.git, &wt, candidate.confirmed_merged).await;

        let hook_context = HookContext {
            repo: wt.repo_name.clone(),
            branch: wt.branch.clone(),
            path: wt.path.clone(),
        };
        ctx.hook_runner
            .run_for_each(cancel, ctx.hooks, &hook_context, &wt.repo_path)
            .await;

        report.removed.push(RemovedWorktree {
            repo: wt.repo_name,
            branch: wt.branch,
            path: wt.path,
            branch_deleted,
        });
    }

    for repo_path in &touched_repos {
        if let Err(e) = ctx.git.prune_worktrees(cancel, repo_path).await {
            warn!(repo = %repo_path.display(), error = %e, "git worktree prune failed");
        }
    }

    match ctx.cache.save_if_dirty() {
        Ok(true) => debug!("PR cache saved"),
        Ok(false) => {}
        Err(e) => warn!(error = %e, "failed to save PR cache"),
    }

    if history_changed {
        if let Err(e) = ctx.history.save(ctx.history_path) {
            warn!(error = %e, "failed to save history");
        }
    }

    report
}

/// Delete the local branch; force only on forge-confirmed merge
async fn delete_branch(
    cancel: &CancellationToken,
    git: &dyn GitClient,
    wt: &Worktree,
    confirmed_merged: bool,
) -> bool {
    match git
        .delete_local_branch(cancel, &wt.repo_path, &wt.branch, confirmed_merged)
        .await
    {
        Ok(()) => true,
        Err(WtError::Git { reason, .. }) if !confirmed_merged => {
            warn!(
                branch = %wt.branch,
                reason = %reason,
                "branch not deleted; it is not merged as far as git knows"
            );
            false
        }
        Err(e) => {
            warn!(branch = %wt.branch, error = %e, "failed to delete branch");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PrCacheEntry;
    use crate::forge::PrState;
    use chrono::Utc;

    fn wt(branch: &str, dirty: bool) -> Worktree {
        Worktree {
            repo_name: "alpha".to_string(),
            repo_path: PathBuf::from("/src/alpha"),
            branch: branch.to_string(),
            path: PathBuf::from(format!("/src/alpha-worktrees/{}", branch)),
            origin_url: None,
            is_main: false,
            is_dirty: dirty,
            pr_state: None,
            pr_draft: false,
        }
    }

    fn set_state(cache: &PrCache, wt: &Worktree, state: PrState) {
        let mut entry = PrCacheEntry::from_lookup(None, Utc::now());
        entry.state = state;
        cache.set(wt.cache_key(), entry);
    }

    #[test]
    fn test_unfetched_merged_entry_is_not_prunable() {
        let cache = PrCache::empty("/nonexistent/pr_cache.json");
        let clean = wt("feature", false);
        let mut entry = PrCacheEntry::from_lookup(None, Utc::now());
        entry.state = PrState::Merged;
        entry.fetched = false;
        cache.set(clean.cache_key(), entry);

        assert_eq!(
            classify(&clean, &cache),
            Classification::Skipped(SkipReason::NotMerged)
        );
        assert!(plan_auto_prune(std::slice::from_ref(&clean), &cache)
            .to_remove
            .is_empty());
    }

    #[test]
    fn test_classify_requires_merged_and_clean() {
        let cache = PrCache::empty("/nonexistent/pr_cache.json");
        let clean = wt("feature", false);
        let dirty = wt("feature", true);

        assert_eq!(
            classify(&clean, &cache),
            Classification::Skipped(SkipReason::NotMerged)
        );

        for state in [PrState::Open, PrState::Closed, PrState::NoPr] {
            set_state(&cache, &clean, state);
            assert_eq!(
                classify(&clean, &cache),
                Classification::Skipped(SkipReason::NotMerged)
            );
        }

        set_state(&cache, &clean, PrState::Merged);
        assert_eq!(classify(&clean, &cache), Classification::Prunable);
        assert_eq!(
            classify(&dirty, &cache),
            Classification::Skipped(SkipReason::Dirty)
        );
    }

    #[test]
    fn test_plan_excludes_main() {
        let cache = PrCache::empty("/nonexistent/pr_cache.json");
        let mut main = wt("main", false);
        main.is_main = true;
        set_state(&cache, &main, PrState::Merged);

        let plan = plan_auto_prune(&[main], &cache);
        assert!(plan.to_remove.is_empty());
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_selection_replaces_classification() {
        let cache = PrCache::empty("/nonexistent/pr_cache.json");
        let merged = wt("merged", false);
        let open = wt("open", false);
        set_state(&cache, &merged, PrState::Merged);
        set_state(&cache, &open, PrState::Open);

        let plan = plan_auto_prune(&[merged.clone(), open.clone()], &cache);
        assert_eq!(plan.to_remove.len(), 1);

        let selected: HashSet<PathBuf> = [open.path.clone()].into_iter().collect();
        let plan = apply_selection(plan, &selected, &cache);

        assert_eq!(plan.to_remove.len(), 1);
        assert_eq!(plan.to_remove[0].worktree.branch, "open");
        assert!(!plan.to_remove[0].confirmed_merged);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].reason, SkipReason::Deselected);
    }

    #[test]
    fn test_report_summary() {
        let report = PruneReport {
            dry_run: false,
            removed: vec![],
            skipped: vec![],
            failed: vec![FailedRemoval {
                repo: "alpha".to_string(),
                branch: "x".to_string(),
                path: PathBuf::from("/x"),
                error: "boom".to_string(),
            }],
        };
        assert!(report.all_failed());
        assert_eq!(report.summary(), "removed 0, skipped 0, failed 1");
    }
}
