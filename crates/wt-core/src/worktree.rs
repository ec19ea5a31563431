//! Worktree collection across registered repositories
//!
//! Worktrees are never persisted: every invocation rebuilds them from
//! `git worktree list`, live working-tree status, and the PR cache.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cache::{PrCache, cache_key};
use crate::error::{WtError, WtResult};
use crate::forge::PrState;
use crate::git::GitClient;
use crate::registry::Repository;

/// A branch checked out in a repository worktree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Worktree {
    pub repo_name: String,
    pub repo_path: PathBuf,
    pub branch: String,
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_url: Option<String>,
    /// Primary worktree of the repository; never removable
    pub is_main: bool,
    pub is_dirty: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_state: Option<PrState>,
    pub pr_draft: bool,
}

impl Worktree {
    pub fn cache_key(&self) -> String {
        cache_key(&self.repo_path, &self.branch)
    }

    /// `repo:branch`, used in progress and failure reports
    pub fn identifier(&self) -> String {
        format!("{}:{}", self.repo_name, self.branch)
    }

    /// Directory name of the worktree
    pub fn dir_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }

    /// Refresh `pr_state`/`pr_draft` from the cache
    pub fn apply_cache(&mut self, cache: &PrCache) {
        match cache.get(&self.cache_key()) {
            Some(entry) => {
                self.pr_state = Some(entry.state);
                self.pr_draft = entry.is_draft;
            }
            None => {
                self.pr_state = None;
                self.pr_draft = false;
            }
        }
    }
}

/// List worktrees of `repos`, attaching origin, dirtiness and cached PR state.
///
/// Bare and detached entries are skipped. A repository whose listing fails
/// is logged and skipped; a worktree whose status cannot be read counts as
/// dirty so it is never pruned by accident.
pub async fn collect_worktrees(
    cancel: &CancellationToken,
    git: &dyn GitClient,
    repos: &[Repository],
    cache: &PrCache,
) -> WtResult<Vec<Worktree>> {
    let mut worktrees = Vec::new();

    for repo in repos {
        let infos = match git.list_worktrees(cancel, &repo.path).await {
            Ok(infos) => infos,
            Err(WtError::Cancelled) => return Err(WtError::Cancelled),
            Err(e) => {
                warn!(repo = %repo.name, error = %e, "failed to list worktrees");
                continue;
            }
        };

        let origin_url = match git.origin_url(cancel, &repo.path).await {
            Ok(url) => url,
            Err(WtError::Cancelled) => return Err(WtError::Cancelled),
            Err(e) => {
                warn!(repo = %repo.name, error = %e, "failed to read origin URL");
                None
            }
        };

        for info in infos {
            let Some(branch) = info.branch else {
                continue;
            };
            if info.is_bare {
                continue;
            }

            let is_dirty = match git.is_dirty(cancel, &info.path).await {
                Ok(dirty) => dirty,
                Err(WtError::Cancelled) => return Err(WtError::Cancelled),
                Err(e) => {
                    warn!(path = %info.path.display(), error = %e, "cannot read worktree status, treating as dirty");
                    true
                }
            };

            let mut wt = Worktree {
                repo_name: repo.name.clone(),
                repo_path: repo.path.clone(),
                branch,
                path: info.path,
                origin_url: origin_url.clone(),
                is_main: info.is_main,
                is_dirty,
                pr_state: None,
                pr_draft: false,
            };
            wt.apply_cache(cache);
            worktrees.push(wt);
        }
    }

    Ok(worktrees)
}

/// Removable worktrees named by `identifier`.
///
/// Within each repository a branch match wins. The directory name is only
/// consulted for repositories where no branch matches.
pub fn find_branch<'a>(worktrees: &'a [Worktree], identifier: &str) -> Vec<&'a Worktree> {
    let mut repos: Vec<&Path> = Vec::new();
    for wt in worktrees {
        if !repos.contains(&wt.repo_path.as_path()) {
            repos.push(&wt.repo_path);
        }
    }

    let mut hits = Vec::new();
    for repo in repos {
        let removable: Vec<&Worktree> = worktrees
            .iter()
            .filter(|wt| !wt.is_main && wt.repo_path == repo)
            .collect();
        let by_branch: Vec<&Worktree> = removable
            .iter()
            .copied()
            .filter(|wt| wt.branch == identifier)
            .collect();
        if by_branch.is_empty() {
            hits.extend(removable.into_iter().filter(|wt| wt.dir_name() == identifier));
        } else {
            hits.extend(by_branch);
        }
    }
    hits
}

/// Sanitize a branch name into a filesystem-safe directory name
///
/// - '/' and '\\' -> '__'
/// - ':' and ' ' -> '_'
/// - anything else outside alphanumerics, '-', '_' and '.' is dropped
///
/// Returns "worktree" if nothing survives.
pub fn sanitize_branch_name(branch_name: &str) -> String {
    let sanitized: String = branch_name
        .replace(['/', '\\'], "__")
        .replace([':', ' '], "_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_' || *c == '.')
        .collect();

    let sanitized = sanitized.trim_start_matches('.').to_string();
    if sanitized.is_empty() {
        "worktree".to_string()
    } else {
        sanitized
    }
}

/// Where a new worktree for `branch` goes under `base_dir`
pub fn worktree_path(base_dir: &Path, branch: &str) -> PathBuf {
    base_dir.join(sanitize_branch_name(branch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PrCacheEntry;
    use chrono::Utc;

    fn sample() -> Worktree {
        Worktree {
            repo_name: "alpha".to_string(),
            repo_path: PathBuf::from("/src/alpha"),
            branch: "feature/login".to_string(),
            path: PathBuf::from("/src/alpha-worktrees/feature__login"),
            origin_url: None,
            is_main: false,
            is_dirty: false,
            pr_state: None,
            pr_draft: false,
        }
    }

    #[test]
    fn test_sanitize_branch_name() {
        assert_eq!(sanitize_branch_name("feature/login"), "feature__login");
        assert_eq!(sanitize_branch_name("win\\path"), "win__path");
        assert_eq!(sanitize_branch_name("fix:v1.0"), "fix_v1.0");
        assert_eq!(sanitize_branch_name("my feature"), "my_feature");
        assert_eq!(sanitize_branch_name("!@#$%"), "worktree");
        assert_eq!(sanitize_branch_name("..hidden"), "hidden");
    }

    #[test]
    fn test_find_branch_by_branch_or_dir() {
        let worktrees = vec![sample()];
        assert_eq!(find_branch(&worktrees, "feature/login").len(), 1);
        assert_eq!(find_branch(&worktrees, "feature__login").len(), 1);
        assert!(find_branch(&worktrees, "feature").is_empty());
        assert_eq!(worktrees[0].identifier(), "alpha:feature/login");
    }

    #[test]
    fn test_find_branch_prefers_branch_over_dir() {
        let mut feature = sample();
        feature.branch = "feature".to_string();
        feature.path = PathBuf::from("/src/alpha-worktrees/feature-old");
        let mut hotfix = sample();
        hotfix.branch = "hotfix".to_string();
        hotfix.path = PathBuf::from("/src/alpha-worktrees/feature");
        let mut other_repo = sample();
        other_repo.repo_name = "beta".to_string();
        other_repo.repo_path = PathBuf::from("/src/beta");
        other_repo.branch = "bugfix".to_string();
        other_repo.path = PathBuf::from("/src/beta-worktrees/feature");
        let worktrees = vec![feature, hotfix, other_repo];

        let hits: Vec<&str> = find_branch(&worktrees, "feature")
            .iter()
            .map(|wt| wt.branch.as_str())
            .collect();
        // beta has no "feature" branch, so its directory name still counts
        assert_eq!(hits, vec!["feature", "bugfix"]);
    }

    #[test]
    fn test_find_branch_skips_main() {
        let mut main = sample();
        main.branch = "main".to_string();
        main.path = PathBuf::from("/src/alpha");
        main.is_main = true;
        let worktrees = vec![main, sample()];

        assert!(find_branch(&worktrees, "main").is_empty());
        assert_eq!(find_branch(&worktrees, "feature/login").len(), 1);
    }

    #[test]
    fn test_apply_cache() {
        let cache = PrCache::empty("/nonexistent/pr_cache.json");
        let mut wt = sample();

        wt.apply_cache(&cache);
        assert_eq!(wt.pr_state, None);

        let mut entry = PrCacheEntry::from_lookup(None, Utc::now());
        entry.state = PrState::Open;
        entry.is_draft = true;
        cache.set(wt.cache_key(), entry);

        wt.apply_cache(&cache);
        assert_eq!(wt.pr_state, Some(PrState::Open));
        assert!(wt.pr_draft);
    }
}
