//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use wt_core::cache::PrCacheEntry;
use wt_core::hooks::{HookContext, HookMatch, HookRunner};
use wt_core::{
    Forge, ForgeProvider, GitClient, PrCache, PrInfo, PrState, Registry, Repository, WorktreeInfo,
    WtError, WtResult,
};

pub const ORIGIN: &str = "git@github.com:acme/alpha.git";

/// A call the fake git recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitCall {
    Add {
        repo: PathBuf,
        path: PathBuf,
        branch: String,
        create: bool,
    },
    Remove {
        repo: PathBuf,
        path: PathBuf,
        force: bool,
    },
    DeleteBranch {
        repo: PathBuf,
        branch: String,
        force: bool,
    },
    Prune {
        repo: PathBuf,
    },
}

#[derive(Debug, Default)]
struct FakeRepo {
    main_branch: String,
    origin: Option<String>,
    worktrees: Vec<(PathBuf, String)>,
    branches: HashSet<String>,
    upstreams: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct FakeGitState {
    repos: HashMap<PathBuf, FakeRepo>,
    dirty: HashSet<PathBuf>,
    failing_removals: HashSet<PathBuf>,
    unmerged_branches: HashSet<String>,
    calls: Vec<GitCall>,
}

/// Git collaborator backed by a map of repositories
#[derive(Debug, Default)]
pub struct FakeGit {
    state: Mutex<FakeGitState>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeGitState> {
        self.state.lock().expect("fake git state poisoned")
    }

    pub fn add_repo(&self, repo: &Path, origin: Option<&str>) {
        let mut state = self.state();
        state.repos.insert(
            repo.to_path_buf(),
            FakeRepo {
                main_branch: "main".to_string(),
                origin: origin.map(str::to_string),
                branches: ["main".to_string()].into_iter().collect(),
                ..Default::default()
            },
        );
    }

    /// Add a linked worktree and return its path
    pub fn add_worktree(&self, repo: &Path, branch: &str) -> PathBuf {
        let path = repo
            .parent()
            .unwrap_or(repo)
            .join(format!(
                "{}-worktrees",
                repo.file_name().and_then(|s| s.to_str()).unwrap_or("repo")
            ))
            .join(branch.replace('/', "__"));
        self.add_worktree_at(repo, branch, &path);
        path
    }

    /// Add a linked worktree for `branch` at an explicit path
    pub fn add_worktree_at(&self, repo: &Path, branch: &str, path: &Path) {
        let mut state = self.state();
        let fake = state.repos.get_mut(repo).expect("repo registered with fake git");
        fake.worktrees.push((path.to_path_buf(), branch.to_string()));
        fake.branches.insert(branch.to_string());
    }

    pub fn add_branch(&self, repo: &Path, branch: &str) {
        let mut state = self.state();
        let fake = state.repos.get_mut(repo).expect("repo registered with fake git");
        fake.branches.insert(branch.to_string());
    }

    pub fn set_upstream(&self, repo: &Path, branch: &str, upstream: &str) {
        let mut state = self.state();
        let fake = state.repos.get_mut(repo).expect("repo registered with fake git");
        fake.upstreams
            .insert(branch.to_string(), upstream.to_string());
    }

    pub fn set_dirty(&self, path: &Path) {
        self.state().dirty.insert(path.to_path_buf());
    }

    pub fn fail_removal(&self, path: &Path) {
        self.state().failing_removals.insert(path.to_path_buf());
    }

    /// `git branch -d` refuses this branch, as after a squash merge
    pub fn mark_unmerged(&self, branch: &str) {
        self.state().unmerged_branches.insert(branch.to_string());
    }

    pub fn calls(&self) -> Vec<GitCall> {
        self.state().calls.clone()
    }

    pub fn removals(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GitCall::Remove { path, .. } => Some(path),
                _ => None,
            })
            .collect()
    }

    pub fn prunes(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GitCall::Prune { repo } => Some(repo),
                _ => None,
            })
            .collect()
    }

    pub fn branch_deletions(&self) -> Vec<(String, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GitCall::DeleteBranch { branch, force, .. } => Some((branch, force)),
                _ => None,
            })
            .collect()
    }
}

fn git_err(command: &str, reason: &str) -> WtError {
    WtError::Git {
        command: command.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl GitClient for FakeGit {
    async fn list_worktrees(
        &self,
        _cancel: &CancellationToken,
        repo_path: &Path,
    ) -> WtResult<Vec<WorktreeInfo>> {
        let state = self.state();
        let repo = state
            .repos
            .get(repo_path)
            .ok_or_else(|| git_err("worktree list", "not a git repository"))?;

        let mut infos = vec![WorktreeInfo {
            path: repo_path.to_path_buf(),
            branch: Some(repo.main_branch.clone()),
            is_main: true,
            ..Default::default()
        }];
        infos.extend(repo.worktrees.iter().map(|(path, branch)| WorktreeInfo {
            path: path.clone(),
            branch: Some(branch.clone()),
            ..Default::default()
        }));
        Ok(infos)
    }

    async fn is_dirty(&self, _cancel: &CancellationToken, path: &Path) -> WtResult<bool> {
        Ok(self.state().dirty.contains(path))
    }

    async fn upstream_branch(
        &self,
        _cancel: &CancellationToken,
        repo_path: &Path,
        branch: &str,
    ) -> WtResult<Option<String>> {
        Ok(self
            .state()
            .repos
            .get(repo_path)
            .and_then(|r| r.upstreams.get(branch).cloned()))
    }

    async fn origin_url(
        &self,
        _cancel: &CancellationToken,
        repo_path: &Path,
    ) -> WtResult<Option<String>> {
        Ok(self
            .state()
            .repos
            .get(repo_path)
            .and_then(|r| r.origin.clone()))
    }

    async fn branch_exists(
        &self,
        _cancel: &CancellationToken,
        repo_path: &Path,
        branch: &str,
    ) -> WtResult<bool> {
        Ok(self
            .state()
            .repos
            .get(repo_path)
            .is_some_and(|r| r.branches.contains(branch)))
    }

    async fn add_worktree(
        &self,
        _cancel: &CancellationToken,
        repo_path: &Path,
        path: &Path,
        branch: &str,
        create_branch: bool,
    ) -> WtResult<()> {
        let mut state = self.state();
        state.calls.push(GitCall::Add {
            repo: repo_path.to_path_buf(),
            path: path.to_path_buf(),
            branch: branch.to_string(),
            create: create_branch,
        });
        let repo = state
            .repos
            .get_mut(repo_path)
            .ok_or_else(|| git_err("worktree add", "not a git repository"))?;
        repo.branches.insert(branch.to_string());
        repo.worktrees.push((path.to_path_buf(), branch.to_string()));
        Ok(())
    }

    async fn remove_worktree(
        &self,
        _cancel: &CancellationToken,
        repo_path: &Path,
        path: &Path,
        force: bool,
    ) -> WtResult<()> {
        let mut state = self.state();
        state.calls.push(GitCall::Remove {
            repo: repo_path.to_path_buf(),
            path: path.to_path_buf(),
            force,
        });
        if state.failing_removals.contains(path) {
            return Err(git_err("worktree remove", "permission denied"));
        }
        if let Some(repo) = state.repos.get_mut(repo_path) {
            repo.worktrees.retain(|(p, _)| p != path);
        }
        Ok(())
    }

    async fn delete_local_branch(
        &self,
        _cancel: &CancellationToken,
        repo_path: &Path,
        branch: &str,
        force: bool,
    ) -> WtResult<()> {
        let mut state = self.state();
        state.calls.push(GitCall::DeleteBranch {
            repo: repo_path.to_path_buf(),
            branch: branch.to_string(),
            force,
        });
        if !force && state.unmerged_branches.contains(branch) {
            return Err(git_err(
                "branch -d",
                &format!("the branch '{}' is not fully merged", branch),
            ));
        }
        if let Some(repo) = state.repos.get_mut(repo_path) {
            repo.branches.remove(branch);
        }
        Ok(())
    }

    async fn prune_worktrees(&self, _cancel: &CancellationToken, repo_path: &Path) -> WtResult<()> {
        self.state().calls.push(GitCall::Prune {
            repo: repo_path.to_path_buf(),
        });
        Ok(())
    }
}

/// Forge stub counting calls and tracking peak concurrency
#[derive(Debug)]
pub struct StubForge {
    states: Mutex<HashMap<String, PrState>>,
    failing: Mutex<HashSet<String>>,
    fail_check: bool,
    gate: Option<Arc<Semaphore>>,
    pub lookups: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    seen_branches: Mutex<Vec<String>>,
}

impl StubForge {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            fail_check: false,
            gate: None,
            lookups: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            seen_branches: Mutex::new(Vec::new()),
        }
    }

    /// Every lookup waits for a permit on `gate` before answering
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            fail_check: true,
            ..Self::new()
        }
    }

    pub fn set_state(&self, branch: &str, state: PrState) {
        self.states
            .lock()
            .expect("poisoned")
            .insert(branch.to_string(), state);
    }

    pub fn fail_branch(&self, branch: &str) {
        self.failing
            .lock()
            .expect("poisoned")
            .insert(branch.to_string());
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn seen_branches(&self) -> Vec<String> {
        self.seen_branches.lock().expect("poisoned").clone()
    }

    fn answer(&self, branch: &str) -> WtResult<Option<PrInfo>> {
        if self.failing.lock().expect("poisoned").contains(branch) {
            return Err(WtError::Forge {
                reason: format!("HTTP 502 for {}", branch),
            });
        }
        let state = self.states.lock().expect("poisoned").get(branch).copied();
        Ok(state.map(|state| PrInfo {
            number: 1,
            state,
            is_draft: false,
            url: format!("https://github.com/acme/alpha/pull/{}", branch),
            author: "octo".to_string(),
            comment_count: 0,
            has_reviews: false,
            is_approved: false,
        }))
    }
}

#[async_trait]
impl Forge for StubForge {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn check(&self, _cancel: &CancellationToken) -> WtResult<()> {
        if self.fail_check {
            return Err(WtError::ForgeAuth {
                host: "github.com".to_string(),
                reason: "not logged in".to_string(),
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
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.seen_branches
            .lock()
            .expect("poisoned")
            .push(branch.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let waited = match &self.gate {
            Some(gate) => tokio::select! {
                permit = gate.acquire() => permit.map(|_| ()).map_err(|_| WtError::Cancelled),
                _ = cancel.cancelled() => Err(WtError::Cancelled),
            },
            None => Ok(()),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        waited?;
        self.answer(branch)
    }
}

/// Provider handing out one shared stub for every origin
pub struct StubProvider {
    pub forge: Arc<StubForge>,
}

impl StubProvider {
    pub fn new(forge: Arc<StubForge>) -> Self {
        Self { forge }
    }
}

impl ForgeProvider for StubProvider {
    fn detect(&self, _origin_url: &str) -> WtResult<Arc<dyn Forge>> {
        Ok(self.forge.clone())
    }
}

/// Hook runner that remembers what it was asked to run
#[derive(Debug, Default)]
pub struct RecordingHooks {
    runs: Mutex<Vec<(String, HookContext)>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs(&self) -> Vec<(String, HookContext)> {
        self.runs.lock().expect("poisoned").clone()
    }
}

#[async_trait]
impl HookRunner for RecordingHooks {
    async fn run_for_each(
        &self,
        _cancel: &CancellationToken,
        matches: &[HookMatch],
        context: &HookContext,
        _workdir: &Path,
    ) {
        let mut runs = self.runs.lock().expect("poisoned");
        for hook in matches {
            runs.push((hook.name.clone(), context.clone()));
        }
    }
}

/// A registry of real (empty) directories under `root`, each with an
/// optional label
pub fn registry_with(root: &Path, repos: &[(&str, Option<&str>)]) -> Registry {
    let repos = repos
        .iter()
        .map(|(name, label)| {
            let path = root.join(name);
            std::fs::create_dir_all(&path).expect("failed to create repo dir");
            Repository::new(*name, path).with_labels(label.iter().copied())
        })
        .collect();
    Registry::new(repos)
}

/// Put a cache entry in `state` for `branch` of `repo`
pub fn cache_state(cache: &PrCache, repo: &Path, branch: &str, state: PrState) {
    let mut entry = PrCacheEntry::from_lookup(None, Utc::now());
    entry.state = state;
    cache.set(wt_core::cache_key(repo, branch), entry);
}
