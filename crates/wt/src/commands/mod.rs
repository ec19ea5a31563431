//! CLI command implementations
//!
//! Every runner returns `Result<i32, String>`: `Ok(code)` is the process
//! exit code, `Err` is an unexpected failure reported by `main`.

pub mod cache;
pub mod checkout;
pub mod list;
pub mod prune;
pub mod repo;

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use wt_core::forge::CliForgeProvider;
use wt_core::history::History;
use wt_core::{
    Config, GitCli, Paths, PrCache, RefreshContext, RefreshOptions, Registry, Worktree, WtError,
    refresh,
};

use crate::output::{JsonIssue, JsonResponse};
use crate::progress::SpinnerProgress;

pub use cache::run_cache_clear;
pub use checkout::run_checkout;
pub use list::run_list;
pub use prune::{PruneArgs, run_prune};
pub use repo::{run_repo_add, run_repo_label, run_repo_list, run_repo_remove};

/// Global output flags
#[derive(Debug, Clone, Copy)]
pub struct OutputMode {
    pub json: bool,
    pub quiet: bool,
}

impl OutputMode {
    /// Human-readable output is wanted
    pub fn human(&self) -> bool {
        !self.json && !self.quiet
    }
}

/// Loaded configuration and state for one invocation
pub struct Workspace {
    pub paths: Paths,
    pub config: Config,
    pub registry: Registry,
    pub cache: Arc<PrCache>,
    pub history: History,
    pub git: Arc<GitCli>,
}

impl Workspace {
    /// Load config, registry and state, registering the current repository
    /// if it is not known yet.
    pub async fn open(cancel: &CancellationToken) -> anyhow::Result<Self> {
        let paths = Paths::discover().context("failed to locate wt directories")?;
        let config = Config::load(&paths.config_file())?;
        let mut registry = Registry::load(&paths.registry_file())
            .with_context(|| format!("failed to read {}", paths.registry_file().display()))?;
        let cache = Arc::new(PrCache::load(paths.cache_file()));
        let history = History::load(&paths.history_file());
        let git = Arc::new(GitCli::new());

        if let Ok(cwd) = std::env::current_dir() {
            match git.repo_root(cancel, &cwd).await {
                Ok(Some(root)) => {
                    if registry.ensure_registered(&root) {
                        registry.save(&paths.registry_file()).with_context(|| {
                            format!("failed to save {}", paths.registry_file().display())
                        })?;
                        debug!(path = %root.display(), "registered current repository");
                    }
                }
                Ok(None) => {}
                Err(WtError::Cancelled) => return Err(WtError::Cancelled.into()),
                Err(e) => debug!(error = %e, "not inside a git repository"),
            }
        }

        Ok(Self {
            paths,
            config,
            registry,
            cache,
            history,
            git,
        })
    }

    /// Refresh PR status for `worktrees` and re-read their state from the cache.
    ///
    /// Returns the identifiers whose refresh failed.
    pub async fn refresh(
        &self,
        cancel: &CancellationToken,
        worktrees: &mut [Worktree],
        mode: OutputMode,
    ) -> Vec<String> {
        let ctx = RefreshContext {
            cache: self.cache.clone(),
            git: self.git.clone(),
            forges: Arc::new(CliForgeProvider::new(self.config.forge.clone())),
            progress: Arc::new(SpinnerProgress::new(
                mode.human() && crate::interaction::is_interactive(),
            )),
        };
        let options = RefreshOptions::from(&self.config.forge);

        let failed = refresh(cancel, worktrees, &ctx, &options).await;
        if !failed.is_empty() {
            warn!(count = failed.len(), worktrees = %failed.join(", "), "some PR lookups failed");
        }

        for wt in worktrees.iter_mut() {
            wt.apply_cache(&self.cache);
        }
        failed
    }

    /// Persist the PR cache if it changed; failures only warn
    pub fn save_cache(&self) {
        if let Err(e) = self.cache.save_if_dirty() {
            warn!(error = %e, "failed to save PR cache");
        }
    }
}

/// Report a library error in the requested format and return its exit code
pub fn report_error<T: serde::Serialize>(
    command: &str,
    err: &WtError,
    data: T,
    mode: OutputMode,
) -> i32 {
    if mode.json {
        JsonResponse::error(command, data, vec![JsonIssue::from(err)]).print();
    } else {
        eprintln!("error: {}", err);
    }
    err.exit_code()
}

/// Report a CLI-level usage error and return exit code 1
pub fn report_message(command: &str, message: &str, mode: OutputMode) -> i32 {
    if mode.json {
        let issue = JsonIssue {
            code: String::new(),
            severity: "error".to_string(),
            message: message.to_string(),
        };
        JsonResponse::error(command, (), vec![issue]).print();
    } else {
        eprintln!("error: {}", message);
    }
    1
}

/// Open the workspace or turn the failure into an exit code
pub async fn open_workspace(
    command: &str,
    cancel: &CancellationToken,
    mode: OutputMode,
) -> Result<Workspace, i32> {
    Workspace::open(cancel).await.map_err(|e| {
        let code = e.downcast_ref::<WtError>().map_or(1, WtError::exit_code);
        if mode.json {
            let issue = JsonIssue {
                code: e
                    .downcast_ref::<WtError>()
                    .map(|w| w.code().to_string())
                    .unwrap_or_default(),
                severity: "error".to_string(),
                message: format!("{:#}", e),
            };
            JsonResponse::error(command, (), vec![issue]).print();
        } else {
            eprintln!("error: {:#}", e);
        }
        code
    })
}

/// Collected refresh failures as JSON warnings
pub fn refresh_issues(failed: &[String]) -> Vec<JsonIssue> {
    failed
        .iter()
        .map(|id| JsonIssue::warning(format!("PR refresh failed for {}", id)))
        .collect()
}
