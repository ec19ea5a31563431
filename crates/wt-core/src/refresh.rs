//! Concurrent PR status refresh
//!
//! One task per candidate worktree, admitted through a counting semaphore
//! so at most `max_concurrent` forge conversations are in flight. Results
//! land in the shared [`PrCache`]; the fetched/failed tally lives behind a
//! separate lock together with the progress display.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{PrCache, PrCacheEntry};
use crate::config::{DEFAULT_MAX_CONCURRENT, ForgeConfig};
use crate::error::{WtError, WtResult};
use crate::forge::ForgeProvider;
use crate::git::GitClient;
use crate::worktree::Worktree;

/// Live progress sink for a refresh run
pub trait RefreshProgress: Send + Sync {
    /// Called once before any task starts, only when there is work to do
    fn start(&self, total: usize);
    /// Called after every completed task, success or failure
    fn update(&self, fetched: usize, failed: usize);
    fn finish(&self, fetched: usize, failed: usize);
}

/// Progress sink that shows nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl RefreshProgress for NoProgress {
    fn start(&self, _total: usize) {}
    fn update(&self, _fetched: usize, _failed: usize) {}
    fn finish(&self, _fetched: usize, _failed: usize) {}
}

/// Tuning for a refresh run
#[derive(Debug, Clone)]
pub struct RefreshOptions {
    /// Admission bound on concurrent forge work
    pub max_concurrent: usize,
    /// Deadline for each individual forge call
    pub timeout: Duration,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&ForgeConfig> for RefreshOptions {
    fn from(config: &ForgeConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent.max(1),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }
}

/// Everything a refresh task shares with its siblings
#[derive(Clone)]
pub struct RefreshContext {
    pub cache: Arc<PrCache>,
    pub git: Arc<dyn GitClient>,
    pub forges: Arc<dyn ForgeProvider>,
    pub progress: Arc<dyn RefreshProgress>,
}

#[derive(Debug, Default)]
struct Tally {
    fetched: usize,
    failed: Vec<String>,
}

/// Worktrees that need a forge lookup.
///
/// Skips worktrees without an origin and those whose cached PR is already
/// merged, which is terminal.
pub fn refresh_candidates<'a>(worktrees: &'a [Worktree], cache: &PrCache) -> Vec<&'a Worktree> {
    worktrees
        .iter()
        .filter(|wt| wt.origin_url.is_some())
        .filter(|wt| {
            cache
                .get(&wt.cache_key())
                .is_none_or(|entry| !entry.is_settled())
        })
        .collect()
}

/// Refresh PR status for `worktrees` and return the identifiers
/// (`repo:branch`) whose lookup failed.
///
/// Blocks until every spawned task has finished. Failures are soft: the
/// cache keeps whatever succeeded. On cancellation tasks that had not
/// finished are reported as failed and write nothing.
pub async fn refresh(
    cancel: &CancellationToken,
    worktrees: &[Worktree],
    ctx: &RefreshContext,
    options: &RefreshOptions,
) -> Vec<String> {
    let candidates: Vec<Worktree> = refresh_candidates(worktrees, &ctx.cache)
        .into_iter()
        .cloned()
        .collect();

    if candidates.is_empty() {
        debug!("no worktrees need a PR refresh");
        return Vec::new();
    }

    ctx.progress.start(candidates.len());

    let semaphore = Arc::new(Semaphore::new(options.max_concurrent.max(1)));
    let tally = Arc::new(Mutex::new(Tally::default()));
    let mut tasks = JoinSet::new();

    for wt in candidates {
        let semaphore = Arc::clone(&semaphore);
        let tally = Arc::clone(&tally);
        let ctx = ctx.clone();
        let cancel = cancel.clone();
        let timeout = options.timeout;

        tasks.spawn(async move {
            let id = wt.identifier();

            let permit = tokio::select! {
                permit = semaphore.acquire_owned() => permit.ok(),
                _ = cancel.cancelled() => None,
            };

            let outcome = match permit {
                Some(_permit) => fetch_entry(&cancel, &wt, &ctx, timeout).await,
                None => Err(WtError::Cancelled),
            };

            match outcome {
                Ok(entry) => {
                    ctx.cache.set(wt.cache_key(), entry);
                    record(&tally, &*ctx.progress, None);
                }
                Err(e) => {
                    warn!(worktree = %id, error = %e, "PR refresh failed");
                    record(&tally, &*ctx.progress, Some(id));
                }
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "PR refresh task aborted");
        }
    }

    let mut tally = lock_tally(&tally);
    ctx.progress.finish(tally.fetched, tally.failed.len());
    let mut failed = std::mem::take(&mut tally.failed);
    failed.sort();
    failed
}

fn lock_tally(tally: &Mutex<Tally>) -> std::sync::MutexGuard<'_, Tally> {
    tally.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Count one finished task and redraw progress under the tally lock
fn record(tally: &Mutex<Tally>, progress: &dyn RefreshProgress, failed: Option<String>) {
    let mut tally = lock_tally(tally);
    match failed {
        Some(id) => tally.failed.push(id),
        None => tally.fetched += 1,
    }
    progress.update(tally.fetched, tally.failed.len());
}

async fn with_timeout<T>(
    timeout: Duration,
    what: &str,
    fut: impl Future<Output = WtResult<T>>,
) -> WtResult<T> {
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| WtError::Timeout {
            what: what.to_string(),
            secs: timeout.as_secs(),
        })?
}

/// Check the forge, resolve the upstream branch, and look up its PR
async fn fetch_entry(
    cancel: &CancellationToken,
    wt: &Worktree,
    ctx: &RefreshContext,
    timeout: Duration,
) -> WtResult<PrCacheEntry> {
    let origin = wt.origin_url.as_deref().ok_or_else(|| WtError::Forge {
        reason: format!("{} has no origin remote", wt.repo_name),
    })?;

    let forge = ctx.forges.detect(origin)?;
    with_timeout(timeout, "forge check", forge.check(cancel)).await?;

    // The remote branch may be named differently from the local one
    let remote_branch = match ctx
        .git
        .upstream_branch(cancel, &wt.repo_path, &wt.branch)
        .await
    {
        Ok(Some(upstream)) => upstream,
        Ok(None) => wt.branch.clone(),
        Err(WtError::Cancelled) => return Err(WtError::Cancelled),
        Err(e) => {
            debug!(worktree = %wt.identifier(), error = %e, "no upstream, using local branch name");
            wt.branch.clone()
        }
    };

    let info = with_timeout(
        timeout,
        "PR lookup",
        forge.get_pr_for_branch(cancel, origin, &remote_branch),
    )
    .await?;

    Ok(PrCacheEntry::from_lookup(info, Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::PrState;
    use std::path::PathBuf;

    fn wt(branch: &str, origin: Option<&str>) -> Worktree {
        Worktree {
            repo_name: "alpha".to_string(),
            repo_path: PathBuf::from("/src/alpha"),
            branch: branch.to_string(),
            path: PathBuf::from(format!("/src/alpha-worktrees/{}", branch)),
            origin_url: origin.map(str::to_string),
            is_main: false,
            is_dirty: false,
            pr_state: None,
            pr_draft: false,
        }
    }

    #[test]
    fn test_candidates_skip_no_origin_and_merged() {
        let cache = PrCache::empty("/nonexistent/pr_cache.json");
        let worktrees = vec![
            wt("no-origin", None),
            wt("merged", Some("git@github.com:acme/alpha.git")),
            wt("open", Some("git@github.com:acme/alpha.git")),
            wt("unknown", Some("git@github.com:acme/alpha.git")),
        ];

        let mut merged = PrCacheEntry::from_lookup(None, Utc::now());
        merged.state = PrState::Merged;
        cache.set(worktrees[1].cache_key(), merged);

        let mut open = PrCacheEntry::from_lookup(None, Utc::now());
        open.state = PrState::Open;
        cache.set(worktrees[2].cache_key(), open);

        let branches: Vec<_> = refresh_candidates(&worktrees, &cache)
            .iter()
            .map(|w| w.branch.as_str())
            .collect();
        assert_eq!(branches, vec!["open", "unknown"]);
    }

    #[test]
    fn test_options_clamp_zero_config_values() {
        let config = ForgeConfig {
            timeout_secs: 0,
            max_concurrent: 0,
            ..Default::default()
        };
        let options = RefreshOptions::from(&config);
        assert_eq!(options.max_concurrent, 1);
        assert_eq!(options.timeout, Duration::from_secs(1));

        let defaults = RefreshOptions::from(&ForgeConfig::default());
        assert_eq!(defaults.max_concurrent, 5);
        assert_eq!(defaults.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_unfetched_merged_entry_is_refetched() {
        let cache = PrCache::empty("/nonexistent/pr_cache.json");
        let worktrees = vec![wt("x", Some("git@github.com:acme/alpha.git"))];

        let mut entry = PrCacheEntry::from_lookup(None, Utc::now());
        entry.state = PrState::Merged;
        entry.fetched = false;
        cache.set(worktrees[0].cache_key(), entry);

        assert_eq!(refresh_candidates(&worktrees, &cache).len(), 1);
    }

    #[test]
    fn test_options_from_config_clamps_concurrency() {
        let config = ForgeConfig {
            max_concurrent: 0,
            timeout_secs: 7,
            ..Default::default()
        };
        let options = RefreshOptions::from(&config);
        assert_eq!(options.max_concurrent, 1);
        assert_eq!(options.timeout, Duration::from_secs(7));
    }
}
