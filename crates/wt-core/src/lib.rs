//! wt-core: multi-repository git worktree management
//!
//! Scope resolution over a registry of repositories, a shared PR status
//! cache, a bounded concurrent refresh engine, and the prune pipeline.

/// Error taxonomy
pub mod error;

/// config.toml and on-disk locations
pub mod config;

/// Registered repositories
pub mod registry;

/// `[scope:]identifier` resolution
pub mod scope;

/// PR status cache store
pub mod cache;

/// Cancellable subprocess execution
pub mod exec;

/// Forge detection and clients
pub mod forge;

/// Git collaborator
pub mod git;

pub mod worktree;

/// Concurrent PR refresh
pub mod refresh;

/// Prune classification and execution
pub mod prune;

pub mod checkout;

pub mod hooks;

pub mod history;

// Re-exports for convenience
pub use cache::{PrCache, PrCacheEntry, cache_key};
pub use config::{Config, Paths};
pub use error::{WtError, WtResult};
pub use forge::{CliForgeProvider, Forge, ForgeProvider, PrInfo, PrState};
pub use git::{GitCli, GitClient, WorktreeInfo};
pub use history::History;
pub use hooks::{HookConfig, HookContext, HookMatch, HookRunner, HookTrigger, ShellHookRunner, select_hooks};
pub use prune::{PruneOptions, PrunePlan, PruneReport, classify, execute_prune, plan_auto_prune};
pub use refresh::{NoProgress, RefreshContext, RefreshOptions, RefreshProgress, refresh};
pub use registry::{Registry, Repository};
pub use scope::{ResolvedTarget, ScopeMatch, resolve_scope, resolve_scoped_target};
pub use worktree::{Worktree, collect_worktrees};
