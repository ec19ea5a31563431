//! User-defined shell hooks fired around worktree lifecycle events

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{WtError, WtResult};
use crate::exec;

/// When a hook fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookTrigger {
    PostCreate,
    PostRemove,
}

impl HookTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            HookTrigger::PostCreate => "post-create",
            HookTrigger::PostRemove => "post-remove",
        }
    }
}

impl fmt::Display for HookTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `[[hooks]]` entry from config.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookConfig {
    pub name: String,
    /// Shell command, run with `sh -c`
    pub command: String,
    #[serde(default)]
    pub on: Vec<HookTrigger>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// A hook selected to run for a trigger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookMatch {
    pub name: String,
    pub command: String,
    pub trigger: HookTrigger,
}

/// The worktree a hook runs for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookContext {
    pub repo: String,
    pub branch: String,
    pub path: PathBuf,
}

/// Pick the hooks to run for `trigger`.
///
/// `skip` disables hooks entirely. Explicit `names` select exactly those
/// hooks regardless of their triggers or `enabled` flag; otherwise every
/// enabled hook listening on `trigger` is selected.
pub fn select_hooks(
    hooks: &[HookConfig],
    names: &[String],
    skip: bool,
    trigger: HookTrigger,
) -> Vec<HookMatch> {
    if skip {
        return Vec::new();
    }

    let to_match = |hook: &HookConfig| HookMatch {
        name: hook.name.clone(),
        command: hook.command.clone(),
        trigger,
    };

    if !names.is_empty() {
        return names
            .iter()
            .filter_map(|name| {
                let found = hooks.iter().find(|h| &h.name == name);
                if found.is_none() {
                    warn!(hook = %name, "unknown hook, ignoring");
                }
                found.map(to_match)
            })
            .collect();
    }

    hooks
        .iter()
        .filter(|h| h.enabled && h.on.contains(&trigger))
        .map(to_match)
        .collect()
}

/// Runs selected hooks; failures are logged, never returned
#[async_trait]
pub trait HookRunner: Send + Sync {
    async fn run_for_each(
        &self,
        cancel: &CancellationToken,
        matches: &[HookMatch],
        context: &HookContext,
        workdir: &Path,
    );
}

/// Runs hooks through `sh -c` with the worktree described in `WT_*` variables
#[derive(Debug, Clone, Default)]
pub struct ShellHookRunner;

impl ShellHookRunner {
    pub fn new() -> Self {
        Self
    }

    async fn run_one(
        &self,
        cancel: &CancellationToken,
        hook: &HookMatch,
        context: &HookContext,
        workdir: &Path,
    ) -> WtResult<()> {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", hook.command.as_str()])
            .current_dir(workdir)
            .env("WT_REPO", &context.repo)
            .env("WT_BRANCH", &context.branch)
            .env("WT_PATH", &context.path)
            .env("WT_TRIGGER", hook.trigger.as_str());

        debug!(hook = %hook.name, trigger = %hook.trigger, "running hook");
        let output = exec::run(cmd, cancel).await.map_err(|e| match e {
            WtError::Io(io) => WtError::Hook {
                name: hook.name.clone(),
                reason: io.to_string(),
            },
            other => other,
        })?;

        if !output.status.success() {
            return Err(WtError::Hook {
                name: hook.name.clone(),
                reason: exec::failure_text(&output),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl HookRunner for ShellHookRunner {
    async fn run_for_each(
        &self,
        cancel: &CancellationToken,
        matches: &[HookMatch],
        context: &HookContext,
        workdir: &Path,
    ) {
        for hook in matches {
            if let Err(e) = self.run_one(cancel, hook, context, workdir).await {
                warn!(hook = %hook.name, branch = %context.branch, error = %e, "hook failed");
            }
        }
    }
}
