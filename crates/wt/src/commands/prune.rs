//! Implementation of the `wt prune` command

use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;
use wt_core::hooks::{HookTrigger, ShellHookRunner, select_hooks};
use wt_core::prune::{
    PruneContext, PruneOptions, PrunePlan, PruneReport, apply_selection, execute_prune,
    plan_auto_prune, resolve_prune_targets,
};
use wt_core::scope::ScopedTarget;
use wt_core::{WtError, collect_worktrees, resolve_scope};

use super::{
    OutputMode, Workspace, open_workspace, refresh_issues, report_error, report_message,
};
use crate::colors::COLORS;
use crate::interaction;
use crate::output::{JsonResponse, PruneData};

/// Flags of `wt prune`
#[derive(Debug, Clone, Default)]
pub struct PruneArgs {
    pub targets: Vec<String>,
    pub force: bool,
    pub delete_branch: bool,
    pub dry_run: bool,
    pub interactive: bool,
    pub refresh: bool,
    pub no_hooks: bool,
    pub hooks: Vec<String>,
    pub scope: Option<String>,
}

impl PruneArgs {
    /// Targets with `--scope` applied to the unscoped ones
    fn scoped_targets(&self) -> Vec<String> {
        self.targets
            .iter()
            .map(|t| match (&self.scope, ScopedTarget::parse(t).scope) {
                (Some(scope), None) => format!("{}:{}", scope, t),
                _ => t.clone(),
            })
            .collect()
    }
}

/// Run the prune command
pub async fn run_prune(
    cancel: &CancellationToken,
    args: PruneArgs,
    mode: OutputMode,
) -> Result<i32, String> {
    if !args.targets.is_empty() && !args.force {
        return Ok(report_message(
            "prune",
            "removing named worktrees requires --force",
            mode,
        ));
    }

    let mut ws = match open_workspace("prune", cancel, mode).await {
        Ok(ws) => ws,
        Err(code) => return Ok(code),
    };

    let targeted = !args.targets.is_empty();
    let (plan, refresh_failed) = match build_plan(&ws, cancel, &args, mode).await {
        Ok(result) => result,
        Err(e) => return Ok(report_error("prune", &e, PruneData::default(), mode)),
    };

    let plan = if args.interactive && !targeted && plan.worktrees().next().is_some() {
        if !interaction::is_interactive() {
            return Ok(report_message("prune", "--interactive needs a terminal", mode));
        }
        match interaction::select_worktrees(&plan) {
            Ok(Some(selected)) => apply_selection(plan, &selected, &ws.cache),
            Ok(None) => {
                if mode.human() {
                    println!("Aborted, nothing removed");
                }
                ws.save_cache();
                return Ok(0);
            }
            Err(e) => return Err(format!("interactive selection failed: {}", e)),
        }
    } else {
        plan
    };

    let hooks = select_hooks(
        &ws.config.hooks,
        &args.hooks,
        args.no_hooks,
        HookTrigger::PostRemove,
    );
    let options = PruneOptions {
        force: args.force,
        delete_branches: args.delete_branch || ws.config.prune.delete_branches,
        dry_run: args.dry_run,
    };

    let history_path = ws.paths.history_file();
    let runner = ShellHookRunner::new();
    let report = {
        let mut ctx = PruneContext {
            git: ws.git.as_ref(),
            hook_runner: &runner,
            hooks: &hooks,
            cache: &ws.cache,
            history: &mut ws.history,
            history_path: &history_path,
        };
        execute_prune(cancel, &mut ctx, plan, &options).await
    };
    // Refreshed PR state persists even when nothing was removed
    ws.save_cache();

    let exit_code = if targeted && report.all_failed() { 1 } else { 0 };

    if mode.json {
        let issues = refresh_issues(&refresh_failed);
        let data = PruneData {
            report,
            refresh_failed,
        };
        if exit_code == 0 {
            JsonResponse::ok_with_issues("prune", data, issues).print();
        } else {
            JsonResponse::error("prune", data, issues).print();
        }
    } else if !mode.quiet {
        print_report(&report);
    }

    if cancel.is_cancelled() {
        return Ok(WtError::Cancelled.exit_code());
    }
    Ok(exit_code)
}

/// Resolve targets or classify the scoped set
async fn build_plan(
    ws: &Workspace,
    cancel: &CancellationToken,
    args: &PruneArgs,
    mode: OutputMode,
) -> Result<(PrunePlan, Vec<String>), WtError> {
    if !args.targets.is_empty() {
        let to_remove = resolve_prune_targets(
            cancel,
            &ws.registry,
            ws.git.as_ref(),
            &ws.cache,
            &args.scoped_targets(),
        )
        .await?;
        return Ok((
            PrunePlan {
                to_remove,
                skipped: Vec::new(),
            },
            Vec::new(),
        ));
    }

    let repos = resolve_scope(&ws.registry, args.scope.as_deref())?;
    let mut worktrees = collect_worktrees(cancel, ws.git.as_ref(), &repos, &ws.cache).await?;
    let refresh_failed = if args.refresh {
        ws.refresh(cancel, &mut worktrees, mode).await
    } else {
        Vec::new()
    };
    Ok((plan_auto_prune(&worktrees, &ws.cache), refresh_failed))
}

fn print_report(report: &PruneReport) {
    let verb = if report.dry_run { "Would remove" } else { "Removed" };
    for removed in &report.removed {
        let branch_note = if removed.branch_deleted {
            " (branch deleted)"
        } else {
            ""
        };
        println!(
            "{} {}:{}{}",
            verb.style(COLORS.success),
            removed.repo,
            removed.branch,
            branch_note
        );
    }
    for skipped in &report.skipped {
        println!(
            "{} {} ({})",
            "Skipped".style(COLORS.warning),
            skipped.worktree.identifier(),
            skipped.reason
        );
    }
    for failed in &report.failed {
        println!(
            "{} {}:{}: {}",
            "Failed".style(COLORS.fail),
            failed.repo,
            failed.branch,
            failed.error
        );
    }
    println!("{}", report.summary());
}
