//! Implementation of the `wt checkout` command

use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;
use wt_core::checkout::{CheckoutContext, checkout};
use wt_core::hooks::{HookTrigger, ShellHookRunner, select_hooks};

use super::{OutputMode, open_workspace, report_error};
use crate::colors::COLORS;
use crate::output::{CheckoutData, JsonResponse};

/// Run the checkout command.
///
/// The worktree path goes to stdout so shells can `cd "$(wt checkout x)"`.
pub async fn run_checkout(
    cancel: &CancellationToken,
    target: String,
    create: bool,
    no_hooks: bool,
    mode: OutputMode,
) -> Result<i32, String> {
    let mut ws = match open_workspace("checkout", cancel, mode).await {
        Ok(ws) => ws,
        Err(code) => return Ok(code),
    };

    let hooks = select_hooks(&ws.config.hooks, &[], no_hooks, HookTrigger::PostCreate);
    let history_path = ws.paths.history_file();
    let runner = ShellHookRunner::new();
    let result = {
        let mut ctx = CheckoutContext {
            git: ws.git.as_ref(),
            hook_runner: &runner,
            hooks: &hooks,
            cache: &ws.cache,
            history: &mut ws.history,
            history_path: &history_path,
            layout: &ws.config.worktree,
        };
        checkout(cancel, &ws.registry, &mut ctx, &target, create).await
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => return Ok(report_error("checkout", &e, CheckoutData { outcome: None }, mode)),
    };

    if mode.json {
        JsonResponse::ok(
            "checkout",
            CheckoutData {
                outcome: Some(outcome),
            },
        )
        .print();
        return Ok(0);
    }

    if !mode.quiet {
        let verb = if outcome.created { "Created" } else { "Found" };
        eprintln!(
            "{} worktree for {}:{}",
            verb.style(COLORS.success),
            outcome.repo,
            outcome.branch
        );
    }
    println!("{}", outcome.path.display());
    Ok(0)
}
