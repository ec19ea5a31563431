//! Implementation of the `wt list` command

use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;
use wt_core::{Worktree, WtError, collect_worktrees, resolve_scope};

use super::{OutputMode, open_workspace, refresh_issues, report_error};
use crate::colors::COLORS;
use crate::output::{JsonResponse, ListData};

/// Run the list command
pub async fn run_list(
    cancel: &CancellationToken,
    scope: Option<String>,
    refresh: bool,
    mode: OutputMode,
) -> Result<i32, String> {
    let ws = match open_workspace("list", cancel, mode).await {
        Ok(ws) => ws,
        Err(code) => return Ok(code),
    };

    let repos = match resolve_scope(&ws.registry, scope.as_deref()) {
        Ok(repos) => repos,
        Err(e) => return Ok(report_error("list", &e, ListData::default(), mode)),
    };

    let mut worktrees =
        match collect_worktrees(cancel, ws.git.as_ref(), &repos, &ws.cache).await {
            Ok(worktrees) => worktrees,
            Err(e) => return Ok(report_error("list", &e, ListData::default(), mode)),
        };

    let refresh_failed = if refresh {
        ws.refresh(cancel, &mut worktrees, mode).await
    } else {
        Vec::new()
    };
    ws.save_cache();

    if cancel.is_cancelled() {
        return Ok(report_error("list", &WtError::Cancelled, ListData::default(), mode));
    }

    if mode.json {
        let issues = refresh_issues(&refresh_failed);
        JsonResponse::ok_with_issues(
            "list",
            ListData {
                worktrees,
                refresh_failed,
            },
            issues,
        )
        .print();
    } else if !mode.quiet {
        if worktrees.is_empty() {
            println!("No worktrees found");
        } else {
            output_table(&worktrees);
        }
        if !refresh_failed.is_empty() {
            eprintln!(
                "{} PR refresh failed for {}",
                "warning:".style(COLORS.warning),
                refresh_failed.join(", ")
            );
        }
    }

    Ok(0)
}

fn pr_label(wt: &Worktree) -> String {
    match wt.pr_state {
        Some(state) if wt.pr_draft => format!("{} (draft)", state),
        Some(state) => state.to_string(),
        None => "?".to_string(),
    }
}

/// Output worktrees as an aligned table
fn output_table(worktrees: &[Worktree]) {
    let ids: Vec<String> = worktrees.iter().map(Worktree::identifier).collect();
    let id_width = ids.iter().map(|s| s.len()).max().unwrap_or(0).max(8);
    let pr_width = 13;

    println!(
        "{:<id_width$}  {:<pr_width$}  {:<5}  PATH",
        "WORKTREE", "PR", "DIRTY"
    );

    for (wt, id) in worktrees.iter().zip(&ids) {
        let pr = format!("{:<pr_width$}", pr_label(wt));
        let dirty = if wt.is_dirty { "*" } else { "" };
        let marker = if wt.is_main { " (main)" } else { "" };
        println!(
            "{:<id_width$}  {}  {:<5}  {}{}",
            id,
            pr.style(COLORS.pr_state(wt.pr_state, wt.pr_draft)),
            dirty.style(COLORS.warning),
            wt.path.display().style(COLORS.muted),
            marker
        );
    }
}
