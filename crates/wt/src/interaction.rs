//! Interactive prune selection using dialoguer

use std::collections::HashSet;
use std::fmt::Write as FmtWrite;
use std::io::IsTerminal;
use std::path::PathBuf;

use console::Style;
use dialoguer::MultiSelect;
use dialoguer::theme::Theme;
use wt_core::PrunePlan;
use wt_core::Worktree;

/// Theme with a blank line between items
struct SpacedTheme {
    prompt_style: Style,
    active_style: Style,
    inactive_style: Style,
}

impl SpacedTheme {
    fn new() -> Self {
        Self {
            prompt_style: Style::new().cyan().bold(),
            active_style: Style::new().cyan(),
            inactive_style: Style::new(),
        }
    }
}

impl Theme for SpacedTheme {
    fn format_multi_select_prompt(&self, f: &mut dyn FmtWrite, prompt: &str) -> std::fmt::Result {
        write!(f, "{}", self.prompt_style.apply_to(format!("? {}", prompt)))
    }

    fn format_multi_select_prompt_selection(
        &self,
        f: &mut dyn FmtWrite,
        prompt: &str,
        selections: &[&str],
    ) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            self.prompt_style.apply_to(format!("? {}", prompt)),
            self.active_style.apply_to(format!("{} selected", selections.len()))
        )
    }

    fn format_multi_select_prompt_item(
        &self,
        f: &mut dyn FmtWrite,
        text: &str,
        checked: bool,
        active: bool,
    ) -> std::fmt::Result {
        writeln!(f)?;
        let checkbox = if checked { "[✓]" } else { "[ ]" };
        if active {
            write!(
                f,
                "  {} {} {}",
                self.active_style.apply_to(">"),
                self.active_style.apply_to(checkbox),
                self.active_style.apply_to(text)
            )
        } else {
            write!(
                f,
                "    {} {}",
                self.inactive_style.apply_to(checkbox),
                self.inactive_style.apply_to(text)
            )
        }
    }
}

/// True when both stdin and stderr are terminals
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}

fn item_label(wt: &Worktree) -> String {
    let state = wt
        .pr_state
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let dirty = if wt.is_dirty { ", uncommitted changes" } else { "" };
    format!("{}  (PR {}{})", wt.identifier(), state, dirty)
}

/// Let the user pick which worktrees to remove.
///
/// Rule-based prunable worktrees start checked. Returns `None` if the
/// prompt was aborted.
pub fn select_worktrees(plan: &PrunePlan) -> std::io::Result<Option<HashSet<PathBuf>>> {
    let worktrees: Vec<&Worktree> = plan.worktrees().collect();
    let labels: Vec<String> = worktrees.iter().map(|wt| item_label(wt)).collect();
    let defaults: Vec<bool> = (0..worktrees.len())
        .map(|i| i < plan.to_remove.len())
        .collect();

    println!();
    let chosen = MultiSelect::with_theme(&SpacedTheme::new())
        .with_prompt("Worktrees to remove (space toggles, enter confirms)")
        .items(&labels)
        .defaults(&defaults)
        .interact_opt()
        .map_err(|e| match e {
            dialoguer::Error::IO(io) => io,
        })?;

    Ok(chosen.map(|indices| {
        indices
            .into_iter()
            .map(|i| worktrees[i].path.clone())
            .collect()
    }))
}
