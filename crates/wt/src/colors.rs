//! Semantic color theme for consistent terminal output
//!
//! - `active` => blue - spinners, headers, open PRs
//! - `success` => green - removals, merged PRs
//! - `warning` => yellow - skips, dirty worktrees, drafts
//! - `fail` => red - errors, closed PRs
//! - `muted` => dimmed - paths, unknown status

use std::sync::LazyLock;

use owo_colors::Style;
use wt_core::PrState;

/// Semantic color definitions for terminal output
pub struct SemanticColors {
    pub active: Style,
    pub success: Style,
    pub warning: Style,
    pub fail: Style,
    pub muted: Style,
}

impl Default for SemanticColors {
    fn default() -> Self {
        Self {
            active: Style::new().blue(),
            success: Style::new().green(),
            warning: Style::new().yellow(),
            fail: Style::new().red(),
            muted: Style::new().dimmed(),
        }
    }
}

impl SemanticColors {
    /// Style for a PR state column; `None` is "not yet fetched"
    pub fn pr_state(&self, state: Option<PrState>, draft: bool) -> Style {
        match state {
            Some(PrState::Merged) => self.success,
            Some(PrState::Open) if draft => self.warning,
            Some(PrState::Open) => self.active,
            Some(PrState::Closed) => self.fail,
            Some(PrState::NoPr) | None => self.muted,
        }
    }
}

/// Global default theme
pub static COLORS: LazyLock<SemanticColors> = LazyLock::new(SemanticColors::default);
