//! Terminal progress for PR refresh

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use owo_colors::OwoColorize;
use wt_core::RefreshProgress;

use crate::colors::COLORS;

/// Spinner showing "N fetched / M failed"
pub struct SpinnerProgress {
    bar: ProgressBar,
}

impl SpinnerProgress {
    /// `visible` false draws nothing (quiet, JSON or non-TTY runs)
    pub fn new(visible: bool) -> Self {
        let bar = ProgressBar::new_spinner();
        if visible {
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg} [{elapsed}]") {
                bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
            }
        } else {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        Self { bar }
    }
}

fn counts(fetched: usize, failed: usize) -> String {
    format!("{} fetched / {} failed", fetched, failed)
}

impl RefreshProgress for SpinnerProgress {
    fn start(&self, total: usize) {
        self.bar
            .set_message(format!("Refreshing {} PRs: {}", total, counts(0, 0)));
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    fn update(&self, fetched: usize, failed: usize) {
        let total = fetched + failed;
        self.bar.set_message(format!(
            "Refreshing PRs ({} done): {}",
            total,
            counts(fetched, failed)
        ));
    }

    fn finish(&self, fetched: usize, failed: usize) {
        let summary = counts(fetched, failed);
        let message = if failed == 0 {
            format!("{}", summary.style(COLORS.success))
        } else {
            format!("{}", summary.style(COLORS.warning))
        };
        self.bar.finish_with_message(message);
    }
}
