//! Implementation of the `wt cache` subcommands

use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use super::{OutputMode, open_workspace, report_error};
use crate::colors::COLORS;
use crate::output::{CacheClearData, JsonResponse};

/// Drop every cached PR status and persist the empty cache
pub async fn run_cache_clear(cancel: &CancellationToken, mode: OutputMode) -> Result<i32, String> {
    let ws = match open_workspace("cache clear", cancel, mode).await {
        Ok(ws) => ws,
        Err(code) => return Ok(code),
    };

    let cleared = ws.cache.len();
    ws.cache.reset();
    if let Err(e) = ws.cache.save_if_dirty() {
        return Ok(report_error("cache clear", &e, CacheClearData::default(), mode));
    }

    if mode.json {
        JsonResponse::ok("cache clear", CacheClearData { cleared }).print();
    } else if !mode.quiet {
        println!(
            "{} {} cached PR entries",
            "Cleared".style(COLORS.success),
            cleared
        );
    }
    Ok(0)
}
