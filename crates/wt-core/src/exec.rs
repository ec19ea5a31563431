//! Cancellable subprocess execution shared by the git and forge wrappers

use std::process::{Output, Stdio};

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::{WtError, WtResult};

/// Run `cmd` to completion, killing it if `cancel` fires first.
///
/// Spawn failures surface as `Io`; a non-zero exit is *not* an error here,
/// callers inspect `status` themselves.
pub async fn run(mut cmd: Command, cancel: &CancellationToken) -> WtResult<Output> {
    if cancel.is_cancelled() {
        return Err(WtError::Cancelled);
    }

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd.spawn()?;

    tokio::select! {
        output = child.wait_with_output() => Ok(output?),
        _ = cancel.cancelled() => Err(WtError::Cancelled),
    }
}

/// Trimmed stderr, falling back to stdout when stderr is empty
pub fn failure_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    } else {
        stderr.to_string()
    }
}
