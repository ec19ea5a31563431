//! JSON output envelope and command payloads

use serde::Serialize;
use wt_core::WtError;
use wt_core::checkout::CheckoutOutcome;
use wt_core::prune::PruneReport;
use wt_core::{Repository, Worktree};

const SCHEMA_VERSION: &str = "1";

/// JSON response envelope shared by every command
#[derive(Debug, Clone, Serialize)]
pub struct JsonResponse<T> {
    /// Schema version for forward compatibility
    pub schema_version: String,
    /// Command that generated this response
    pub command: String,
    /// Status: "ok" or "error"
    pub status: String,
    /// Command-specific payload
    pub data: T,
    /// Errors and warnings
    pub issues: Vec<JsonIssue>,
}

impl<T> JsonResponse<T> {
    pub fn ok(command: &str, data: T) -> Self {
        Self::ok_with_issues(command, data, vec![])
    }

    pub fn ok_with_issues(command: &str, data: T, issues: Vec<JsonIssue>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            command: command.to_string(),
            status: "ok".to_string(),
            data,
            issues,
        }
    }

    pub fn error(command: &str, data: T, issues: Vec<JsonIssue>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            command: command.to_string(),
            status: "error".to_string(),
            data,
            issues,
        }
    }
}

impl<T: Serialize> JsonResponse<T> {
    /// Print to stdout as pretty JSON
    pub fn print(&self) {
        match serde_json::to_string_pretty(self) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("error: failed to serialize output: {}", e),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonIssue {
    /// Error code (e.g. "W003"), empty for uncoded warnings
    pub code: String,
    /// "error" or "warning"
    pub severity: String,
    pub message: String,
}

impl JsonIssue {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            code: String::new(),
            severity: "warning".to_string(),
            message: message.into(),
        }
    }
}

impl From<&WtError> for JsonIssue {
    fn from(err: &WtError) -> Self {
        Self {
            code: err.code().to_string(),
            severity: "error".to_string(),
            message: err.to_string(),
        }
    }
}

/// Data payload for `wt list`
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListData {
    pub worktrees: Vec<Worktree>,
    /// Worktrees whose refresh failed, as repo:branch
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub refresh_failed: Vec<String>,
}

/// Data payload for `wt prune`
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneData {
    #[serde(flatten)]
    pub report: PruneReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub refresh_failed: Vec<String>,
}

/// Data payload for `wt checkout`
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutData {
    #[serde(flatten)]
    pub outcome: Option<CheckoutOutcome>,
}

/// Data payload for `wt repo ...`
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepoData {
    pub repos: Vec<Repository>,
}

/// Data payload for `wt cache clear`
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheClearData {
    pub cleared: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_carries_code() {
        let err = WtError::BranchNotFound {
            target: "alpha:feature".to_string(),
        };
        let response = JsonResponse::error("prune", PruneData::default(), vec![(&err).into()]);
        let value = serde_json::to_value(&response).expect("serializes");

        assert_eq!(value["status"], "error");
        assert_eq!(value["command"], "prune");
        assert_eq!(value["issues"][0]["code"], "W003");
        assert_eq!(value["data"]["removed"], serde_json::json!([]));
    }

    #[test]
    fn test_list_omits_empty_failures() {
        let response = JsonResponse::ok("list", ListData::default());
        let value = serde_json::to_value(&response).expect("serializes");
        assert_eq!(value["schema_version"], "1");
        assert!(value["data"].get("refresh_failed").is_none());
    }

    #[test]
    fn test_checkout_payload_is_flat() {
        let data = CheckoutData {
            outcome: Some(CheckoutOutcome {
                repo: "alpha".to_string(),
                branch: "feature".to_string(),
                path: "/wt/alpha/feature".into(),
                created: true,
            }),
        };
        let value = serde_json::to_value(JsonResponse::ok("checkout", data)).expect("serializes");
        assert_eq!(value["data"]["repo"], "alpha");
        assert_eq!(value["data"]["created"], true);
    }
}
