//! Error types for wt operations

use thiserror::Error;

/// Core error type for wt operations
#[derive(Error, Debug)]
pub enum WtError {
    // === Resolution errors (W001-W005) ===
    /// W001: Scope token is neither a repository name nor a label
    #[error("W001: no repo or label found: {scope}")]
    RepoOrLabelNotFound { scope: String },

    /// W002: Bare identifier matched worktrees in several repositories
    #[error("W002: '{identifier}' is ambiguous, found in: {} (use scope:identifier)", .repos.join(", "))]
    AmbiguousTarget {
        identifier: String,
        repos: Vec<String>,
    },

    /// W003: Branch not found in any candidate repository
    #[error("W003: branch not found: {target}")]
    BranchNotFound { target: String },

    /// W004: Repository name not registered
    #[error("W004: repository not registered: {name}")]
    RepoNotFound { name: String },

    /// W005: Repository name or path already registered
    #[error("W005: repository already registered: {name}")]
    DuplicateRepoName { name: String },

    // === Forge errors (W010-W012) ===
    /// W010: PR lookup failed
    #[error("W010: forge request failed: {reason}")]
    Forge { reason: String },

    /// W011: Forge CLI not authenticated or host unreachable
    #[error("W011: forge not reachable for {host}: {reason}")]
    ForgeAuth { host: String, reason: String },

    /// W012: Origin URL does not map to a known forge
    #[error("W012: unsupported forge for origin: {url}")]
    UnsupportedForge { url: String },

    // === Execution errors (W020-W022) ===
    /// W020: A git subprocess failed
    #[error("W020: git {command} failed: {reason}")]
    Git { command: String, reason: String },

    /// W021: A hook command failed
    #[error("W021: hook '{name}' failed: {reason}")]
    Hook { name: String, reason: String },

    /// W022: Operation exceeded its deadline
    #[error("W022: {what} timed out after {secs} seconds")]
    Timeout { what: String, secs: u64 },

    /// Operation was cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,

    // === IO and system errors ===
    /// Cache read/write failure
    #[error("cache error: {0}")]
    Cache(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl WtError {
    /// Get the error code (e.g., "W001")
    pub fn code(&self) -> &'static str {
        match self {
            WtError::RepoOrLabelNotFound { .. } => "W001",
            WtError::AmbiguousTarget { .. } => "W002",
            WtError::BranchNotFound { .. } => "W003",
            WtError::RepoNotFound { .. } => "W004",
            WtError::DuplicateRepoName { .. } => "W005",
            WtError::Forge { .. } => "W010",
            WtError::ForgeAuth { .. } => "W011",
            WtError::UnsupportedForge { .. } => "W012",
            WtError::Git { .. } => "W020",
            WtError::Hook { .. } => "W021",
            WtError::Timeout { .. } => "W022",
            WtError::Cancelled => "W030",
            WtError::Cache(_) => "W031",
            WtError::Io(_) => "W032",
            WtError::Json(_) => "W033",
            WtError::Config(_) => "W034",
        }
    }

    /// True for errors that abort the current operation before anything runs
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            WtError::RepoOrLabelNotFound { .. }
                | WtError::AmbiguousTarget { .. }
                | WtError::BranchNotFound { .. }
                | WtError::RepoNotFound { .. }
        )
    }

    /// Get the exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            WtError::RepoOrLabelNotFound { .. }
            | WtError::BranchNotFound { .. }
            | WtError::RepoNotFound { .. } => 2, // Unknown target

            WtError::AmbiguousTarget { .. } => 3,

            WtError::DuplicateRepoName { .. } => 4,

            WtError::Config(_) => 5,

            WtError::Cancelled => 130, // Matches SIGINT convention

            WtError::Forge { .. }
            | WtError::ForgeAuth { .. }
            | WtError::UnsupportedForge { .. }
            | WtError::Git { .. }
            | WtError::Hook { .. }
            | WtError::Timeout { .. }
            | WtError::Cache(_)
            | WtError::Io(_)
            | WtError::Json(_) => 1,
        }
    }
}

/// Result alias used throughout wt-core
pub type WtResult<T> = Result<T, WtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = WtError::RepoOrLabelNotFound {
            scope: "backend".to_string(),
        };
        assert_eq!(err.code(), "W001");
        assert_eq!(err.exit_code(), 2);
        assert!(err.is_resolution_error());

        let err = WtError::Git {
            command: "worktree remove".to_string(),
            reason: "locked".to_string(),
        };
        assert_eq!(err.code(), "W020");
        assert_eq!(err.exit_code(), 1);
        assert!(!err.is_resolution_error());
    }

    #[test]
    fn test_ambiguous_display_lists_repos() {
        let err = WtError::AmbiguousTarget {
            identifier: "feature".to_string(),
            repos: vec!["alpha".to_string(), "beta".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("alpha, beta"));
        assert!(msg.contains("scope:identifier"));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_not_found_display_names_token() {
        let err = WtError::RepoOrLabelNotFound {
            scope: "nope".to_string(),
        };
        assert_eq!(err.to_string(), "W001: no repo or label found: nope");
    }
}
