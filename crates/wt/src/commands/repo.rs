//! Implementation of the `wt repo` subcommands

use std::collections::BTreeSet;
use std::path::PathBuf;

use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use wt_core::{Repository, WtError};

use super::{OutputMode, Workspace, open_workspace, report_error, report_message};
use crate::colors::COLORS;
use crate::output::{JsonResponse, RepoData};

/// Register a repository under `name` (defaults to its directory name)
pub async fn run_repo_add(
    cancel: &CancellationToken,
    path: PathBuf,
    name: Option<String>,
    labels: Vec<String>,
    mode: OutputMode,
) -> Result<i32, String> {
    let mut ws = match open_workspace("repo add", cancel, mode).await {
        Ok(ws) => ws,
        Err(code) => return Ok(code),
    };

    let root = match ws.git.repo_root(cancel, &path).await {
        Ok(Some(root)) => root,
        Ok(None) => {
            let message = format!("{} is not a git repository", path.display());
            return Ok(report_message("repo add", &message, mode));
        }
        Err(e) => return Ok(report_error("repo add", &e, RepoData::default(), mode)),
    };

    let name = match name.or_else(|| default_name(&root)) {
        Some(name) => name,
        None => {
            let message = format!("cannot derive a name from {}, use --name", root.display());
            return Ok(report_message("repo add", &message, mode));
        }
    };

    // The current directory may have been auto-registered under a default name
    if let Some(existing) = ws.registry.find_by_path(&root).cloned() {
        if existing.name != name {
            let _ = ws.registry.remove(&existing.name);
        }
    }

    let repo = Repository::new(name, root).with_labels(labels);
    if let Err(e) = ws.registry.add(repo.clone()) {
        return Ok(report_error("repo add", &e, RepoData::default(), mode));
    }
    if let Err(e) = save_registry(&ws) {
        return Ok(report_error("repo add", &e, RepoData::default(), mode));
    }
    info!(name = %repo.name, path = %repo.path.display(), "registered repository");

    if mode.json {
        JsonResponse::ok("repo add", RepoData { repos: vec![repo] }).print();
    } else if !mode.quiet {
        println!(
            "{} {} ({})",
            "Registered".style(COLORS.success),
            repo.name,
            repo.path.display()
        );
    }
    Ok(0)
}

/// Unregister a repository by name
pub async fn run_repo_remove(
    cancel: &CancellationToken,
    name: String,
    mode: OutputMode,
) -> Result<i32, String> {
    let mut ws = match open_workspace("repo remove", cancel, mode).await {
        Ok(ws) => ws,
        Err(code) => return Ok(code),
    };

    let repo = match ws.registry.remove(&name) {
        Ok(repo) => repo,
        Err(e) => return Ok(report_error("repo remove", &e, RepoData::default(), mode)),
    };
    if let Err(e) = save_registry(&ws) {
        return Ok(report_error("repo remove", &e, RepoData::default(), mode));
    }

    if mode.json {
        JsonResponse::ok("repo remove", RepoData { repos: vec![repo] }).print();
    } else if !mode.quiet {
        println!("{} {}", "Unregistered".style(COLORS.success), repo.name);
    }
    Ok(0)
}

/// List registered repositories
pub async fn run_repo_list(cancel: &CancellationToken, mode: OutputMode) -> Result<i32, String> {
    let ws = match open_workspace("repo list", cancel, mode).await {
        Ok(ws) => ws,
        Err(code) => return Ok(code),
    };

    if mode.json {
        JsonResponse::ok(
            "repo list",
            RepoData {
                repos: ws.registry.repos.clone(),
            },
        )
        .print();
        return Ok(0);
    }
    if mode.quiet {
        return Ok(0);
    }

    if ws.registry.repos.is_empty() {
        println!("No repositories registered");
        return Ok(0);
    }

    let width = ws
        .registry
        .repos
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(0)
        .max(4);
    for repo in &ws.registry.repos {
        let missing = if repo.path.exists() { "" } else { " (missing)" };
        println!(
            "{:<width$}  {}{}  {}",
            repo.name,
            repo.path.display().style(COLORS.muted),
            missing.style(COLORS.fail),
            format_labels(&repo.labels).style(COLORS.active)
        );
    }
    Ok(0)
}

/// Replace the labels of a repository
pub async fn run_repo_label(
    cancel: &CancellationToken,
    name: String,
    labels: Vec<String>,
    mode: OutputMode,
) -> Result<i32, String> {
    let mut ws = match open_workspace("repo label", cancel, mode).await {
        Ok(ws) => ws,
        Err(code) => return Ok(code),
    };

    let labels: BTreeSet<String> = labels.into_iter().collect();
    if let Err(e) = ws.registry.set_labels(&name, labels) {
        return Ok(report_error("repo label", &e, RepoData::default(), mode));
    }
    if let Err(e) = save_registry(&ws) {
        return Ok(report_error("repo label", &e, RepoData::default(), mode));
    }

    let repos: Vec<Repository> = ws
        .registry
        .repos
        .iter()
        .filter(|r| r.name == name)
        .cloned()
        .collect();
    if mode.json {
        JsonResponse::ok("repo label", RepoData { repos }).print();
    } else if !mode.quiet {
        for repo in &repos {
            println!("{} {}", repo.name, format_labels(&repo.labels));
        }
    }
    Ok(0)
}

fn save_registry(ws: &Workspace) -> Result<(), WtError> {
    ws.registry.save(&ws.paths.registry_file())
}

fn default_name(root: &std::path::Path) -> Option<String> {
    root.file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

fn format_labels(labels: &BTreeSet<String>) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let joined: Vec<&str> = labels.iter().map(String::as_str).collect();
    format!("[{}]", joined.join(", "))
}
