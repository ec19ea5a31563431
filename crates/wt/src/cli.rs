//! CLI argument parsing with clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// wt - git worktrees across many repositories
#[derive(Parser)]
#[command(name = "wt")]
#[command(version = VERSION)]
#[command(about = "Manage git worktrees across many repositories")]
#[command(long_about = "wt manages git worktrees across every repository you register.\n\nTargets are written as [scope:]branch, where scope is a repository name or a label shared by several repositories. PR status comes from your forge through the gh or glab CLI and is cached between runs.")]
pub struct Cli {
    /// Increase output verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List worktrees with their PR status
    #[command(long_about = "List worktrees with their PR status.\n\nShows repository, branch, cached PR state and whether the worktree has uncommitted changes. Use --refresh to query the forge first.")]
    List {
        /// Repository name or label to restrict the listing to
        scope: Option<String>,

        /// Fetch fresh PR status before listing
        #[arg(long)]
        refresh: bool,
    },

    /// Remove worktrees whose PRs are merged
    ///
    /// Without targets, removes every clean worktree whose cached PR is
    /// merged. With targets, removes exactly those (requires --force).
    #[command(long_about = "Remove worktrees whose PRs are merged.\n\nAuto mode (no targets):\n  Removes every worktree whose cached PR is merged and whose working tree\n  is clean. Dirty worktrees are never auto-pruned.\n\nTargeted mode ([scope:]branch...):\n  Removes the named worktrees regardless of PR state. Requires --force.\n  A label scope removes the branch from every repository carrying it.")]
    Prune {
        /// Worktrees to remove, as [scope:]branch
        targets: Vec<String>,

        /// Force removal; required for targeted prune
        #[arg(short, long)]
        force: bool,

        /// Also delete the local branch
        #[arg(long)]
        delete_branch: bool,

        /// Show what would be removed without removing anything
        #[arg(long)]
        dry_run: bool,

        /// Choose worktrees to remove interactively
        #[arg(short, long)]
        interactive: bool,

        /// Fetch fresh PR status before deciding
        #[arg(long)]
        refresh: bool,

        /// Do not run post-remove hooks
        #[arg(long)]
        no_hooks: bool,

        /// Run only the named hooks
        #[arg(long = "hook", value_name = "NAME")]
        hooks: Vec<String>,

        /// Repository name or label to restrict pruning to
        #[arg(long)]
        scope: Option<String>,
    },

    /// Create or find the worktree for a branch
    #[command(long_about = "Create or find the worktree for a branch.\n\nPrints the worktree path on stdout, so `cd \"$(wt checkout alpha:feature)\"` works. An existing worktree is reused.")]
    Checkout {
        /// Branch to check out, as [scope:]branch
        target: String,

        /// Create the branch if it does not exist
        #[arg(short = 'b', long)]
        create: bool,

        /// Do not run post-create hooks
        #[arg(long)]
        no_hooks: bool,
    },

    /// Manage registered repositories
    #[command(subcommand)]
    Repo(RepoCommands),

    /// Manage the PR status cache
    #[command(subcommand)]
    Cache(CacheCommands),
}

#[derive(Subcommand)]
pub enum RepoCommands {
    /// Register a repository
    Add {
        /// Path to the repository
        path: PathBuf,

        /// Name to register under (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,

        /// Label to attach (repeatable)
        #[arg(long = "label", value_name = "LABEL")]
        labels: Vec<String>,
    },

    /// Unregister a repository
    Remove {
        /// Registered repository name
        name: String,
    },

    /// List registered repositories
    List,

    /// Replace a repository's labels
    Label {
        /// Registered repository name
        name: String,

        /// New labels (none clears them)
        labels: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Drop every cached PR status
    Clear,
}

/// Get the command args for use in the application
pub fn parse() -> Cli {
    Cli::parse()
}
