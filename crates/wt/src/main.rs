//! wt CLI - git worktrees across many repositories

mod cli;
mod colors;
mod commands;
mod interaction;
mod logging;
mod output;
mod progress;

use std::process::ExitCode;

use cli::{CacheCommands, Commands, RepoCommands};
use commands::{OutputMode, PruneArgs};
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let mode = OutputMode {
        json: cli.json,
        quiet: cli.quiet,
    };

    let result = match cli.command {
        Some(Commands::List { scope, refresh }) => {
            commands::run_list(&cancel, scope, refresh, mode).await
        }
        Some(Commands::Prune {
            targets,
            force,
            delete_branch,
            dry_run,
            interactive,
            refresh,
            no_hooks,
            hooks,
            scope,
        }) => {
            let args = PruneArgs {
                targets,
                force,
                delete_branch,
                dry_run,
                interactive,
                refresh,
                no_hooks,
                hooks,
                scope,
            };
            commands::run_prune(&cancel, args, mode).await
        }
        Some(Commands::Checkout {
            target,
            create,
            no_hooks,
        }) => commands::run_checkout(&cancel, target, create, no_hooks, mode).await,
        Some(Commands::Repo(repo_cmd)) => match repo_cmd {
            RepoCommands::Add { path, name, labels } => {
                commands::run_repo_add(&cancel, path, name, labels, mode).await
            }
            RepoCommands::Remove { name } => commands::run_repo_remove(&cancel, name, mode).await,
            RepoCommands::List => commands::run_repo_list(&cancel, mode).await,
            RepoCommands::Label { name, labels } => {
                commands::run_repo_label(&cancel, name, labels, mode).await
            }
        },
        Some(Commands::Cache(CacheCommands::Clear)) => {
            commands::run_cache_clear(&cancel, mode).await
        }
        None => {
            // No subcommand - print version info
            if !cli.quiet {
                println!("wt v{}", env!("CARGO_PKG_VERSION"));
                println!("Use --help for usage information");
            }
            Ok(0)
        }
    };

    match result {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(1)
        }
    }
}
