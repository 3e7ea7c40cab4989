//! Quire CLI - offline-first notebooks from the terminal
//!
//! Every command runs against the same sync service: writes land in the local
//! store first and reach the remote store when it is reachable.

mod cli;
mod commands;
mod error;


use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::AppContext;
use crate::commands::completions::run_completions;
use crate::commands::delete::{run_delete, run_purge, run_restore};
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::new::{run_new, run_tab};
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("quire=info,quire_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Some(Commands::Completions { shell, output }) = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let ctx = AppContext::load(cli.db_path, cli.config, &cli.container, cli.offline)?;
    tracing::debug!(?ctx.settings, "Loaded settings");

    match cli.command {
        Some(Commands::New {
            title,
            group,
            content,
        }) => run_new(&ctx, title.as_deref(), group.as_deref(), &content).await?,
        Some(Commands::Tab { name }) => run_tab(&ctx, &name).await?,
        Some(Commands::List {
            limit,
            deleted,
            json,
        }) => run_list(&ctx, limit, deleted, json).await?,
        Some(Commands::Edit { id, content, title }) => {
            run_edit(&ctx, &id, content.as_deref(), title.as_deref()).await?;
        }
        Some(Commands::Delete { id }) => run_delete(&ctx, &id).await?,
        Some(Commands::Restore { id }) => run_restore(&ctx, &id).await?,
        Some(Commands::Purge { id }) => run_purge(&ctx, &id).await?,
        Some(Commands::Sync) => run_sync(&ctx).await?,
        Some(Commands::Status { json }) => run_status(&ctx, json).await?,
        Some(Commands::Completions { .. }) => {}
        None => {
            // Quick capture mode: quire "my thought"
            if cli.note.is_empty() {
                Cli::command().print_help()?;
                println!();
            } else {
                run_new(&ctx, None, None, &cli.note).await?;
            }
        }
    }

    Ok(())
}
