//! Scribe CLI - offline-first notes from the command line
//!
//! Every change is tried against the notes server first and queued locally
//! when the server cannot be reached.

mod cli;
mod commands;
mod context;
mod error;


use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, SyncCommands};
use crate::commands::add::run_add;
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::show::run_show;
use crate::commands::sync::{run_sync, run_sync_pending};
use crate::commands::watch::run_watch;
use crate::context::AppContext;
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

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "scribe=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Completions need neither the store nor the server
    if let Some(Commands::Completions { shell, output }) = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let Some(command) = cli.command else {
        // Quick capture mode: scribe "my thought"
        if cli.note.is_empty() {
            Cli::command().print_help()?;
            println!();
            return Ok(());
        }
        let ctx = AppContext::connect(&cli.global).await?;
        return run_add(&ctx, None, None, &[], &cli.note).await;
    };

    let ctx = AppContext::connect(&cli.global).await?;
    match command {
        Commands::Add {
            title,
            category,
            tags,
            content,
        } => run_add(&ctx, title, category, &tags, &content).await,
        Commands::Edit {
            id,
            title,
            category,
            tags,
        } => run_edit(&ctx, &id, title, category, &tags).await,
        Commands::Delete { id } => run_delete(&ctx, &id).await,
        Commands::Show { id, json } => run_show(&ctx, &id, json).await,
        Commands::List { limit, json } => run_list(&ctx, limit, json).await,
        Commands::Sync { command: None } => run_sync(&ctx).await,
        Commands::Sync {
            command: Some(SyncCommands::Pending { json }),
        } => run_sync_pending(&ctx, json).await,
        Commands::Watch { interval } => run_watch(&ctx, interval).await,
        Commands::Completions { .. } => Ok(()),
    }
}
