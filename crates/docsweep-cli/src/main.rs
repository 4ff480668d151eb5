//! Docsweep CLI
//!
//! Batch removal of stale documents from a replicated document store.

use anyhow::Result;
use clap::Parser;
use docsweep_core::error::exit_codes;
use docsweep_core::{Config, SweepError};

mod app;
mod commands;
mod logging;

use app::{Cli, Commands};
use commands::{Aborted, Session};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code(&e)
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let (log_file, _log_guard) = logging::init(&config.log_dir, cli.verbose)?;
    tracing::debug!("Logging to {}", log_file.display());

    let session = Session::open(config)?;

    match cli.command {
        Commands::Info => commands::info::run(&session, cli.format).await,
        Commands::PurgeContacts(args) => {
            commands::purge_contacts::run(args, &session, cli.format).await
        }
        Commands::PurgeRecords(args) => {
            commands::purge_records::run(args, &session, cli.format).await
        }
        Commands::Unlink(args) => commands::unlink::run(args, &session, cli.format).await,
    }
}

/// Config file first, then command-line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(ref url) = cli.url {
        config.store.url = url.clone();
    }
    if let Some(ref db) = cli.db {
        config.store.database = db.clone();
    }
    if let Some(ref dir) = cli.log_dir {
        config.log_dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}

fn exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<Aborted>().is_some() {
        return exit_codes::USER_ABORT;
    }
    match err.downcast_ref::<SweepError>() {
        Some(e) => e.exit_code(),
        None => exit_codes::GENERAL_ERROR,
    }
}
