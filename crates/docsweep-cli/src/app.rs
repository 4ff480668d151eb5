//! CLI argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docsweep")]
#[command(
    author,
    version,
    about = "Remove stale documents without orphaning the references that point at them"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true, env = "DOCSWEEP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Store base URL
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Database name
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Directory for audit snapshots and log files
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "cli")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show store statistics
    Info,

    /// Unlink and tombstone the contacts under a place
    PurgeContacts(PurgeContactsArgs),

    /// Tombstone the records under a branch
    PurgeRecords(PurgeRecordsArgs),

    /// Clear facility references to the given contacts without deleting them
    Unlink(UnlinkArgs),
}

/// Flags shared by every destructive command
#[derive(Args)]
pub struct RunArgs {
    /// Read and audit everything, write nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct PurgeContactsArgs {
    /// Place id whose descendant contacts are removed
    #[arg(long)]
    pub place: String,

    /// Maximum contacts to process
    #[arg(long)]
    pub batch_size: Option<usize>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args)]
pub struct PurgeRecordsArgs {
    /// Branch id; records under any id it prefixes are included
    #[arg(long)]
    pub branch: String,

    /// Only records of this type
    #[arg(long = "type")]
    pub doc_type: Option<String>,

    /// Reported on or after (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// Reported before (RFC 3339 or YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,

    /// Maximum records to select
    #[arg(long)]
    pub batch_size: Option<usize>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args)]
pub struct UnlinkArgs {
    /// Contact ids, processed in the given order
    #[arg(required = true)]
    pub person_ids: Vec<String>,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Cli,
    Json,
}
