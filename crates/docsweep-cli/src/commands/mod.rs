//! CLI command handlers

pub mod info;
pub mod purge_contacts;
pub mod purge_records;
pub mod unlink;

use crate::app::{OutputFormat, RunArgs};
use anyhow::Result;
use docsweep_core::{
    AuditWriter, AutoConfirm, BatchSelector, CascadeCleaner, Config, Confirmation,
    ConfirmationGate, CouchStore, DocumentStore, DryRunPolicy, PurgeReport, ReferenceResolver,
    TerminalPrompt,
};
use std::sync::Arc;

/// The user declined or could not answer the confirmation prompt
#[derive(Debug, thiserror::Error)]
pub enum Aborted {
    #[error("Aborted")]
    Declined,
    #[error("Aborted: {0}")]
    Failed(String),
}

/// Resolved config plus the store it points at
pub struct Session {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
}

impl Session {
    pub fn open(config: Config) -> Result<Self> {
        let store = CouchStore::new(config.store.clone())?;
        tracing::debug!(
            "Using database {} at {}",
            store.database(),
            config.store.url
        );
        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    pub fn selector(&self) -> BatchSelector {
        BatchSelector::new(
            self.store.clone(),
            self.config.views.contacts_by_place.clone(),
            self.config.views.records_by_branch.clone(),
        )
    }

    pub fn cleaner(&self, run: &RunArgs) -> CascadeCleaner {
        let resolver = ReferenceResolver::new(
            self.store.clone(),
            self.config.views.facilities_by_contact.clone(),
        );
        CascadeCleaner::new(
            self.store.clone(),
            resolver,
            AuditWriter::new(&self.config.log_dir),
            DryRunPolicy::new(run.dry_run),
        )
    }

    pub fn batch_size(&self, requested: Option<usize>) -> Result<usize> {
        match requested.unwrap_or(self.config.batch_size) {
            0 => anyhow::bail!(docsweep_core::SweepError::InvalidInput(
                "batch size must be positive".into()
            )),
            n => Ok(n),
        }
    }
}

/// Ask before a destructive batch; `--yes` answers for the user
pub fn confirm(run: &RunArgs, message: &str) -> Result<()> {
    let outcome = if run.yes {
        AutoConfirm.confirm(message)
    } else {
        TerminalPrompt::stdio().confirm(message)
    };

    match outcome {
        Confirmation::Confirmed => Ok(()),
        Confirmation::Declined => Err(Aborted::Declined.into()),
        Confirmation::Failed(reason) => Err(Aborted::Failed(reason).into()),
    }
}

/// Print a purge summary
pub fn print_report(report: &PurgeReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Cli => {
            let mode = if report.dry_run { " (dry run)" } else { "" };
            println!("Contacts cleaned:   {}{}", report.cascade.outcomes.len(), mode);
            println!("Facilities cleared: {}", report.cascade.facilities_cleared());
            println!("Tombstoned:         {}", report.tombstoned);
            let mut files = report.cascade.audit_files();
            if let Some(ref path) = report.audit_path {
                files.push(path);
            }
            if !files.is_empty() {
                println!();
                println!("Audit files:");
                for path in files {
                    println!("  {}", path.display());
                }
            }
        }
    }
    Ok(())
}
