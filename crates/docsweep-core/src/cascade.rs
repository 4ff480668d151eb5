//! Cascading cleanup
//!
//! For each subject (person) the cleaner runs, in this order:
//!
//! 1. resolve: find facilities whose `contact` points at the subject
//! 2. audit: snapshot those facilities to `cleaned_facilities_<id>.json`
//! 3. strip: clear `contact` on the in-memory copies
//! 4. commit: bulk-write the stripped facilities (skipped under dry-run)
//!
//! Subjects are drained from a queue by a single worker. A subject's commit
//! finishes before the next subject's resolve starts, and the first failure
//! aborts the rest of the queue. Persons are tombstoned only after every
//! subject in the batch has been cleaned.

use crate::audit::AuditWriter;
use crate::dry_run::DryRunPolicy;
use crate::error::{Result, SweepError};
use crate::model::Document;
use crate::resolver::ReferenceResolver;
use crate::store::{BulkWriteResult, DocumentStore};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

/// Result of cleaning one subject
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectOutcome {
    pub subject_id: String,
    /// Facilities that referenced the subject
    pub facilities: usize,
    pub audit_path: Option<PathBuf>,
    /// Whether the stripped facilities were written back
    pub committed: bool,
}

/// Per-subject outcomes in processing order
#[derive(Debug, Clone, Default, Serialize)]
pub struct CascadeReport {
    pub outcomes: Vec<SubjectOutcome>,
    pub dry_run: bool,
}

impl CascadeReport {
    pub fn facilities_cleared(&self) -> usize {
        self.outcomes.iter().map(|o| o.facilities).sum()
    }

    pub fn audit_files(&self) -> Vec<&PathBuf> {
        self.outcomes
            .iter()
            .filter_map(|o| o.audit_path.as_ref())
            .collect()
    }
}

/// Result of a cascade followed by tombstoning
#[derive(Debug, Clone, Default, Serialize)]
pub struct PurgeReport {
    pub cascade: CascadeReport,
    /// Snapshot of the documents handed to the tombstone write
    pub audit_path: Option<PathBuf>,
    pub tombstoned: usize,
    pub dry_run: bool,
}

/// Drives resolve, audit, strip and commit per subject
pub struct CascadeCleaner {
    store: Arc<dyn DocumentStore>,
    resolver: ReferenceResolver,
    audit: AuditWriter,
    dry_run: DryRunPolicy,
}

impl CascadeCleaner {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        resolver: ReferenceResolver,
        audit: AuditWriter,
        dry_run: DryRunPolicy,
    ) -> Self {
        Self {
            store,
            resolver,
            audit,
            dry_run,
        }
    }

    /// Run the four-step cascade for one subject
    pub async fn clean_subject(&self, subject_id: &str) -> Result<SubjectOutcome> {
        let facilities = self.resolver.find_referencing_facilities(subject_id).await?;
        if facilities.is_empty() {
            tracing::debug!("No facilities reference contact {}", subject_id);
            return Ok(SubjectOutcome {
                subject_id: subject_id.to_string(),
                facilities: 0,
                audit_path: None,
                committed: false,
            });
        }

        let path = self.audit.facilities_path(subject_id);
        let mut facilities = self.audit.snapshot_to_file(&path, facilities).await?;

        for facility in &mut facilities {
            facility.clear_contact();
        }

        let count = facilities.len();
        let committed = if self.dry_run.skips("facility contact removal", count) {
            false
        } else {
            self.write_all(&facilities, "facility contact removal").await?;
            true
        };

        tracing::info!(
            "Cleared contact {} from {} facilities{}",
            subject_id,
            count,
            if committed { "" } else { " (not written)" }
        );

        Ok(SubjectOutcome {
            subject_id: subject_id.to_string(),
            facilities: count,
            audit_path: Some(path),
            committed,
        })
    }

    /// Clean subjects one after another, stopping at the first failure
    pub async fn clean_all(&self, subject_ids: &[String]) -> Result<CascadeReport> {
        let mut queue: VecDeque<&str> = subject_ids.iter().map(String::as_str).collect();
        let mut report = CascadeReport {
            outcomes: Vec::with_capacity(queue.len()),
            dry_run: self.dry_run.is_active(),
        };

        tracing::info!(
            "Cleaning facility references for {} contacts ({})",
            queue.len(),
            self.dry_run
        );

        while let Some(subject_id) = queue.pop_front() {
            match self.clean_subject(subject_id).await {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(
                        "Cascade aborted at contact {} after {} done, {} not started: {}",
                        subject_id,
                        report.outcomes.len(),
                        queue.len(),
                        e
                    );
                    return Err(e);
                }
            }
        }

        tracing::info!(
            "Cascade finished: {} contacts, {} facilities cleared",
            report.outcomes.len(),
            report.facilities_cleared()
        );
        Ok(report)
    }

    /// Mark documents `_deleted` and write them back.
    ///
    /// Under dry-run nothing is written and the input comes back unchanged.
    pub async fn tombstone(&self, docs: Vec<Document>) -> Result<Vec<Document>> {
        if docs.is_empty() || self.dry_run.skips("tombstone write", docs.len()) {
            return Ok(docs);
        }

        let mut marked: Vec<Document> = docs
            .into_iter()
            .map(|mut doc| {
                doc.deleted = true;
                doc
            })
            .collect();

        let results = self.write_all(&marked, "tombstone write").await?;
        for (doc, result) in marked.iter_mut().zip(results) {
            if result.id == doc.id && result.rev.is_some() {
                doc.rev = result.rev;
            }
        }
        Ok(marked)
    }

    /// Snapshot `docs` to a `deleted_<kind>_*` file, then tombstone them.
    ///
    /// `scope` names the place or branch the batch was selected from and is
    /// carried into every log line.
    pub async fn purge_documents(
        &self,
        kind: &str,
        scope: &str,
        docs: Vec<Document>,
    ) -> Result<PurgeReport> {
        let total = docs.len();
        let audit_path = (!docs.is_empty()).then(|| self.audit.deletion_path(kind));
        let docs = match audit_path {
            Some(ref path) => self
                .audit
                .snapshot_to_file(path, docs)
                .await
                .inspect_err(|e| {
                    tracing::error!("Snapshot of {} {} for {} failed: {}", total, kind, scope, e)
                })?,
            None => docs,
        };

        let tombstoned = self.tombstone(docs).await.inspect_err(|e| {
            tracing::error!("Tombstoning {} {} for {} failed: {}", total, kind, scope, e)
        })?;
        let written = if self.dry_run.is_active() { 0 } else { tombstoned.len() };
        tracing::info!("Tombstoned {} of {} {} for {}", written, total, kind, scope);

        Ok(PurgeReport {
            cascade: CascadeReport {
                outcomes: Vec::new(),
                dry_run: self.dry_run.is_active(),
            },
            audit_path,
            tombstoned: written,
            dry_run: self.dry_run.is_active(),
        })
    }

    /// Strip every facility reference to `persons`, then tombstone them
    pub async fn purge_contacts(&self, scope: &str, persons: Vec<Document>) -> Result<PurgeReport> {
        let ids: Vec<String> = persons.iter().map(|p| p.id.clone()).collect();
        let cascade = self
            .clean_all(&ids)
            .await
            .inspect_err(|_| tracing::error!("Contacts for {} were not tombstoned", scope))?;
        let mut report = self.purge_documents("persons", scope, persons).await?;
        report.cascade = cascade;
        Ok(report)
    }

    async fn write_all(&self, docs: &[Document], action: &str) -> Result<Vec<BulkWriteResult>> {
        let results = self.store.bulk_write(docs).await.inspect_err(|e| {
            tracing::error!("{} of {} documents failed: {}", action, docs.len(), e)
        })?;

        let mut failures: Vec<String> = results
            .iter()
            .filter(|r| !r.is_ok())
            .map(ToString::to_string)
            .collect();
        let written = results.len() - failures.len();

        // a document the store did not answer for was not written
        failures.extend(
            docs.iter()
                .filter(|doc| !results.iter().any(|r| r.id == doc.id))
                .map(|doc| format!("{}: no result returned", doc.id)),
        );
        if results.len() != docs.len() && failures.is_empty() {
            failures.push(format!(
                "{} results for {} documents",
                results.len(),
                docs.len()
            ));
        }

        tracing::info!(
            "{}: {} written, {} rejected",
            action,
            written,
            failures.len()
        );

        if let Some(first) = failures.first() {
            for failure in &failures {
                tracing::error!("{} rejected {}", action, failure);
            }
            return Err(SweepError::BulkWrite {
                failed: failures.len(),
                total: docs.len(),
                first: first.clone(),
            });
        }
        Ok(results)
    }
}
