//! Docsweep Core Library
//!
//! Cascading cleanup of stale documents in a replicated document store.
//!
//! # Features
//! - Batch selection of contacts by place and records by branch
//! - Reference resolution before deletion (no orphaned facility contacts)
//! - File-based audit snapshots written before every mutation
//! - Tombstone deletes so removals replicate downstream
//! - Dry-run mode that keeps every read and audit step observable

pub mod audit;
pub mod cascade;
pub mod config;
pub mod confirm;
pub mod dry_run;
pub mod error;
pub mod model;
pub mod resolver;
pub mod selector;
pub mod store;

pub use audit::AuditWriter;
pub use cascade::{CascadeCleaner, CascadeReport, PurgeReport, SubjectOutcome};
pub use config::{Config, StoreConfig, ViewNames};
pub use confirm::{AutoConfirm, Confirmation, ConfirmationGate, TerminalPrompt};
pub use dry_run::DryRunPolicy;
pub use error::{Error, Result, SweepError};
pub use model::{Branch, Document};
pub use resolver::ReferenceResolver;
pub use selector::{filter_by_date_range, filter_by_type, BatchSelector};
pub use store::{
    BulkWriteResult, CouchStore, DocumentStore, MemoryStore, StoreCall, StoreInfo, ViewQuery,
    ViewResponse, ViewRow,
};

/// Default config directory name
pub const CONFIG_DIR_NAME: &str = "docsweep";

/// Default data directory name (audit snapshots and log files)
pub const DATA_DIR_NAME: &str = "docsweep";

/// Document type discriminator for contacts
pub const PERSON_TYPE: &str = "person";

/// Document type discriminator for facilities
pub const FACILITY_TYPE: &str = "facility";
