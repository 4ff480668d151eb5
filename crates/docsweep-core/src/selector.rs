//! Candidate selection
//!
//! Pulls deletion candidates out of the store's secondary indexes and narrows
//! them with in-memory predicates.

use crate::error::Result;
use crate::model::{Branch, Document};
use crate::store::{DocumentStore, ViewQuery};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;

/// Upper bound appended to a key prefix for lexical range scans
pub const MAX_SENTINEL: char = '\u{fff0}';

/// Selects candidate documents by hierarchy scope
pub struct BatchSelector {
    store: Arc<dyn DocumentStore>,
    contacts_view: String,
    records_view: String,
}

impl BatchSelector {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        contacts_view: impl Into<String>,
        records_view: impl Into<String>,
    ) -> Self {
        Self {
            store,
            contacts_view: contacts_view.into(),
            records_view: records_view.into(),
        }
    }

    /// Up to `batch_size` contacts whose ancestry includes `place_id`
    pub async fn select_contacts_for_place(
        &self,
        place_id: &str,
        batch_size: usize,
    ) -> Result<Vec<Document>> {
        let query = ViewQuery::key(json!([place_id]))
            .include_docs()
            .limit(batch_size);
        let docs = self
            .store
            .query(&self.contacts_view, &query)
            .await
            .inspect_err(|e| {
                tracing::error!("Failed to select contacts for place {}: {}", place_id, e)
            })?
            .into_docs();

        tracing::info!("Retrieved {} contacts for place {}", docs.len(), place_id);
        Ok(docs)
    }

    /// Up to `batch_size` documents keyed under `branch_id` or any id it prefixes
    pub async fn select_records_for_branch(
        &self,
        branch_id: &str,
        batch_size: usize,
    ) -> Result<Vec<Document>> {
        let end = format!("{}{}", branch_id, MAX_SENTINEL);
        let query = ViewQuery::range(json!([branch_id]), json!([end]))
            .include_docs()
            .limit(batch_size);
        let docs = self
            .store
            .query(&self.records_view, &query)
            .await
            .inspect_err(|e| {
                tracing::error!("Failed to select records for branch {}: {}", branch_id, e)
            })?
            .into_docs();

        tracing::info!("Retrieved {} records for branch {}", docs.len(), branch_id);
        Ok(docs)
    }

    /// Fetch the branch document to label a deletion scope
    pub async fn describe_branch(&self, branch_id: &str) -> Result<Branch> {
        let doc = self
            .store
            .get(branch_id)
            .await
            .inspect_err(|e| tracing::error!("Failed to fetch branch {}: {}", branch_id, e))?;
        Branch::try_from(&doc)
    }
}

/// Keep documents whose `type` equals `doc_type`
pub fn filter_by_type(docs: Vec<Document>, doc_type: &str) -> Vec<Document> {
    docs.into_iter().filter(|doc| doc.is_type(doc_type)).collect()
}

/// Keep documents reported in `[start, end)`; undated documents are dropped
pub fn filter_by_date_range(
    docs: Vec<Document>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<Document> {
    let (start, end) = (start.timestamp_millis(), end.timestamp_millis());
    docs.into_iter()
        .filter(|doc| matches!(doc.reported_millis(), Some(at) if at >= start && at < end))
        .collect()
}
