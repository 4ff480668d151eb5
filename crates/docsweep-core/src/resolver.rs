//! Reference resolution
//!
//! Finds the facilities that still point at a person through their
//! `contact` field.

use crate::error::Result;
use crate::model::Document;
use crate::store::{DocumentStore, ViewQuery};
use crate::FACILITY_TYPE;
use serde_json::json;
use std::sync::Arc;

/// Looks up facilities by contact id
pub struct ReferenceResolver {
    store: Arc<dyn DocumentStore>,
    view: String,
}

impl ReferenceResolver {
    /// `view` is keyed by `[contactId]`
    pub fn new(store: Arc<dyn DocumentStore>, view: impl Into<String>) -> Self {
        Self {
            store,
            view: view.into(),
        }
    }

    /// All facilities whose `contact` is `person_id`.
    ///
    /// Store failures are logged with the person id and returned to the
    /// caller unchanged.
    pub async fn find_referencing_facilities(&self, person_id: &str) -> Result<Vec<Document>> {
        let query = ViewQuery::key(json!([person_id])).include_docs();
        let response = match self.store.query(&self.view, &query).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Failed to look up facilities for contact {}: {}", person_id, e);
                return Err(e);
            }
        };

        let facilities: Vec<Document> = response
            .into_docs()
            .into_iter()
            .filter(|doc| doc.is_type(FACILITY_TYPE) && doc.contact_id() == Some(person_id))
            .collect();

        if !facilities.is_empty() {
            tracing::info!(
                "Found {} facilities referencing contact {}",
                facilities.len(),
                person_id
            );
        }
        Ok(facilities)
    }
}
