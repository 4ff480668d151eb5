//! Document store gateway
//!
//! The pipeline only talks to the store through [`DocumentStore`]: point
//! reads, secondary-index view queries, bulk writes and database info.
//! [`CouchStore`] speaks the CouchDB HTTP API; [`MemoryStore`] keeps the same
//! semantics in process.

mod couch;
mod memory;

pub use couch::CouchStore;
pub use memory::{collate, MemoryStore, StoreCall};

use crate::error::Result;
use crate::model::Document;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Gateway contract over the external document database
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a single document by id
    async fn get(&self, id: &str) -> Result<Document>;

    /// Query a `design/view` secondary index
    async fn query(&self, view: &str, query: &ViewQuery) -> Result<ViewResponse>;

    /// Write documents in one request; one result per input document
    async fn bulk_write(&self, docs: &[Document]) -> Result<Vec<BulkWriteResult>>;

    /// Database statistics
    async fn info(&self) -> Result<StoreInfo>;
}

/// Parameters for a view query
#[derive(Debug, Clone, PartialEq)]
pub struct ViewQuery {
    pub key: Option<Value>,
    pub start_key: Option<Value>,
    pub end_key: Option<Value>,
    pub inclusive_end: bool,
    pub include_docs: bool,
    pub limit: Option<usize>,
}

impl Default for ViewQuery {
    fn default() -> Self {
        Self {
            key: None,
            start_key: None,
            end_key: None,
            inclusive_end: true,
            include_docs: false,
            limit: None,
        }
    }
}

impl ViewQuery {
    /// Exact-key lookup
    pub fn key(key: Value) -> Self {
        Self {
            key: Some(key),
            ..Self::default()
        }
    }

    /// Half-open range `[start, end)`
    pub fn range(start: Value, end: Value) -> Self {
        Self {
            start_key: Some(start),
            end_key: Some(end),
            inclusive_end: false,
            ..Self::default()
        }
    }

    pub fn include_docs(mut self) -> Self {
        self.include_docs = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// View query result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewResponse {
    #[serde(default)]
    pub total_rows: Option<u64>,
    pub rows: Vec<ViewRow>,
}

impl ViewResponse {
    /// Documents attached to the rows; rows without a doc are skipped
    pub fn into_docs(self) -> Vec<Document> {
        self.rows.into_iter().filter_map(|row| row.doc).collect()
    }
}

/// Single view row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewRow {
    pub id: String,
    #[serde(default)]
    pub key: Value,
    #[serde(default)]
    pub doc: Option<Document>,
}

/// Per-document outcome of a bulk write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkWriteResult {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BulkWriteResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl std::fmt::Display for BulkWriteResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.error, &self.reason) {
            (Some(error), Some(reason)) => write!(f, "{}: {} ({})", self.id, error, reason),
            (Some(error), None) => write!(f, "{}: {}", self.id, error),
            (None, _) => write!(f, "{}: ok", self.id),
        }
    }
}

/// Database statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreInfo {
    pub db_name: String,
    #[serde(default)]
    pub doc_count: u64,
    #[serde(default)]
    pub doc_del_count: u64,
    #[serde(default)]
    pub update_seq: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
