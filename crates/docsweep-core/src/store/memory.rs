//! In-process document store
//!
//! Mirrors the gateway semantics the pipeline relies on: views built from
//! map functions, CouchDB key collation, deleted documents hidden from views
//! and point reads, revision checks on bulk writes. Every call is journaled
//! in order so tests can assert on call sequencing.

use super::{BulkWriteResult, DocumentStore, StoreInfo, ViewQuery, ViewResponse, ViewRow};
use crate::config::ViewNames;
use crate::error::{Result, SweepError};
use crate::model::Document;
use crate::{FACILITY_TYPE, PERSON_TYPE};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

type MapFn = Box<dyn Fn(&Document) -> Vec<Value> + Send + Sync>;

/// A call received by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Get(String),
    Query { view: String, query: ViewQuery },
    BulkWrite(Vec<Document>),
    Info,
}

#[derive(Default)]
struct State {
    docs: BTreeMap<String, Document>,
    calls: Vec<StoreCall>,
    unavailable: bool,
    rejected: HashSet<String>,
}

/// Document store held in memory
#[derive(Default)]
pub struct MemoryStore {
    views: HashMap<String, MapFn>,
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the three views the cleanup pipeline queries
    pub fn with_standard_views(views: &ViewNames) -> Self {
        Self::new()
            .with_view(&views.contacts_by_place, |doc| {
                if !doc.is_type(PERSON_TYPE) {
                    return Vec::new();
                }
                doc.ancestor_ids().into_iter().map(|id| json!([id])).collect()
            })
            .with_view(&views.records_by_branch, |doc| match doc.str_field("branch") {
                Some(branch) => vec![json!([branch])],
                None => Vec::new(),
            })
            .with_view(&views.facilities_by_contact, |doc| {
                match (doc.is_type(FACILITY_TYPE), doc.contact_id()) {
                    (true, Some(contact)) => vec![json!([contact])],
                    _ => Vec::new(),
                }
            })
    }

    /// Register a view; the map function returns the keys to emit
    pub fn with_view<F>(mut self, name: &str, map: F) -> Self
    where
        F: Fn(&Document) -> Vec<Value> + Send + Sync + 'static,
    {
        self.views.insert(name.to_string(), Box::new(map));
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a document, assigning a first revision when it has none
    pub fn insert(&self, mut doc: Document) {
        if doc.rev.is_none() {
            doc.rev = Some(next_rev(None));
        }
        self.state().docs.insert(doc.id.clone(), doc);
    }

    /// Seed several documents
    pub fn insert_all(&self, docs: impl IntoIterator<Item = Document>) {
        for doc in docs {
            self.insert(doc);
        }
    }

    /// Current stored version of a document, tombstones included
    pub fn doc(&self, id: &str) -> Option<Document> {
        self.state().docs.get(id).cloned()
    }

    /// Every stored document, tombstones included
    pub fn docs(&self) -> Vec<Document> {
        self.state().docs.values().cloned().collect()
    }

    /// Calls received so far, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    /// Batches received by `bulk_write`, in order
    pub fn bulk_writes(&self) -> Vec<Vec<Document>> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                StoreCall::BulkWrite(docs) => Some(docs.clone()),
                _ => None,
            })
            .collect()
    }

    /// Make every following call fail as if the server were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Reject writes for this id with a per-document error
    pub fn reject_writes_for(&self, id: impl Into<String>) {
        self.state().rejected.insert(id.into());
    }

    fn record(&self, call: StoreCall) -> Result<MutexGuard<'_, State>> {
        let mut state = self.state();
        state.calls.push(call);
        if state.unavailable {
            return Err(SweepError::Unavailable("memory store is offline".to_string()));
        }
        Ok(state)
    }
}

fn rev_generation(rev: Option<&str>) -> u64 {
    rev.and_then(|r| r.split_once('-'))
        .and_then(|(generation, _)| generation.parse().ok())
        .unwrap_or(0)
}

fn next_rev(rev: Option<&str>) -> String {
    format!("{}-mem", rev_generation(rev) + 1)
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Order two view keys the way CouchDB collates them
///
/// Strings compare by code point rather than ICU collation, which is enough
/// for the id-prefix ranges the pipeline issues.
pub fn collate(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ord = collate(left, right);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => collate_objects(x, y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn collate_objects(x: &Map<String, Value>, y: &Map<String, Value>) -> Ordering {
    for ((kx, vx), (ky, vy)) in x.iter().zip(y.iter()) {
        let ord = kx.cmp(ky).then_with(|| collate(vx, vy));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    x.len().cmp(&y.len())
}

fn key_matches(key: &Value, query: &ViewQuery) -> bool {
    if let Some(ref exact) = query.key {
        return collate(key, exact) == Ordering::Equal;
    }
    if let Some(ref start) = query.start_key {
        if collate(key, start) == Ordering::Less {
            return false;
        }
    }
    if let Some(ref end) = query.end_key {
        return match collate(key, end) {
            Ordering::Less => true,
            Ordering::Equal => query.inclusive_end,
            Ordering::Greater => false,
        };
    }
    true
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, id: &str) -> Result<Document> {
        let state = self.record(StoreCall::Get(id.to_string()))?;
        state
            .docs
            .get(id)
            .filter(|doc| !doc.deleted)
            .cloned()
            .ok_or_else(|| SweepError::DocumentNotFound(id.to_string()))
    }

    async fn query(&self, view: &str, query: &ViewQuery) -> Result<ViewResponse> {
        let state = self.record(StoreCall::Query {
            view: view.to_string(),
            query: query.clone(),
        })?;
        let map = self.views.get(view).ok_or_else(|| SweepError::Store {
            status: 404,
            body: format!("missing view {}", view),
        })?;

        let mut rows: Vec<ViewRow> = Vec::new();
        let mut total_rows = 0u64;
        for doc in state.docs.values().filter(|doc| !doc.deleted) {
            for key in map(doc) {
                total_rows += 1;
                if key_matches(&key, query) {
                    rows.push(ViewRow {
                        id: doc.id.clone(),
                        key,
                        doc: query.include_docs.then(|| doc.clone()),
                    });
                }
            }
        }

        rows.sort_by(|a, b| collate(&a.key, &b.key).then_with(|| a.id.cmp(&b.id)));
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(ViewResponse {
            total_rows: Some(total_rows),
            rows,
        })
    }

    async fn bulk_write(&self, docs: &[Document]) -> Result<Vec<BulkWriteResult>> {
        let mut state = self.record(StoreCall::BulkWrite(docs.to_vec()))?;

        let mut results = Vec::with_capacity(docs.len());
        for doc in docs {
            let current_rev = state.docs.get(&doc.id).and_then(|d| d.rev.clone());
            if state.rejected.contains(&doc.id) || current_rev != doc.rev {
                results.push(BulkWriteResult {
                    id: doc.id.clone(),
                    rev: None,
                    error: Some("conflict".to_string()),
                    reason: Some("Document update conflict.".to_string()),
                });
                continue;
            }

            let mut stored = doc.clone();
            stored.rev = Some(next_rev(doc.rev.as_deref()));
            results.push(BulkWriteResult {
                id: doc.id.clone(),
                rev: stored.rev.clone(),
                error: None,
                reason: None,
            });
            state.docs.insert(stored.id.clone(), stored);
        }
        Ok(results)
    }

    async fn info(&self) -> Result<StoreInfo> {
        let state = self.record(StoreCall::Info)?;
        let deleted = state.docs.values().filter(|doc| doc.deleted).count() as u64;
        let writes = state
            .calls
            .iter()
            .filter(|call| matches!(call, StoreCall::BulkWrite(_)))
            .count();
        Ok(StoreInfo {
            db_name: "memory".to_string(),
            doc_count: state.docs.len() as u64 - deleted,
            doc_del_count: deleted,
            update_seq: json!(writes),
            extra: Map::new(),
        })
    }
}
