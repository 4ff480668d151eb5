//! Document model
//!
//! Documents are kept as transient copies of store records. Only the fields
//! the pipeline reads or rewrites are typed; everything else round-trips
//! through `extra` untouched.

use crate::error::{Result, SweepError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Generic store record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    #[serde(rename = "_deleted", default, skip_serializing_if = "is_false")]
    pub deleted: bool,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,

    /// Usually epoch milliseconds; kept as stored so rewrites are lossless
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_date: Option<Value>,

    /// Weak reference to a person: a bare id or an object carrying `_id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Document {
    /// Create a bare document with an id and type
    pub fn new(id: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rev: None,
            deleted: false,
            doc_type: Some(doc_type.into()),
            reported_date: None,
            contact: None,
            extra: Map::new(),
        }
    }

    pub fn with_contact(mut self, contact_id: impl Into<String>) -> Self {
        self.contact = Some(Value::String(contact_id.into()));
        self
    }

    pub fn with_reported_date(mut self, millis: i64) -> Self {
        self.reported_date = Some(Value::from(millis));
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Returns true when the `type` discriminator matches
    pub fn is_type(&self, doc_type: &str) -> bool {
        self.doc_type.as_deref() == Some(doc_type)
    }

    /// Id of the referenced contact, if any
    pub fn contact_id(&self) -> Option<&str> {
        match self.contact.as_ref()? {
            Value::String(id) if !id.is_empty() => Some(id),
            Value::Object(obj) => obj.get("_id").and_then(Value::as_str),
            _ => None,
        }
    }

    /// Drop the contact reference, returning what was there
    pub fn clear_contact(&mut self) -> Option<Value> {
        self.contact.take()
    }

    /// `reported_date` as epoch milliseconds.
    ///
    /// Integers are taken as is, floats are truncated and RFC 3339 strings are
    /// parsed. Anything else counts as undated.
    pub fn reported_millis(&self) -> Option<i64> {
        match self.reported_date.as_ref()? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
            Value::String(raw) => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|at| at.with_timezone(&Utc).timestamp_millis()),
            _ => None,
        }
    }

    /// Ids of the `parent` chain, nearest first
    pub fn ancestor_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        let mut parent = self.extra.get("parent");
        while let Some(Value::Object(obj)) = parent {
            match obj.get("_id").and_then(Value::as_str) {
                Some(id) => ids.push(id),
                None => break,
            }
            parent = obj.get("parent");
        }
        ids
    }

    /// Field from the opaque payload, as a string
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

/// Deletion scope label; read-only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub branch_type: String,
}

impl TryFrom<&Document> for Branch {
    type Error = SweepError;

    fn try_from(doc: &Document) -> Result<Self> {
        let name = doc.str_field("name").ok_or_else(|| {
            SweepError::InvalidInput(format!("branch {} has no name", doc.id))
        })?;
        Ok(Self {
            id: doc.id.clone(),
            name: name.to_string(),
            branch_type: doc.doc_type.clone().unwrap_or_default(),
        })
    }
}

impl std::fmt::Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.branch_type, self.id)
    }
}
