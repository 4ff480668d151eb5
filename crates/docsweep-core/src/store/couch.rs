//! HTTP gateway for CouchDB-compatible stores

use super::{BulkWriteResult, DocumentStore, StoreInfo, ViewQuery, ViewResponse};
use crate::config::{split_view_name, StoreConfig};
use crate::error::{Result, SweepError};
use crate::model::Document;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use std::time::Duration;

/// CouchDB HTTP client bound to one database
pub struct CouchStore {
    http_client: reqwest::Client,
    base_url: Url,
    config: StoreConfig,
}

impl CouchStore {
    /// Create new store client from configuration
    pub fn new(config: StoreConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(SweepError::Http)?;

        let base_url = Url::parse(&config.url)
            .map_err(|e| SweepError::Config(format!("invalid store url `{}`: {}", config.url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SweepError::Config(format!(
                "store url `{}` cannot carry a path",
                config.url
            )));
        }

        Ok(Self {
            http_client,
            base_url,
            config,
        })
    }

    pub fn database(&self) -> &str {
        &self.config.database
    }

    fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(&self.config.database).extend(segments);
        }
        url
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let req = self.http_client.request(method, url);
        match self.config.username {
            Some(ref user) => req.basic_auth(user, self.config.password.as_ref()),
            None => req,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = req.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                SweepError::Unavailable(e.to_string())
            } else {
                SweepError::Http(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SweepError::Store {
            status: status.as_u16(),
            body,
        })
    }
}

fn encode_key(value: &serde_json::Value) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn view_params(query: &ViewQuery) -> Result<Vec<(&'static str, String)>> {
    let mut params = Vec::new();
    if let Some(ref key) = query.key {
        params.push(("key", encode_key(key)?));
    }
    if let Some(ref start) = query.start_key {
        params.push(("startkey", encode_key(start)?));
    }
    if let Some(ref end) = query.end_key {
        params.push(("endkey", encode_key(end)?));
    }
    if !query.inclusive_end {
        params.push(("inclusive_end", "false".to_string()));
    }
    if query.include_docs {
        params.push(("include_docs", "true".to_string()));
    }
    if let Some(limit) = query.limit {
        params.push(("limit", limit.to_string()));
    }
    Ok(params)
}

#[async_trait]
impl DocumentStore for CouchStore {
    async fn get(&self, id: &str) -> Result<Document> {
        let url = self.url_for(&[id]);
        match self.send(self.request(reqwest::Method::GET, url)).await {
            Ok(response) => Ok(response.json().await?),
            Err(SweepError::Store { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(SweepError::DocumentNotFound(id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn query(&self, view: &str, query: &ViewQuery) -> Result<ViewResponse> {
        let (ddoc, name) = split_view_name(view)?;
        let url = self.url_for(&["_design", ddoc, "_view", name]);
        let params = view_params(query)?;

        tracing::debug!("Querying view {} with {:?}", view, params);

        let req = self.request(reqwest::Method::GET, url).query(&params);
        let response = self.send(req).await?;
        Ok(response.json().await?)
    }

    async fn bulk_write(&self, docs: &[Document]) -> Result<Vec<BulkWriteResult>> {
        #[derive(Serialize)]
        struct BulkDocsRequest<'a> {
            docs: &'a [Document],
        }

        let url = self.url_for(&["_bulk_docs"]);
        let req = self
            .request(reqwest::Method::POST, url)
            .json(&BulkDocsRequest { docs });
        let response = self.send(req).await?;
        Ok(response.json().await?)
    }

    async fn info(&self) -> Result<StoreInfo> {
        let url = self.url_for(&[]);
        let response = self.send(self.request(reqwest::Method::GET, url)).await?;
        Ok(response.json().await?)
    }
}
