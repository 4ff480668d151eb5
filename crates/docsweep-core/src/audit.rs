//! Pre-mutation audit snapshots
//!
//! Every document the pipeline is about to rewrite or tombstone is first
//! serialized to a JSON file under the log directory. The write is flushed
//! to disk before the call returns, so a crash between snapshot and mutation
//! still leaves the pre-image on disk.

use crate::error::{Result, SweepError};
use crate::model::Document;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Writes document snapshots into one directory
#[derive(Debug, Clone)]
pub struct AuditWriter {
    dir: PathBuf,
}

impl AuditWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<dir>/cleaned_facilities_<subject>.json`
    pub fn facilities_path(&self, subject_id: &str) -> PathBuf {
        self.dir
            .join(format!("cleaned_facilities_{}.json", file_safe(subject_id)))
    }

    /// `<dir>/deleted_<kind>_<timestamp>.json`
    pub fn deletion_path(&self, kind: &str) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ");
        self.dir
            .join(format!("deleted_{}_{}.json", file_safe(kind), stamp))
    }

    /// Serialize `docs` to `path` and hand them back once the file is synced.
    ///
    /// An empty list is a no-op: no file and no directory are created. An
    /// existing file at `path` is moved aside to `<path>.<millis>` (with a
    /// `-<n>` suffix if that name is taken too) rather than overwritten.
    pub async fn snapshot_to_file(
        &self,
        path: &Path,
        docs: Vec<Document>,
    ) -> Result<Vec<Document>> {
        if docs.is_empty() {
            return Ok(docs);
        }

        let audit_err = |source: std::io::Error| SweepError::Audit {
            path: path.to_path_buf(),
            source,
        };

        let payload = serde_json::to_vec_pretty(&docs)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(audit_err)?;
        }

        if tokio::fs::try_exists(path).await.map_err(audit_err)? {
            let aside = free_aside_path(path).await.map_err(audit_err)?;
            tracing::warn!(
                "Audit file {} already exists, keeping it as {}",
                path.display(),
                aside.display()
            );
            tokio::fs::rename(path, &aside).await.map_err(audit_err)?;
        }

        let mut file = tokio::fs::File::create(path).await.map_err(audit_err)?;
        file.write_all(&payload).await.map_err(audit_err)?;
        file.sync_all().await.map_err(audit_err)?;

        tracing::info!("Wrote {} documents to {}", docs.len(), path.display());
        Ok(docs)
    }
}

/// First unused `<path>.<millis>[-<n>]`
async fn free_aside_path(path: &Path) -> std::io::Result<PathBuf> {
    let stamp = Utc::now().timestamp_millis();
    let mut attempt = 0u32;
    loop {
        let mut candidate = path.as_os_str().to_owned();
        candidate.push(format!(".{}", stamp));
        if attempt > 0 {
            candidate.push(format!("-{}", attempt));
        }
        let candidate = PathBuf::from(candidate);
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        attempt += 1;
    }
}

/// Keep ids usable as file name components.
///
/// Ids that needed rewriting get a short hash of the raw id appended, so
/// `a/b` and `a_b` never share a file.
fn file_safe(raw: &str) -> String {
    let safe: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe == raw {
        return safe;
    }
    let digest = blake3::hash(raw.as_bytes()).to_hex();
    format!("{}-{}", safe, &digest.as_str()[..8])
}
