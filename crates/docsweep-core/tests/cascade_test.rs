//! Integration tests for the cascading cleanup pipeline

use async_trait::async_trait;
use docsweep_core::{
    AuditWriter, BulkWriteResult, CascadeCleaner, Document, DocumentStore, DryRunPolicy,
    MemoryStore, ReferenceResolver, Result, StoreCall, StoreInfo, SweepError, ViewNames,
    ViewQuery, ViewResponse,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::with_standard_views(&ViewNames::default()));
    store.insert_all([
        Document::new("P1", "person"),
        Document::new("P2", "person"),
        Document::new("P3", "person"),
        Document::new("F1", "facility")
            .with_contact("P1")
            .with_field("name", json!("North Clinic")),
        Document::new("F2", "facility").with_contact("P1"),
        Document::new("F3", "facility").with_contact("P2"),
    ]);
    store
}

fn cleaner(
    store: Arc<dyn DocumentStore>,
    log_dir: &Path,
    dry_run: DryRunPolicy,
) -> CascadeCleaner {
    let view = ViewNames::default().facilities_by_contact;
    let resolver = ReferenceResolver::new(store.clone(), view);
    CascadeCleaner::new(store, resolver, AuditWriter::new(log_dir), dry_run)
}

fn ids(docs: &[Document]) -> Vec<&str> {
    docs.iter().map(|d| d.id.as_str()).collect()
}

fn read_snapshot(path: &Path) -> Vec<Document> {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

fn subjects(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_scenario_two_subjects_processed_in_order() {
    let store = seeded_store();
    let logs = TempDir::new().unwrap();
    let cleaner = cleaner(store.clone(), logs.path(), DryRunPolicy::disabled());

    let report = cleaner.clean_all(&subjects(&["P1", "P2"])).await.unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.facilities_cleared(), 3);

    let p1_snapshot = read_snapshot(&logs.path().join("cleaned_facilities_P1.json"));
    assert_eq!(ids(&p1_snapshot), vec!["F1", "F2"]);
    assert!(p1_snapshot.iter().all(|f| f.contact_id() == Some("P1")));
    assert_eq!(p1_snapshot[0].str_field("name"), Some("North Clinic"));

    let p2_snapshot = read_snapshot(&logs.path().join("cleaned_facilities_P2.json"));
    assert_eq!(ids(&p2_snapshot), vec!["F3"]);

    let writes = store.bulk_writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(ids(&writes[0]), vec!["F1", "F2"]);
    assert_eq!(ids(&writes[1]), vec!["F3"]);
    assert!(writes.iter().flatten().all(|f| f.contact.is_none()));

    // P1's write lands before any P2 read
    let calls = store.calls();
    let kinds: Vec<String> = calls
        .iter()
        .map(|call| match call {
            StoreCall::Query { query, .. } => format!("query {}", query.key.as_ref().unwrap()),
            StoreCall::BulkWrite(docs) => format!("write {}", docs.len()),
            other => format!("{:?}", other),
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            r#"query ["P1"]"#.to_string(),
            "write 2".to_string(),
            r#"query ["P2"]"#.to_string(),
            "write 1".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_no_facility_keeps_reference_after_purge() {
    let store = seeded_store();
    let logs = TempDir::new().unwrap();
    let cleaner = cleaner(store.clone(), logs.path(), DryRunPolicy::disabled());

    let persons = vec![store.doc("P1").unwrap(), store.doc("P2").unwrap()];
    let report = cleaner.purge_contacts("place hc1", persons).await.unwrap();

    assert_eq!(report.tombstoned, 2);
    assert_eq!(report.cascade.facilities_cleared(), 3);
    for doc in store.docs() {
        if doc.is_type("facility") && !doc.deleted {
            assert_ne!(doc.contact_id(), Some("P1"));
            assert_ne!(doc.contact_id(), Some("P2"));
        }
    }
    assert!(store.doc("P1").unwrap().deleted);
    assert!(store.doc("P2").unwrap().deleted);
    assert!(!store.doc("P3").unwrap().deleted);

    // facilities are updated, never deleted
    assert!(!store.doc("F1").unwrap().deleted);

    let persons_snapshot = read_snapshot(report.audit_path.as_ref().unwrap());
    assert_eq!(ids(&persons_snapshot), vec!["P1", "P2"]);
    assert!(persons_snapshot.iter().all(|p| !p.deleted));

    // the person tombstones are the last write
    let writes = store.bulk_writes();
    assert_eq!(ids(writes.last().unwrap()), vec!["P1", "P2"]);
}

/// Records, at each bulk write, whether the expected audit files already exist
struct SnapshotWatch {
    inner: Arc<MemoryStore>,
    log_dir: PathBuf,
    seen: Mutex<Vec<(Vec<String>, bool)>>,
}

#[async_trait]
impl DocumentStore for SnapshotWatch {
    async fn get(&self, id: &str) -> Result<Document> {
        self.inner.get(id).await
    }

    async fn query(&self, view: &str, query: &ViewQuery) -> Result<ViewResponse> {
        self.inner.query(view, query).await
    }

    async fn bulk_write(&self, docs: &[Document]) -> Result<Vec<BulkWriteResult>> {
        let subject = docs
            .first()
            .and_then(|d| self.inner.doc(&d.id))
            .and_then(|d| d.contact_id().map(str::to_string))
            .unwrap_or_default();
        let exists = self
            .log_dir
            .join(format!("cleaned_facilities_{}.json", subject))
            .exists();
        self.seen
            .lock()
            .unwrap()
            .push((docs.iter().map(|d| d.id.clone()).collect(), exists));
        self.inner.bulk_write(docs).await
    }

    async fn info(&self) -> Result<StoreInfo> {
        self.inner.info().await
    }
}

#[tokio::test]
async fn test_snapshot_exists_before_each_write() {
    let logs = TempDir::new().unwrap();
    let watched = Arc::new(SnapshotWatch {
        inner: seeded_store(),
        log_dir: logs.path().to_path_buf(),
        seen: Mutex::new(Vec::new()),
    });
    let cleaner = cleaner(watched.clone(), logs.path(), DryRunPolicy::disabled());

    cleaner.clean_all(&subjects(&["P1", "P2"])).await.unwrap();

    let seen = watched.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|(_, snapshot_present)| *snapshot_present));
}

#[tokio::test]
async fn test_unreferenced_subject_is_a_no_op() {
    let store = seeded_store();
    let logs = TempDir::new().unwrap();
    let cleaner = cleaner(store.clone(), logs.path(), DryRunPolicy::disabled());

    let outcome = cleaner.clean_subject("P3").await.unwrap();

    assert_eq!(outcome.facilities, 0);
    assert!(outcome.audit_path.is_none());
    assert!(!outcome.committed);
    assert!(store.bulk_writes().is_empty());
    assert_eq!(std::fs::read_dir(logs.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_dry_run_reads_and_audits_but_never_writes() {
    let store = seeded_store();
    let logs = TempDir::new().unwrap();
    let cleaner = cleaner(store.clone(), logs.path(), DryRunPolicy::enabled());

    let persons = vec![store.doc("P1").unwrap(), store.doc("P2").unwrap()];
    let report = cleaner.purge_contacts("place hc1", persons).await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.tombstoned, 0);
    assert_eq!(report.cascade.facilities_cleared(), 3);
    assert!(report.cascade.outcomes.iter().all(|o| !o.committed));
    assert!(logs.path().join("cleaned_facilities_P1.json").exists());
    assert!(logs.path().join("cleaned_facilities_P2.json").exists());
    assert!(report.audit_path.unwrap().exists());

    assert!(store.bulk_writes().is_empty());
    assert_eq!(store.doc("F1").unwrap().contact_id(), Some("P1"));
    assert!(!store.doc("P1").unwrap().deleted);
}

#[tokio::test]
async fn test_tombstone_marks_and_writes_every_document() {
    let store = seeded_store();
    let logs = TempDir::new().unwrap();
    let cleaner = cleaner(store.clone(), logs.path(), DryRunPolicy::disabled());

    let input = vec![store.doc("P3").unwrap(), store.doc("F3").unwrap()];
    let result = cleaner.tombstone(input).await.unwrap();

    assert!(result.iter().all(|d| d.deleted));
    assert_eq!(result[0].rev.as_deref(), Some("2-mem"));
    let writes = store.bulk_writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(ids(&writes[0]), vec!["P3", "F3"]);
    assert!(store.doc("P3").unwrap().deleted);
    assert!(store.doc("F3").unwrap().deleted);
}

#[tokio::test]
async fn test_tombstone_dry_run_returns_input_unchanged() {
    let store = seeded_store();
    let logs = TempDir::new().unwrap();
    let cleaner = cleaner(store.clone(), logs.path(), DryRunPolicy::enabled());

    let input = vec![store.doc("P3").unwrap(), store.doc("F1").unwrap()];
    let before = serde_json::to_vec(&input).unwrap();
    let result = cleaner.tombstone(input).await.unwrap();

    assert_eq!(serde_json::to_vec(&result).unwrap(), before);
    assert!(store.bulk_writes().is_empty());
}

#[tokio::test]
async fn test_tombstone_empty_input_writes_nothing() {
    let store = seeded_store();
    let logs = TempDir::new().unwrap();
    let cleaner = cleaner(store.clone(), logs.path(), DryRunPolicy::disabled());

    assert!(cleaner.tombstone(Vec::new()).await.unwrap().is_empty());
    let report = cleaner
        .purge_documents("records", "branch b1", Vec::new())
        .await
        .unwrap();
    assert!(report.audit_path.is_none());
    assert!(store.bulk_writes().is_empty());
}

/// Fails every query for one contact id
struct FailingLookup {
    inner: Arc<MemoryStore>,
    fail_for: &'static str,
}

#[async_trait]
impl DocumentStore for FailingLookup {
    async fn get(&self, id: &str) -> Result<Document> {
        self.inner.get(id).await
    }

    async fn query(&self, view: &str, query: &ViewQuery) -> Result<ViewResponse> {
        if query.key == Some(json!([self.fail_for])) {
            return Err(SweepError::Store {
                status: 500,
                body: "view index crashed".to_string(),
            });
        }
        self.inner.query(view, query).await
    }

    async fn bulk_write(&self, docs: &[Document]) -> Result<Vec<BulkWriteResult>> {
        self.inner.bulk_write(docs).await
    }

    async fn info(&self) -> Result<StoreInfo> {
        self.inner.info().await
    }
}

#[tokio::test]
async fn test_failure_aborts_remaining_queue() {
    let inner = seeded_store();
    inner.insert(Document::new("F4", "facility").with_contact("P3"));
    let logs = TempDir::new().unwrap();
    let store = Arc::new(FailingLookup {
        inner: inner.clone(),
        fail_for: "P2",
    });
    let cleaner = cleaner(store, logs.path(), DryRunPolicy::disabled());

    let err = cleaner
        .clean_all(&subjects(&["P1", "P2", "P3"]))
        .await
        .unwrap_err();
    assert!(matches!(err, SweepError::Store { status: 500, .. }));

    // P1 finished, P3 never started
    assert!(logs.path().join("cleaned_facilities_P1.json").exists());
    assert!(!logs.path().join("cleaned_facilities_P3.json").exists());
    assert_eq!(inner.bulk_writes().len(), 1);
    assert!(!inner.calls().iter().any(|call| matches!(
        call,
        StoreCall::Query { query, .. } if query.key == Some(json!(["P3"]))
    )));
    assert_eq!(inner.doc("F4").unwrap().contact_id(), Some("P3"));
}

#[tokio::test]
async fn test_rejected_write_stops_cascade_before_persons_are_deleted() {
    let store = seeded_store();
    store.reject_writes_for("F2");
    let logs = TempDir::new().unwrap();
    let cleaner = cleaner(store.clone(), logs.path(), DryRunPolicy::disabled());

    let persons = vec![store.doc("P1").unwrap(), store.doc("P2").unwrap()];
    let err = cleaner.purge_contacts("place hc1", persons).await.unwrap_err();

    match err {
        SweepError::BulkWrite { failed, total, first } => {
            assert_eq!(failed, 1);
            assert_eq!(total, 2);
            assert!(first.starts_with("F2"));
        }
        other => panic!("unexpected error {:?}", other),
    }

    // the snapshot that preceded the failed write stays on disk
    assert!(logs.path().join("cleaned_facilities_P1.json").exists());
    assert_eq!(store.bulk_writes().len(), 1);
    assert!(!store.doc("P1").unwrap().deleted);
    assert!(!store.doc("P2").unwrap().deleted);
}

#[tokio::test]
async fn test_audit_failure_prevents_mutation() {
    let store = seeded_store();
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("logs");
    std::fs::write(&blocker, "not a directory").unwrap();
    let cleaner = cleaner(store.clone(), &blocker, DryRunPolicy::disabled());

    let err = cleaner.clean_subject("P1").await.unwrap_err();

    assert!(matches!(err, SweepError::Audit { .. }));
    assert!(store.bulk_writes().is_empty());
    assert_eq!(store.doc("F1").unwrap().contact_id(), Some("P1"));
}

/// Answers every bulk write with one result fewer than it was sent
struct ShortResults {
    inner: Arc<MemoryStore>,
}

#[async_trait]
impl DocumentStore for ShortResults {
    async fn get(&self, id: &str) -> Result<Document> {
        self.inner.get(id).await
    }

    async fn query(&self, view: &str, query: &ViewQuery) -> Result<ViewResponse> {
        self.inner.query(view, query).await
    }

    async fn bulk_write(&self, docs: &[Document]) -> Result<Vec<BulkWriteResult>> {
        let mut results = self.inner.bulk_write(docs).await?;
        results.pop();
        Ok(results)
    }

    async fn info(&self) -> Result<StoreInfo> {
        self.inner.info().await
    }
}

#[tokio::test]
async fn test_missing_write_results_count_as_failures() {
    let inner = seeded_store();
    let logs = TempDir::new().unwrap();
    let store = Arc::new(ShortResults {
        inner: inner.clone(),
    });
    let cleaner = cleaner(store, logs.path(), DryRunPolicy::disabled());

    let input = vec![inner.doc("P3").unwrap(), inner.doc("F3").unwrap()];
    let err = cleaner.tombstone(input).await.unwrap_err();

    match err {
        SweepError::BulkWrite { failed, total, first } => {
            assert_eq!(failed, 1);
            assert_eq!(total, 2);
            assert_eq!(first, "F3: no result returned");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

/// Collects formatted log output for assertions
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(move || writer.clone())
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

#[tokio::test]
async fn test_snapshot_failure_is_logged_with_kind_and_branch() {
    let (captured, _guard) = capture_logs();
    let store = seeded_store();
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("logs");
    std::fs::write(&blocker, "not a directory").unwrap();
    let cleaner = cleaner(store.clone(), &blocker, DryRunPolicy::disabled());

    let records = vec![Document::new("r1", "data_record")];
    let err = cleaner
        .purge_documents("records", "branch b1", records)
        .await
        .unwrap_err();

    assert!(matches!(err, SweepError::Audit { .. }));
    let text = captured.text();
    assert!(text.contains("ERROR"), "{}", text);
    assert!(text.contains("Snapshot of 1 records for branch b1 failed"), "{}", text);
    assert!(store.bulk_writes().is_empty());
}

#[tokio::test]
async fn test_tombstone_failure_is_logged_with_kind_and_place() {
    let (captured, _guard) = capture_logs();
    let store = seeded_store();
    store.reject_writes_for("P3");
    let logs = TempDir::new().unwrap();
    let cleaner = cleaner(store.clone(), logs.path(), DryRunPolicy::disabled());

    let persons = vec![store.doc("P3").unwrap()];
    let err = cleaner
        .purge_contacts("place hc1", persons)
        .await
        .unwrap_err();

    assert!(matches!(err, SweepError::BulkWrite { failed: 1, .. }));
    let text = captured.text();
    assert!(
        text.contains("Tombstoning 1 persons for place hc1 failed"),
        "{}",
        text
    );
    assert!(!store.doc("P3").unwrap().deleted);
}
