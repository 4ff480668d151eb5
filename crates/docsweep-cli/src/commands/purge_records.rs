//! Purge records under a branch

use super::{confirm, print_report, Session};
use crate::app::{OutputFormat, PurgeRecordsArgs};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use docsweep_core::{filter_by_date_range, filter_by_type, SweepError};

pub async fn run(args: PurgeRecordsArgs, session: &Session, format: OutputFormat) -> Result<()> {
    let range = date_range(args.from.as_deref(), args.to.as_deref())?;
    let batch_size = session.batch_size(args.batch_size)?;

    let selector = session.selector();
    let branch = selector.describe_branch(&args.branch).await?;
    tracing::info!("Selecting records for branch {}", branch);

    let mut records = selector
        .select_records_for_branch(&args.branch, batch_size)
        .await?;
    if let Some(ref doc_type) = args.doc_type {
        records = filter_by_type(records, doc_type);
        tracing::info!("{} records of type {}", records.len(), doc_type);
    }
    if let Some((start, end)) = range {
        records = filter_by_date_range(records, start, end);
        tracing::info!("{} records reported in [{}, {})", records.len(), start, end);
    }

    if records.is_empty() {
        println!("No matching records under {}", branch);
        return Ok(());
    }

    confirm(
        &args.run,
        &format!("Delete {} records under {}?", records.len(), branch),
    )?;

    let report = session
        .cleaner(&args.run)
        .purge_documents("records", &format!("branch {}", args.branch), records)
        .await?;
    print_report(&report, format)
}

/// `None` when neither bound is given; open bounds extend to the calendar limits
fn date_range(
    from: Option<&str>,
    to: Option<&str>,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, SweepError> {
    if from.is_none() && to.is_none() {
        return Ok(None);
    }
    let start = from.map(parse_date).transpose()?.unwrap_or(DateTime::<Utc>::MIN_UTC);
    let end = to.map(parse_date).transpose()?.unwrap_or(DateTime::<Utc>::MAX_UTC);
    if start > end {
        return Err(SweepError::InvalidInput(format!(
            "--from {} is after --to {}",
            start, end
        )));
    }
    Ok(Some((start, end)))
}

/// RFC 3339 timestamp or `YYYY-MM-DD` (UTC midnight)
fn parse_date(raw: &str) -> Result<DateTime<Utc>, SweepError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| SweepError::InvalidInput(format!("unrecognized date `{}`", raw)))
}
