//! Strip facility references without deleting contacts

use super::{confirm, print_report, Session};
use crate::app::{OutputFormat, UnlinkArgs};
use anyhow::Result;
use docsweep_core::PurgeReport;

pub async fn run(args: UnlinkArgs, session: &Session, format: OutputFormat) -> Result<()> {
    confirm(
        &args.run,
        &format!(
            "Clear facility references to {} contacts?",
            args.person_ids.len()
        ),
    )?;

    let cascade = session.cleaner(&args.run).clean_all(&args.person_ids).await?;
    let report = PurgeReport {
        dry_run: cascade.dry_run,
        cascade,
        ..PurgeReport::default()
    };
    print_report(&report, format)
}
