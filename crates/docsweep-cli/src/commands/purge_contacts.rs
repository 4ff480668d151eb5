//! Purge contacts under a place

use super::{confirm, print_report, Session};
use crate::app::{OutputFormat, PurgeContactsArgs};
use anyhow::Result;

pub async fn run(args: PurgeContactsArgs, session: &Session, format: OutputFormat) -> Result<()> {
    let batch_size = session.batch_size(args.batch_size)?;
    let persons = session
        .selector()
        .select_contacts_for_place(&args.place, batch_size)
        .await?;

    if persons.is_empty() {
        println!("No contacts found under place {}", args.place);
        return Ok(());
    }

    confirm(
        &args.run,
        &format!(
            "Unlink and delete {} contacts under place {}?",
            persons.len(),
            args.place
        ),
    )?;

    let report = session
        .cleaner(&args.run)
        .purge_contacts(&format!("place {}", args.place), persons)
        .await?;
    print_report(&report, format)
}
