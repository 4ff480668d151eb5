//! Info command

use super::Session;
use crate::app::OutputFormat;
use anyhow::Result;
use docsweep_core::DocumentStore;

pub async fn run(session: &Session, format: OutputFormat) -> Result<()> {
    let info = session.store.info().await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        OutputFormat::Cli => {
            println!("Database:        {}", info.db_name);
            println!("Documents:       {}", info.doc_count);
            println!("Tombstones:      {}", info.doc_del_count);
            println!("Update seq:      {}", info.update_seq);
            println!();
            println!("Log directory:   {}", session.config.log_dir.display());
        }
    }
    Ok(())
}
