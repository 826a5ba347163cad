//! Event export for process mining

use super::stats::collection_clients;
use crate::error::Result;
use crate::meta::MetaDb;
use crate::trace::{event_rows, EventRecord};
use std::io::Write;

/// Every request of a collection as an event row, in session order
pub async fn cmd_events(db: &MetaDb, collection: &str) -> Result<Vec<EventRecord>> {
    let clients = collection_clients(db, collection).await?;
    Ok(event_rows(&clients))
}

/// Write event rows as `;`-separated CSV with a header
pub fn write_events<W: Write>(events: &[EventRecord], out: W) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().delimiter(b';').from_writer(out);
    for event in events {
        writer.serialize(event)?;
    }
    writer.flush()?;
    Ok(())
}
