use log::info;

use crate::config::{Config, FinalizePolicy};
use crate::error::Result;
use crate::workbook::Workbook;
use crate::xlsx;

/// Marks the consumed detail sheet as processed by swapping its pending
/// marker for the completed one. Returns the new name when a rename happened.
pub fn mark_completed(book: &mut Workbook, source: &str, config: &Config, writes: usize) -> Option<String> {
    if config.finalize == FinalizePolicy::OnWrites && writes == 0 {
        return None;
    }

    let wanted = source.replace(&config.source.pending_marker, &config.source.completed_marker);
    if wanted == source {
        return None;
    }

    let renamed = book.rename_sheet(source, &wanted)?;
    info!("renamed '{}' to '{}'", source, renamed);
    Some(renamed)
}

pub fn serialize(original: &[u8], book: &Workbook) -> Result<Vec<u8>> {
    xlsx::write_workbook(original, book)
}
