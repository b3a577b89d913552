//! Reference table loading
//!
//! Reads the identifier/label table from a CSV file into ordered
//! [`ReferenceEntry`] rows. Only the first two columns matter; extra
//! columns are ignored. Row order is preserved because it defines the
//! index's tie-break order.

use crate::services::reference_index::ReferenceEntry;
use photosort_common::{Error, Result};
use std::path::Path;

/// Load reference rows from a CSV file
///
/// With `has_header` the first record is skipped. A record with fewer than
/// two fields aborts the load; an unreadable file or malformed CSV does
/// too. Normalization (trim, lowercase, duplicate handling) happens later
/// in `ReferenceIndex::build`.
pub fn load_csv(path: &Path, has_header: bool) -> Result<Vec<ReferenceEntry>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_header)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::ReferenceLoad(format!("cannot open {}: {}", path.display(), e)))?;

    let mut entries = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| Error::ReferenceLoad(format!("row {}: {}", row + 1, e)))?;
        if record.len() < 2 {
            return Err(Error::ReferenceLoad(format!(
                "row {}: expected at least two columns (identifier, label), got {}",
                row + 1,
                record.len()
            )));
        }
        entries.push(ReferenceEntry::new(&record[0], &record[1]));
    }

    tracing::info!(rows = entries.len(), path = %path.display(), "Reference table loaded");
    Ok(entries)
}
