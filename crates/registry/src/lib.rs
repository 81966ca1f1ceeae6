//! Digest contact registry loaders.
//!
//! Two implementations of [`pipeline::RegistrySource`]:
//!
//! - [`CsvRegistry`] reads a local delimited file whose header row names
//!   the fields.
//! - [`SheetsRegistry`] reads a cell range through the Google Sheets values
//!   API; the first row of the range is the header.
//!
//! Both re-read their source on every [`load`](pipeline::RegistrySource::load),
//! so edits to the registry are picked up by the next lookup without a
//! restart.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** File I/O, CSV parsing and HTTP live here. The
//! [`pipeline`] crate sees only [`pipeline::RegistryEntry`].

mod csv_file;
mod sheets;

pub use csv_file::{parse_csv, CsvRegistry};
pub use sheets::{SheetsRegistry, SheetsRegistryError, DEFAULT_SHEETS_BASE};

use pipeline::RegistryEntry;

/// Turns a header row plus data rows into entries. Short rows are padded
/// with empty cells; cells beyond the header are dropped.
pub(crate) fn rows_to_entries(header: &[String], rows: Vec<Vec<String>>) -> Vec<RegistryEntry> {
    rows.into_iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .map(|row| {
            let mut cells = row.into_iter();
            RegistryEntry::from_fields(
                header
                    .iter()
                    .map(|key| (key.clone(), cells.next().unwrap_or_default())),
            )
        })
        .collect()
}
