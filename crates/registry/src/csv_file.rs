use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pipeline::{RegistryEntry, RegistryError, RegistrySource};
use tracing::debug;

use crate::rows_to_entries;

/// Registry backed by a CSV file with a header row.
pub struct CsvRegistry {
    path: PathBuf,
}

impl CsvRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RegistrySource for CsvRegistry {
    async fn load(&self) -> Result<Vec<RegistryEntry>, RegistryError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| RegistryError::Io(format!("{}: {e}", self.path.display())))?;
        let entries = parse_csv(&bytes)?;
        debug!(path = %self.path.display(), entries = entries.len(), "Loaded registry file");
        Ok(entries)
    }
}

/// Parses CSV text. Rows may be ragged; blank rows are skipped.
pub fn parse_csv(data: &[u8]) -> Result<Vec<RegistryEntry>, RegistryError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| RegistryError::Parse(e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| RegistryError::Parse(e.to_string()))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows_to_entries(&header, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
Company,Person,Ranking,Last contacted,Notes,Type,Status
Acme Games, Ann Lee ,1,2024-03-01,\"Publishes co-op titles, mostly PC\",Publisher,Active
Zephyr Capital,Dan,2
,,,,,,
";

    #[test]
    fn test_header_row_names_fields() {
        let entries = parse_csv(SAMPLE.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);

        let acme = &entries[0];
        assert_eq!(acme.field(RegistryEntry::COMPANY), Some("Acme Games"));
        assert_eq!(acme.field(RegistryEntry::PERSON), Some("Ann Lee"));
        assert_eq!(acme.field(RegistryEntry::LAST_CONTACTED), Some("2024-03-01"));
        assert_eq!(
            acme.field(RegistryEntry::NOTES),
            Some("Publishes co-op titles, mostly PC")
        );
    }

    #[test]
    fn test_short_rows_leave_fields_absent() {
        let entries = parse_csv(SAMPLE.as_bytes()).unwrap();
        let zephyr = &entries[1];
        assert_eq!(zephyr.field(RegistryEntry::RANKING), Some("2"));
        assert_eq!(zephyr.field(RegistryEntry::NOTES), None);
        assert_eq!(zephyr.field(RegistryEntry::STATUS), None);
    }

    #[tokio::test]
    async fn test_load_reads_file_each_time() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let registry = CsvRegistry::new(file.path());

        assert_eq!(registry.load().await.unwrap().len(), 2);

        writeln!(file, "Northwind,Rune,3").unwrap();
        assert_eq!(registry.load().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = CsvRegistry::new(dir.path().join("absent.csv"));
        assert!(matches!(registry.load().await, Err(RegistryError::Io(_))));
    }
}
