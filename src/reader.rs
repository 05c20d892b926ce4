use crate::app::ports::IdentifierReaderPort;
use crate::error::Result;
use std::path::Path;

/// Reads card numbers from the first column of a CSV document, one per row.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvIdentifierReader;

impl IdentifierReaderPort for CsvIdentifierReader {
    fn read_identifiers(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let mut identifiers = Vec::new();
        for row in reader.records() {
            let row = row?;
            if let Some(first) = row.get(0).map(|c| c.trim_start_matches('\u{feff}')) {
                if !first.is_empty() {
                    identifiers.push(first.to_string());
                }
            }
        }
        Ok(identifiers)
    }
}

impl CsvIdentifierReader {
    pub fn read_path(&self, path: impl AsRef<Path>) -> Result<Vec<String>> {
        let bytes = std::fs::read(path)?;
        self.read_identifiers(&bytes)
    }
}
