// 🏗️ Tabular Parser
// Raw delimited text → rows of cells → header-keyed records

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use indexmap::IndexMap;
use std::path::Path;
use tracing::{debug, warn};

// ============================================================================
// CORE TYPES
// ============================================================================

/// RawRecord - one imported row, keyed by header text, in column order
///
/// Insertion order matters: the export serializer replays these columns
/// in the order the spreadsheet had them.
pub type RawRecord = IndexMap<String, String>;

const UTF8_BOM: char = '\u{feff}';

// ============================================================================
// TABULAR PARSER
// ============================================================================

/// TabularParser - permissive delimited-text reader
///
/// Never rejects a row for structural reasons:
/// - quoted fields may contain the delimiter, line breaks and doubled quotes
/// - CRLF and LF both end a row
/// - an unterminated quote swallows the rest of the input as cell content
/// - a quote only opens a quoted cell at the start of a cell; inside an
///   unquoted cell it is a literal character and does not hide delimiters
/// - a final row without a line break is still emitted
#[derive(Debug, Clone)]
pub struct TabularParser {
    delimiter: u8,
}

impl TabularParser {
    pub fn new() -> Self {
        TabularParser { delimiter: b',' }
    }

    /// Builder pattern: use a different delimiter (e.g. `;` exports)
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Split text into rows of cells
    pub fn parse_rows(&self, text: &str) -> Vec<Vec<String>> {
        let text = text.strip_prefix(UTF8_BOM).unwrap_or(text);

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(text.as_bytes());

        let mut rows = Vec::new();
        for result in reader.byte_records() {
            match result {
                Ok(record) => {
                    let row = record
                        .iter()
                        .map(|cell| String::from_utf8_lossy(cell).into_owned())
                        .collect();
                    rows.push(row);
                }
                Err(e) => {
                    // Reading from memory: only reachable on a reader bug
                    warn!(error = %e, rows = rows.len(), "stopping tabular parse early");
                    break;
                }
            }
        }

        debug!(rows = rows.len(), "parsed tabular text");
        rows
    }

    /// Parse text straight into header-keyed records
    pub fn parse_records(&self, text: &str) -> Vec<RawRecord> {
        rows_to_records(self.parse_rows(text))
    }
}

impl Default for TabularParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse comma-separated text into rows of cells
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    TabularParser::new().parse_rows(text)
}

/// Turn rows into records keyed by the (trimmed) header row
///
/// - the header row is never dropped
/// - data rows whose cells are all blank are dropped
/// - missing trailing cells become "", cells beyond the header are ignored
/// - a repeated header keeps its first column
pub fn rows_to_records(rows: Vec<Vec<String>>) -> Vec<RawRecord> {
    let mut rows = rows.into_iter();

    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(|h| h.trim().to_string()).collect(),
        None => return Vec::new(),
    };

    let mut records = Vec::new();
    let mut skipped_blank = 0usize;

    for row in rows {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            skipped_blank += 1;
            continue;
        }

        let mut record = RawRecord::with_capacity(headers.len());
        for (idx, header) in headers.iter().enumerate() {
            if record.contains_key(header) {
                continue;
            }
            let value = row.get(idx).cloned().unwrap_or_default();
            record.insert(header.clone(), value);
        }
        records.push(record);
    }

    debug!(
        records = records.len(),
        columns = headers.len(),
        skipped_blank,
        "converted rows to records"
    );
    records
}

// ============================================================================
// FILE LOADING
// ============================================================================

/// Read an import file into memory (the only I/O on the import path)
pub fn load_file(file_path: &Path) -> Result<String> {
    let bytes = std::fs::read(file_path)
        .with_context(|| format!("Failed to open file: {}", file_path.display()))?;

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ============================================================================
// TESTS
// ============================================================================
