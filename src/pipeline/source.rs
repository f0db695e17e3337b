use std::io::Read;
use std::path::Path;
use tracing::{error, info};

use crate::error::{Result, StudyError};

/// The untyped source table: header names plus raw text cells.
/// Empty cells are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Iterates the cells of one column, in row order.
    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = Option<&'a str>> + 'a> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(move |row| row.get(idx).and_then(|c| c.as_deref())),
        )
    }
}

/// Reads the delimited source file at `path`.
///
/// Fails with `MissingInput` before any read is attempted if the file does
/// not exist.
pub fn read_raw_table(path: &Path) -> Result<RawTable> {
    if !path.exists() {
        error!("Dataset missing at {}", path.display());
        return Err(StudyError::MissingInput(path.to_path_buf()));
    }
    let file = std::fs::File::open(path)?;
    let table = read_raw_from(file)?;
    info!(
        "Loaded {} rows x {} columns from {}",
        table.row_count(),
        table.headers.len(),
        path.display()
    );
    Ok(table)
}

pub fn read_raw_from<R: Read>(reader: R) -> Result<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
    let width = headers.len();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let mut row: Vec<Option<String>> = record
            .iter()
            .take(width)
            .map(|cell| {
                if cell.is_empty() {
                    None
                } else {
                    Some(cell.to_string())
                }
            })
            .collect();
        // Short rows are padded with nulls
        row.resize(width, None);
        rows.push(row);
    }

    Ok(RawTable { headers, rows })
}
