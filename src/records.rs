//! Tabular record batches
//!
//! A [`RecordBatch`] is the unit every operation works on. Row identity is
//! the row's position at ingestion time; names are never used as keys since
//! they repeat and may be missing. Empty CSV fields are read as missing
//! values.

use std::fmt;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{ResourceError, Result, ValidationError};

/// Selects an input column either by header name or by zero-based position
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnSelector {
    Name(String),
    Position(usize),
}

impl ColumnSelector {
    /// Digits-only arguments are positions, anything else is a header name
    pub fn parse(arg: &str) -> Self {
        let trimmed = arg.trim();
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(pos) = trimmed.parse() {
                return ColumnSelector::Position(pos);
            }
        }
        ColumnSelector::Name(arg.to_string())
    }

    pub fn is_position(&self) -> bool {
        matches!(self, ColumnSelector::Position(_))
    }
}

impl fmt::Display for ColumnSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnSelector::Name(name) => write!(f, "`{}`", name),
            ColumnSelector::Position(pos) => write!(f, "#{}", pos),
        }
    }
}

impl From<&str> for ColumnSelector {
    fn from(arg: &str) -> Self {
        ColumnSelector::parse(arg)
    }
}

/// Rows of optional string fields under a fixed header
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RecordBatch {
    /// Build a batch, checking that every row matches the header width
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Result<Self> {
        for (row, fields) in rows.iter().enumerate() {
            if fields.len() != columns.len() {
                return Err(ValidationError::RaggedRow {
                    row,
                    expected: columns.len(),
                    actual: fields.len(),
                }
                .into());
            }
        }
        Ok(Self { columns, rows })
    }

    /// Convenience constructor where empty strings become missing values
    pub fn from_str_rows(columns: &[&str], rows: &[&[&str]]) -> Result<Self> {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|v| non_empty(v)).collect())
            .collect();
        Self::new(columns, rows)
    }

    /// Read CSV data. Headerless input gets `col0`, `col1`, ... as column names.
    pub fn from_reader<R: Read>(reader: R, has_headers: bool) -> std::result::Result<Self, csv::Error> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(has_headers)
            .flexible(false)
            .from_reader(reader);

        let mut columns: Vec<String> = if has_headers {
            rdr.headers()?.iter().map(String::from).collect()
        } else {
            Vec::new()
        };

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            if columns.is_empty() && !has_headers {
                columns = (0..record.len()).map(|i| format!("col{}", i)).collect();
            }
            rows.push(record.iter().map(non_empty).collect());
        }

        Ok(Self { columns, rows })
    }

    /// Read a CSV file from disk
    pub fn from_path(path: &Path, has_headers: bool) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|source| ResourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let batch = Self::from_reader(file, has_headers).map_err(|source| ResourceError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(
            "read {} rows x {} columns from {}",
            batch.len(),
            batch.columns.len(),
            path.display()
        );
        Ok(batch)
    }

    /// Write the batch as CSV with a header row; missing values are empty fields
    pub fn write_csv<W: Write>(&self, writer: W) -> std::result::Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(|v| v.as_deref().unwrap_or("")))?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Fields of the row with the given identity
    pub fn row(&self, id: usize) -> Option<&[Option<String>]> {
        self.rows.get(id).map(|r| r.as_slice())
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Option<String>]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    /// Resolve a selector to a column index
    pub fn resolve(&self, selector: &ColumnSelector) -> std::result::Result<usize, ValidationError> {
        match selector {
            ColumnSelector::Name(name) => self.columns.iter().position(|c| c == name),
            ColumnSelector::Position(pos) => (*pos < self.columns.len()).then_some(*pos),
        }
        .ok_or_else(|| ValidationError::MissingColumn(selector.clone()))
    }

    /// Values of one column in row order
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(index).and_then(|v| v.as_deref()))
    }

    /// Value at (row, column)
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// Append columns; `values[row]` holds the new fields for that row
    pub(crate) fn append_columns(
        mut self,
        names: Vec<String>,
        values: Vec<Vec<Option<String>>>,
    ) -> Self {
        debug_assert_eq!(values.len(), self.rows.len());
        let width = names.len();
        self.columns.extend(names);
        for (row, extra) in self.rows.iter_mut().zip(values) {
            debug_assert_eq!(extra.len(), width);
            row.extend(extra);
        }
        self
    }
}

/// Open a CSV artifact, reporting a missing file as an I/O error
pub(crate) fn open_csv(path: &Path) -> std::result::Result<csv::Reader<std::fs::File>, ResourceError> {
    let file = std::fs::File::open(path).map_err(|source| ResourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::Reader::from_reader(file))
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
