//! Tab-separated table reader.
//!
//! Every field is kept as text; the header row names the columns, verbatim and
//! case-preserving. Typing happens later, field by field, so a bad value only
//! affects the row that carries it.
//!
//! # Design notes
//! - Quoting is disabled: EDGAR tables are plain TSV and labels may contain
//!   stray `"` characters.
//! - Rows are flexible. A short row simply has no value for its trailing columns.
//! - Invalid UTF-8 is replaced rather than rejected.
//! - A readable table with zero data rows is an empty [`Table`], not an error,
//!   so callers can tell "no rows" apart from "unreadable".

use crate::error::PipelineError;
use crate::io::cloud::StorageClient;
use anyhow::{Context, Result};
use csv::{ByteRecord, ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::io::Read;

const UTF8_BOM: &str = "\u{feff}";

/// An in-memory, row-oriented table of text fields.
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<StringRecord>,
}

impl Table {
    fn new(headers: Vec<String>, rows: Vec<StringRecord>) -> Self {
        let mut index = HashMap::with_capacity(headers.len());
        for (i, name) in headers.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Self {
            headers,
            index,
            rows,
        }
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Number of data rows (header excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn row(&self, i: usize) -> Option<Row<'_>> {
        self.rows.get(i).map(|record| Row {
            table: self,
            record,
        })
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = Row<'_>> {
        self.rows.iter().map(move |record| Row {
            table: self,
            record,
        })
    }
}

/// A borrowed view of one data row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    record: &'a StringRecord,
}

impl<'a> Row<'a> {
    /// The raw field under `column`, or `None` when the column does not exist
    /// or this row is too short to reach it.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let i = *self.table.index.get(column)?;
        self.record.get(i)
    }

    /// Like [`Row::get`] but trimmed, with blank fields reported as `None`.
    #[must_use]
    pub fn non_blank(&self, column: &str) -> Option<&'a str> {
        self.get(column).map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Read tab-separated text into a [`Table`].
///
/// # Errors
/// Returns an error if the underlying reader fails.
pub fn read_tsv<R: Read>(reader: R) -> Result<Table> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .byte_headers()
        .context("read TSV header")?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let name = String::from_utf8_lossy(h);
            let mut name: &str = &name;
            if i == 0 {
                name = name.trim_start_matches(UTF8_BOM);
            }
            name.trim_end_matches('\r').to_string()
        })
        .collect();

    let mut rows = Vec::new();
    let mut raw = ByteRecord::new();
    let mut line = 1usize;
    while rdr
        .read_byte_record(&mut raw)
        .with_context(|| format!("read TSV record after line {line}"))?
    {
        line += 1;
        rows.push(StringRecord::from_byte_record_lossy(raw.clone()));
    }

    Ok(Table::new(headers, rows))
}

/// Read an in-memory TSV payload.
///
/// # Errors
/// Returns an error if the payload cannot be parsed.
pub fn read_tsv_bytes(bytes: &[u8]) -> Result<Table> {
    read_tsv(bytes)
}

/// Fetch `key` from storage and parse it as a table.
///
/// # Errors
/// Returns [`PipelineError::SourceUnavailable`] if the object cannot be fetched
/// or parsed. An empty table is returned as `Ok`.
pub fn read_table(storage: &StorageClient, key: &str) -> Result<Table, PipelineError> {
    let bytes = storage
        .get(key)
        .map_err(|e| PipelineError::source_unavailable(key, &e))?;
    let table = read_tsv_bytes(&bytes).map_err(|e| PipelineError::SourceUnavailable {
        key: key.to_string(),
        reason: format!("{e:#}"),
    })?;
    log::debug!(
        "loaded {key}: {} rows, {} columns",
        table.len(),
        table.headers().len()
    );
    Ok(table)
}
