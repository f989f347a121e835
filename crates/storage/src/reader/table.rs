//! Typed-table reader with JSON cache files.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use rusty_s3access_query::{ColumnSpec, ColumnType, CsvOutput, OutputSerialization, Value, ValueKey};
use serde::{Deserialize, Serialize};

use super::rows::parse_csv;
use super::{dedup_by_key, ReadOptions, Reader};
use crate::error::ReaderError;

/// A typed result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Column names and types.
    pub columns: ColumnSpec,
    /// Rows; each row has one value per column.
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// A table with the given columns and no rows.
    pub fn empty(columns: ColumnSpec) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column, if it exists.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx: usize = self.columns.names().position(|n| n == name)?;
        Some(self.rows.iter().filter_map(|row| row.get(idx)).collect())
    }

    fn dedup(&mut self) {
        dedup_by_key(&mut self.rows, |row| {
            row.iter().map(Value::key).collect::<Vec<ValueKey>>()
        });
    }
}

/// Columns of a result: leading partition keys as strings, then the
/// selected columns.
fn result_columns(leading: &[&(String, String)], columns: &ColumnSpec) -> ColumnSpec {
    let mut spec: ColumnSpec = ColumnSpec::new();
    for (key, _) in leading {
        spec = spec.with_column(key.as_str(), ColumnType::String);
    }
    for (name, column_type) in columns.iter() {
        spec = spec.with_column(name, column_type);
    }
    spec
}

/// Decodes CSV output into a [`Table`], converting fields to the declared
/// column types.
///
/// In lenient mode (the default) fields that do not parse become `Null`; in
/// strict mode they fail the read.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableReader {
    strict: bool,
}

impl TableReader {
    /// Lenient reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reader that rejects fields not matching their column type.
    pub fn strict() -> Self {
        Self { strict: true }
    }

    fn convert(&self, fields: Vec<String>, columns: &ColumnSpec) -> Result<Vec<Value>, ReaderError> {
        if columns.is_empty() {
            return Ok(fields.into_iter().map(Value::Str).collect());
        }
        if self.strict && fields.len() != columns.len() {
            return Err(ReaderError::Decode(format!(
                "expected {} fields, got {}",
                columns.len(),
                fields.len()
            )));
        }

        let mut values: Vec<Value> = Vec::with_capacity(columns.len());
        for (idx, (name, column_type)) in columns.iter().enumerate() {
            let raw: &str = fields.get(idx).map(String::as_str).unwrap_or_default();
            let value: Value = match column_type.parse(raw) {
                Ok(value) => value,
                Err(reason) if self.strict => {
                    return Err(ReaderError::Decode(format!("column {}: {}", name, reason)));
                }
                Err(_) => Value::Null,
            };
            values.push(value);
        }
        Ok(values)
    }
}

impl Reader for TableReader {
    type Output = Table;

    fn read(
        &self,
        payload: &[u8],
        columns: &ColumnSpec,
        options: &ReadOptions,
    ) -> Result<Self::Output, ReaderError> {
        let leading: Vec<&(String, String)> = options.leading_partitions(columns);
        let mut table: Table = Table::empty(result_columns(&leading, columns));
        for fields in parse_csv(payload)? {
            let mut row: Vec<Value> = leading
                .iter()
                .map(|(_, value)| Value::Str(value.clone()))
                .collect();
            row.extend(self.convert(fields, columns)?);
            table.rows.push(row);
        }
        if options.distinct {
            table.dedup();
        }
        Ok(table)
    }

    fn combine(
        &self,
        results: Vec<Self::Output>,
        columns: &ColumnSpec,
        options: &ReadOptions,
    ) -> Result<Self::Output, ReaderError> {
        let mut results = results.into_iter();
        let mut combined: Table = match results.next() {
            Some(first) => first,
            None => {
                let leading: Vec<&(String, String)> = options.leading_partitions(columns);
                return Ok(Table::empty(result_columns(&leading, columns)));
            }
        };
        for table in results {
            combined.rows.extend(table.rows);
        }
        if options.distinct {
            combined.dedup();
        }
        Ok(combined)
    }

    fn serialization(&self) -> OutputSerialization {
        OutputSerialization::Csv(CsvOutput::default())
    }

    fn supports_caching(&self) -> bool {
        true
    }

    fn cache_extension(&self) -> &'static str {
        "json"
    }

    fn read_cache(&self, path: &Path) -> Result<Self::Output, ReaderError> {
        let file: File = File::open(path)?;
        let table: Table = serde_json::from_reader(BufReader::new(file))?;
        Ok(table)
    }

    fn write_cache(&self, path: &Path, value: &Self::Output) -> Result<(), ReaderError> {
        let file: File = File::create(path)?;
        let mut writer: BufWriter<File> = BufWriter::new(file);
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
        Ok(())
    }
}
