//! Row-iterator reader: CSV records as strings.

use rusty_s3access_query::{ColumnSpec, CsvOutput, OutputSerialization};

use super::{dedup_by_key, ReadOptions, Reader};
use crate::error::ReaderError;

/// One CSV record.
pub type Row = Vec<String>;

/// Decodes CSV output into untyped rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowReader;

impl RowReader {
    pub fn new() -> Self {
        Self
    }
}

/// Parse headerless CSV into string records.
pub(crate) fn parse_csv(payload: &[u8]) -> Result<Vec<Row>, ReaderError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(payload);
    let mut rows: Vec<Row> = Vec::new();
    for record in reader.records() {
        let record: csv::StringRecord = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

impl Reader for RowReader {
    type Output = Vec<Row>;

    fn read(
        &self,
        payload: &[u8],
        columns: &ColumnSpec,
        options: &ReadOptions,
    ) -> Result<Self::Output, ReaderError> {
        let mut rows: Vec<Row> = parse_csv(payload)?;
        let leading: Vec<&(String, String)> = options.leading_partitions(columns);
        if !leading.is_empty() {
            for row in rows.iter_mut() {
                row.splice(0..0, leading.iter().map(|(_, value)| value.clone()));
            }
        }
        if options.distinct {
            dedup_by_key(&mut rows, |row| row.clone());
        }
        Ok(rows)
    }

    fn combine(
        &self,
        results: Vec<Self::Output>,
        _columns: &ColumnSpec,
        options: &ReadOptions,
    ) -> Result<Self::Output, ReaderError> {
        let mut rows: Vec<Row> = results.into_iter().flatten().collect();
        if options.distinct {
            dedup_by_key(&mut rows, |row| row.clone());
        }
        Ok(rows)
    }

    fn serialization(&self) -> OutputSerialization {
        OutputSerialization::Csv(CsvOutput::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> Row {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_read_quoted_fields() {
        let payload: &[u8] = b"\"a\",\"1\"\n\"b, c\",\"x\"\"y\"\n";
        let rows: Vec<Row> = RowReader
            .read(payload, &ColumnSpec::new(), &ReadOptions::default())
            .unwrap();
        assert_eq!(rows, vec![row(&["a", "1"]), row(&["b, c", "x\"y"])]);
    }

    #[test]
    fn test_partition_values_lead_each_row() {
        let partitions: Vec<(String, String)> = vec![("country".to_string(), "FR".to_string())];
        let rows: Vec<Row> = RowReader
            .read(
                b"\"a\",\"1\"\n\"b\",\"2\"\n",
                &ColumnSpec::new(),
                &ReadOptions::default().with_partitions(&partitions),
            )
            .unwrap();
        assert_eq!(rows, vec![row(&["FR", "a", "1"]), row(&["FR", "b", "2"])]);
    }

    #[test]
    fn test_empty_payload() {
        let rows: Vec<Row> = RowReader
            .read(b"", &ColumnSpec::new(), &ReadOptions::default())
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_combine_and_distinct() {
        let options: ReadOptions = ReadOptions::default().with_distinct(true);
        let combined: Vec<Row> = RowReader
            .combine(
                vec![vec![row(&["a"]), row(&["b"])], vec![row(&["a"]), row(&["c"])]],
                &ColumnSpec::new(),
                &options,
            )
            .unwrap();
        assert_eq!(combined, vec![row(&["a"]), row(&["b"]), row(&["c"])]);

        let nothing: Vec<Row> = RowReader
            .combine(vec![], &ColumnSpec::new(), &ReadOptions::default())
            .unwrap();
        assert!(nothing.is_empty());
    }

    #[test]
    fn test_no_caching() {
        assert!(!RowReader.supports_caching());
        assert!(matches!(
            RowReader.read_cache(std::path::Path::new("/nonexistent")),
            Err(ReaderError::Unsupported(_))
        ));
    }
}
