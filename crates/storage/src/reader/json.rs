//! Raw structured-value reader: newline-delimited JSON.

use rusty_s3access_query::{ColumnSpec, JsonOutput, OutputSerialization};

use super::{dedup_by_key, ReadOptions, Reader};
use crate::error::ReaderError;

/// Decodes JSON Lines output into `serde_json::Value`s, one per record.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReader;

impl JsonReader {
    pub fn new() -> Self {
        Self
    }
}

fn dedup_values(values: &mut Vec<serde_json::Value>) {
    dedup_by_key(values, |value| value.to_string());
}

impl Reader for JsonReader {
    type Output = Vec<serde_json::Value>;

    fn read(
        &self,
        payload: &[u8],
        columns: &ColumnSpec,
        options: &ReadOptions,
    ) -> Result<Self::Output, ReaderError> {
        let leading: Vec<&(String, String)> = options.leading_partitions(columns);
        let mut values: Vec<serde_json::Value> = Vec::new();
        for value in serde_json::Deserializer::from_slice(payload).into_iter::<serde_json::Value>() {
            let mut value: serde_json::Value = value?;
            if let serde_json::Value::Object(record) = &mut value {
                // A field of the record itself wins over a partition of the key.
                for (key, partition) in &leading {
                    record
                        .entry(key.as_str())
                        .or_insert_with(|| serde_json::Value::String(partition.clone()));
                }
            }
            values.push(value);
        }
        if options.distinct {
            dedup_values(&mut values);
        }
        Ok(values)
    }

    fn combine(
        &self,
        results: Vec<Self::Output>,
        _columns: &ColumnSpec,
        options: &ReadOptions,
    ) -> Result<Self::Output, ReaderError> {
        let mut values: Vec<serde_json::Value> = results.into_iter().flatten().collect();
        if options.distinct {
            dedup_values(&mut values);
        }
        Ok(values)
    }

    fn serialization(&self) -> OutputSerialization {
        OutputSerialization::Json(JsonOutput::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_json_lines() {
        let payload: &[u8] = b"{\"a\":1,\"b\":\"x\"}\n{\"a\":2,\"b\":null}\n";
        let values: Vec<serde_json::Value> = JsonReader
            .read(payload, &ColumnSpec::new(), &ReadOptions::default())
            .unwrap();
        assert_eq!(values, vec![json!({"a": 1, "b": "x"}), json!({"a": 2, "b": null})]);
    }

    #[test]
    fn test_partition_keys_added_to_records() {
        let partitions: Vec<(String, String)> = vec![
            ("country".to_string(), "NZ".to_string()),
            ("a".to_string(), "shadowed".to_string()),
        ];
        let values: Vec<serde_json::Value> = JsonReader
            .read(
                b"{\"a\":1}\n",
                &ColumnSpec::new(),
                &ReadOptions::default().with_partitions(&partitions),
            )
            .unwrap();
        assert_eq!(values, vec![json!({"country": "NZ", "a": 1})]);
    }

    #[test]
    fn test_empty_and_whitespace_payload() {
        for payload in [&b""[..], &b"\n\n"[..]] {
            let values: Vec<serde_json::Value> = JsonReader
                .read(payload, &ColumnSpec::new(), &ReadOptions::default())
                .unwrap();
            assert!(values.is_empty());
        }
    }

    #[test]
    fn test_truncated_record_is_error() {
        let result: Result<Vec<serde_json::Value>, ReaderError> = JsonReader.read(
            b"{\"a\":1}\n{\"a\":",
            &ColumnSpec::new(),
            &ReadOptions::default(),
        );
        assert!(matches!(result, Err(ReaderError::Decode(_))));
    }

    #[test]
    fn test_distinct_combine() {
        let combined: Vec<serde_json::Value> = JsonReader
            .combine(
                vec![vec![json!({"a": 1})], vec![json!({"a": 1}), json!({"a": 2})]],
                &ColumnSpec::new(),
                &ReadOptions::default().with_distinct(true),
            )
            .unwrap();
        assert_eq!(combined, vec![json!({"a": 1}), json!({"a": 2})]);
    }

    #[test]
    fn test_requests_json_output() {
        assert!(matches!(JsonReader.serialization(), OutputSerialization::Json(_)));
        assert!(!JsonReader.supports_caching());
    }
}
