//! Pluggable decoding of S3 Select payloads.
//!
//! A [`Reader`] decides which wire format to request, how to decode one
//! object's payload, how to merge per-object results and whether (and how)
//! results are persisted in the local cache.
//!
//! Available readers:
//! - [`RowReader`]: CSV rows as strings, no caching
//! - [`TableReader`]: typed tables, cached as JSON files
//! - [`JsonReader`]: newline-delimited JSON values, no caching

mod json;
mod rows;
mod table;

pub use json::JsonReader;
pub use rows::{Row, RowReader};
pub use table::{Table, TableReader};

use std::collections::HashSet;
use std::hash::Hash;
use std::path::Path;

use rusty_s3access_query::{ColumnSpec, OutputSerialization};

use crate::error::ReaderError;

/// Options applied while decoding and combining.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Drop duplicate rows.
    pub distinct: bool,
    /// Partition key/value pairs leading every row.
    ///
    /// On `read` these are the partitions of the decoded object. On
    /// `combine` only the keys matter: they name the leading columns of an
    /// empty result.
    pub partitions: Vec<(String, String)>,
}

impl ReadOptions {
    /// Set row de-duplication.
    pub fn with_distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    /// Set the partitions leading every row.
    pub fn with_partitions(mut self, partitions: &[(String, String)]) -> Self {
        self.partitions = partitions.to_vec();
        self
    }

    /// Partitions that become leading columns.
    ///
    /// Keys that are also selected columns, or that repeat an earlier key,
    /// are left out: the selected value wins.
    pub(crate) fn leading_partitions(&self, columns: &ColumnSpec) -> Vec<&(String, String)> {
        let mut seen: HashSet<&str> = columns.names().collect();
        self.partitions
            .iter()
            .filter(|(key, _)| seen.insert(key.as_str()))
            .collect()
    }
}

/// Decode, combine and cache strategy for select results.
pub trait Reader: Send + Sync {
    /// In-memory representation of a result.
    type Output: Send;

    /// Decode one object's payload.
    ///
    /// An empty payload decodes to an empty result.
    ///
    /// # Arguments
    /// * `payload` - Concatenated record chunks in the format of [`Reader::serialization`]
    /// * `columns` - Selected columns, in projection order
    /// * `options` - Read options
    fn read(
        &self,
        payload: &[u8],
        columns: &ColumnSpec,
        options: &ReadOptions,
    ) -> Result<Self::Output, ReaderError>;

    /// Merge any number of results into one. No order is guaranteed between
    /// the inputs.
    fn combine(
        &self,
        results: Vec<Self::Output>,
        columns: &ColumnSpec,
        options: &ReadOptions,
    ) -> Result<Self::Output, ReaderError>;

    /// Output serialization to request from S3 Select.
    fn serialization(&self) -> OutputSerialization;

    /// Whether results may be read from and written to the local cache.
    fn supports_caching(&self) -> bool {
        false
    }

    /// File extension of cache files.
    fn cache_extension(&self) -> &'static str {
        "cache"
    }

    /// Load a cached result.
    fn read_cache(&self, _path: &Path) -> Result<Self::Output, ReaderError> {
        Err(ReaderError::Unsupported("read_cache"))
    }

    /// Persist a result.
    fn write_cache(&self, _path: &Path, _value: &Self::Output) -> Result<(), ReaderError> {
        Err(ReaderError::Unsupported("write_cache"))
    }
}

/// Remove duplicates by key, keeping the first occurrence.
pub(crate) fn dedup_by_key<T, K, F>(items: &mut Vec<T>, mut key: F)
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let mut seen: HashSet<K> = HashSet::with_capacity(items.len());
    items.retain(|item| seen.insert(key(item)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first() {
        let mut items: Vec<(i32, &str)> = vec![(1, "a"), (2, "b"), (1, "c"), (3, "d"), (2, "e")];
        dedup_by_key(&mut items, |(k, _)| *k);
        assert_eq!(items, vec![(1, "a"), (2, "b"), (3, "d")]);
    }

    #[test]
    fn test_read_options() {
        assert!(!ReadOptions::default().distinct);
        assert!(ReadOptions::default().with_distinct(true).distinct);
    }

    #[test]
    fn test_leading_partitions_skip_selected_and_repeated_keys() {
        let partitions: Vec<(String, String)> = vec![
            ("country".to_string(), "USA".to_string()),
            ("qty".to_string(), "9".to_string()),
            ("country".to_string(), "FR".to_string()),
            ("year".to_string(), "2024".to_string()),
        ];
        let options: ReadOptions = ReadOptions::default().with_partitions(&partitions);
        let columns: ColumnSpec = ColumnSpec::new()
            .with_column("qty", rusty_s3access_query::ColumnType::Integer);
        let leading: Vec<(&str, &str)> = options
            .leading_partitions(&columns)
            .into_iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(leading, vec![("country", "USA"), ("year", "2024")]);
    }
}
