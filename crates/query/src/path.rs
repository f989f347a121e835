//! Partitioned S3 object addresses.
//!
//! An [`S3Path`] is a `(bucket, key)` pair. Key segments of the form
//! `key=value` are partition segments (Hive-style layout) and are exposed as
//! an ordered partition mapping that filters can be checked against without
//! touching the object store.
//!
//! ```
//! use rusty_s3access_query::S3Path;
//!
//! let path = S3Path::parse("s3://sales/country=USA/year=2020/").unwrap();
//! assert_eq!(path.bucket(), "sales");
//! assert_eq!(path.key(), "country=USA/year=2020");
//! assert_eq!(path.partition("country"), Some("USA"));
//! assert_eq!(path.to_string(), "s3://sales/country=USA/year=2020");
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::QueryError;
use crate::glob;

/// `[scheme://]bucket[/key]`
fn address_regex() -> &'static Regex {
    static ADDRESS: OnceLock<Regex> = OnceLock::new();
    ADDRESS.get_or_init(|| {
        Regex::new(r"^(?:[A-Za-z][A-Za-z0-9+.\-]*://)?([^/\s]+)(?:/(.*))?$").expect("valid regex")
    })
}

/// Strip trailing `/` characters from a key.
fn normalize_key(key: &str) -> &str {
    key.trim_end_matches('/')
}

/// Extract `key=value` segments, in order of first occurrence.
///
/// A key that occurs twice keeps its first position and its last value.
fn extract_partitions(key: &str) -> Vec<(String, String)> {
    let mut partitions: Vec<(String, String)> = Vec::new();
    for segment in key.split('/') {
        let Some((name, value)) = segment.split_once('=') else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        match partitions.iter_mut().find(|(existing, _)| existing == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => partitions.push((name.to_string(), value.to_string())),
        }
    }
    partitions
}

/// Address of an S3 object, prefix or key pattern.
///
/// Equality and hashing use only the bucket and the normalized key; the
/// scheme the address was parsed from is not retained.
#[derive(Debug, Clone)]
pub struct S3Path {
    bucket: String,
    key: String,
    partitions: Vec<(String, String)>,
}

impl S3Path {
    /// Create a path from a bucket and key.
    ///
    /// Trailing `/` characters of the key are dropped.
    ///
    /// # Arguments
    /// * `bucket` - Bucket name
    /// * `key` - Object key, prefix or key pattern
    pub fn new(bucket: impl Into<String>, key: impl AsRef<str>) -> Self {
        let key: String = normalize_key(key.as_ref()).to_string();
        let partitions: Vec<(String, String)> = extract_partitions(&key);
        Self {
            bucket: bucket.into(),
            key,
            partitions,
        }
    }

    /// Parse an address of the form `[scheme://]bucket[/key]`.
    ///
    /// Any scheme (`s3`, `s3a`, `s3n`, ...) is accepted and ignored.
    ///
    /// # Arguments
    /// * `address` - Address string
    ///
    /// # Errors
    /// Returns `QueryError::MalformedAddress` if the bucket part is missing or
    /// contains whitespace.
    pub fn parse(address: &str) -> Result<Self, QueryError> {
        let captures = address_regex()
            .captures(address)
            .ok_or_else(|| QueryError::MalformedAddress {
                input: address.to_string(),
            })?;
        let bucket: &str = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        if bucket.is_empty() || bucket.contains(':') {
            return Err(QueryError::MalformedAddress {
                input: address.to_string(),
            });
        }
        let key: &str = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
        Ok(Self::new(bucket, key))
    }

    /// Bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Normalized key (no trailing `/`).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Partition mapping in key order.
    pub fn partitions(&self) -> &[(String, String)] {
        &self.partitions
    }

    /// Value of a partition key, if the key has such a segment.
    ///
    /// # Arguments
    /// * `name` - Partition key
    pub fn partition(&self, name: &str) -> Option<&str> {
        self.partitions
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Whether the key has a `name=...` segment.
    pub fn contains_partition(&self, name: &str) -> bool {
        self.partition(name).is_some()
    }

    /// Whether the key contains unescaped glob metacharacters.
    pub fn is_glob(&self) -> bool {
        glob::is_glob(&self.key)
    }

    /// Same bucket, different key.
    pub fn with_key(&self, key: impl AsRef<str>) -> Self {
        Self::new(self.bucket.clone(), key)
    }

    /// Same key, different bucket.
    pub fn with_bucket(&self, bucket: impl Into<String>) -> Self {
        Self::new(bucket, &self.key)
    }

    /// Set partition values.
    ///
    /// Segments whose key already occurs are rewritten in place; keys that do
    /// not occur yet are appended as new segments in the given order.
    ///
    /// # Arguments
    /// * `values` - `(key, value)` pairs to set
    ///
    /// # Returns
    /// A new path; `self` is unchanged.
    pub fn with_partitions<K, V>(&self, values: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut segments: Vec<String> = if self.key.is_empty() {
            Vec::new()
        } else {
            self.key.split('/').map(str::to_string).collect()
        };

        for (name, value) in values {
            let name: &str = name.as_ref();
            let rendered: String = format!("{}={}", name, value.as_ref());
            let mut replaced: bool = false;
            for segment in segments.iter_mut() {
                if segment.split_once('=').map(|(k, _)| k) == Some(name) {
                    *segment = rendered.clone();
                    replaced = true;
                }
            }
            if !replaced {
                segments.push(rendered);
            }
        }

        self.with_key(segments.join("/"))
    }

    /// Append a key segment, like joining filesystem paths.
    ///
    /// # Arguments
    /// * `segment` - Relative key to append; surrounding `/` are ignored
    pub fn join(&self, segment: &str) -> Self {
        let segment: &str = segment.trim_matches('/');
        if self.key.is_empty() {
            self.with_key(segment)
        } else if segment.is_empty() {
            self.clone()
        } else {
            self.with_key(format!("{}/{}", self.key, segment))
        }
    }

    /// Key rendered as a directory prefix for delimiter listings.
    ///
    /// The bucket root lists with an empty prefix.
    pub fn directory_prefix(&self) -> String {
        if self.key.is_empty() {
            String::new()
        } else {
            format!("{}/", self.key)
        }
    }

    /// Render the address with an explicit scheme, e.g. `s3a`.
    ///
    /// # Arguments
    /// * `scheme` - URL scheme without `://`
    pub fn to_url(&self, scheme: &str) -> String {
        if self.key.is_empty() {
            format!("{}://{}", scheme, self.bucket)
        } else {
            format!("{}://{}/{}", scheme, self.bucket, self.key)
        }
    }
}

impl PartialEq for S3Path {
    fn eq(&self, other: &Self) -> bool {
        self.bucket == other.bucket && self.key == other.key
    }
}

impl Eq for S3Path {}

impl Hash for S3Path {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bucket.hash(state);
        self.key.hash(state);
    }
}

impl fmt::Display for S3Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_url("s3"))
    }
}

impl FromStr for S3Path {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
