//! Partition-aware S3 Select fan-out.
//!
//! This crate runs S3 Select queries against one object or against every
//! object matching a key pattern, and merges the results. It is transport
//! agnostic: clients implement [`SelectClient`] (async) or
//! [`BlockingSelectClient`] (blocking); the AWS SDK backend lives in
//! `rusty-s3access-storage-crt`.
//!
//! # Schedulers
//!
//! - [`S3Access`] - cooperative; queries run as futures on the caller's task
//! - [`BlockingS3Access`] - a pool of scoped worker threads
//!
//! Both bound the number of queries in flight by
//! [`AccessSettings::parallelism`], prune candidates whose partition values
//! contradict the filter before querying them, and abort on the first failure.
//!
//! # Readers
//!
//! A [`Reader`] chooses the output format, decodes payloads and merges
//! per-object results. See [`RowReader`], [`TableReader`] and [`JsonReader`].
//! Rows of a select lead with the partition values of the object they came
//! from.
//!
//! # Caching
//!
//! With a cache directory configured (`S3ACCESSCACHE`), readers that support
//! it keep decoded results on disk, per object and per key pattern. See
//! [`CacheLayer`].

mod access;
mod blocking;
pub mod cache;
pub mod decoder;
mod error;
pub mod listing;
mod pipeline;
pub mod reader;
mod traits;
mod types;

pub use access::S3Access;
pub use blocking::BlockingS3Access;
pub use cache::{CacheLayer, CacheLookup};
pub use decoder::{decode_event_stream, decode_events};
pub use error::{CacheError, ReaderError, SelectError, StorageError};
pub use listing::{GlobIter, PathStream, PrefixIter};
pub use pipeline::SelectOptions;
pub use reader::{JsonReader, ReadOptions, Reader, Row, RowReader, Table, TableReader};
pub use traits::{BlockingSelectClient, ClientFactory, EventIter, EventStream, SelectClient};
pub use types::{
    AccessSettings, AwsCredentials, ListPage, ListResult, ProgressDetails, SelectEvent,
    SelectProgress,
};
