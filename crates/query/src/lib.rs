//! Query model for partition-aware S3 Select.
//!
//! This crate is pure: it does no I/O. It provides:
//! - [`S3Path`]: partitioned object addresses (`s3://bucket/year=2020/...`)
//! - [`Condition`] and [`Filter`]: predicates that prune partitions locally and
//!   compile into pushed-down SQL
//! - [`QueryPlan`]: the S3 Select expression for one address
//! - [`glob`]: key pattern matching and listing prefixes
//! - [`serialization`]: request parameters for the select call

pub mod condition;
pub mod error;
pub mod filter;
pub mod glob;
pub mod path;
pub mod plan;
pub mod serialization;
pub mod value;

pub use condition::{make_condition, Condition, Conditionable};
pub use error::QueryError;
pub use filter::{Filter, FilterNode, Operator, Residual, SimpleFilter};
pub use glob::{escape_glob, glob_prefix, is_glob, GlobPattern};
pub use path::S3Path;
pub use plan::{simple_selection, ColumnSpec, QueryPlan};
pub use serialization::{
    CompressionType, CsvInput, CsvOutput, ExpressionType, FileHeaderInfo, InputFormat,
    InputSerialization, JsonInput, JsonOutput, JsonType, OutputSerialization, QuoteFields,
    ScanRange, SelectRequest,
};
pub use value::{quote, ColumnType, Value, ValueKey};
