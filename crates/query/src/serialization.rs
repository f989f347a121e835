//! S3 Select request parameters: input and output serialization, scan range
//! and progress reporting.
//!
//! These are plain descriptors; transport implementations translate them
//! into their own request types.

use serde::{Deserialize, Serialize};

/// Expression language of the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExpressionType {
    #[default]
    Sql,
}

impl ExpressionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpressionType::Sql => "SQL",
        }
    }
}

/// Compression of the stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompressionType {
    #[default]
    None,
    Gzip,
    Bzip2,
}

impl CompressionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionType::None => "NONE",
            CompressionType::Gzip => "GZIP",
            CompressionType::Bzip2 => "BZIP2",
        }
    }
}

/// How the first line of a CSV object is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FileHeaderInfo {
    #[default]
    None,
    Ignore,
    Use,
}

/// Parameters for CSV objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvInput {
    /// Allow record delimiters inside quoted fields. May be slower.
    pub allow_quoted_record_delimiter: bool,
    pub comments: Option<char>,
    pub field_delimiter: char,
    pub file_header_info: FileHeaderInfo,
    pub quote_character: char,
    pub quote_escape_character: char,
    pub record_delimiter: Option<char>,
}

impl Default for CsvInput {
    fn default() -> Self {
        Self {
            allow_quoted_record_delimiter: false,
            comments: None,
            field_delimiter: ',',
            file_header_info: FileHeaderInfo::None,
            quote_character: '"',
            quote_escape_character: '"',
            record_delimiter: None,
        }
    }
}

/// Layout of JSON objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JsonType {
    Document,
    Lines,
}

/// Parameters for JSON objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JsonInput {
    pub json_type: Option<JsonType>,
}

/// Format of the queried object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputFormat {
    #[default]
    Parquet,
    Csv(CsvInput),
    Json(JsonInput),
}

/// Input serialization of a select request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputSerialization {
    pub format: InputFormat,
    pub compression: CompressionType,
}

impl InputSerialization {
    /// Parquet objects, uncompressed.
    pub fn parquet() -> Self {
        Self::default()
    }

    /// Set the object format.
    pub fn with_format(mut self, format: InputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the object compression.
    pub fn with_compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }
}

/// When output fields are quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QuoteFields {
    #[default]
    Always,
    AsNeeded,
}

/// Parameters for CSV results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvOutput {
    pub quote_fields: QuoteFields,
    pub record_delimiter: char,
    pub field_delimiter: char,
    pub quote_character: char,
    pub quote_escape_character: char,
}

impl Default for CsvOutput {
    fn default() -> Self {
        Self {
            quote_fields: QuoteFields::Always,
            record_delimiter: '\n',
            field_delimiter: ',',
            quote_character: '"',
            quote_escape_character: '"',
        }
    }
}

/// Parameters for JSON results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonOutput {
    pub record_delimiter: char,
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self {
            record_delimiter: '\n',
        }
    }
}

/// Output serialization of a select request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputSerialization {
    Csv(CsvOutput),
    Json(JsonOutput),
}

impl Default for OutputSerialization {
    fn default() -> Self {
        OutputSerialization::Csv(CsvOutput::default())
    }
}

/// Byte range of the object to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanRange {
    pub start: u64,
    /// Inclusive end; `None` scans to the end of the object.
    pub end: Option<u64>,
}

impl ScanRange {
    /// Whether the range covers the whole object.
    pub fn is_full(&self) -> bool {
        self.start == 0 && self.end.is_none()
    }
}

/// Everything needed to issue one S3 Select call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectRequest {
    pub bucket: String,
    pub key: String,
    pub expression: String,
    pub expression_type: ExpressionType,
    pub input: InputSerialization,
    pub output: OutputSerialization,
    pub scan_range: ScanRange,
    /// Ask the service to interleave progress events.
    pub request_progress: bool,
}

impl SelectRequest {
    /// Create a request with Parquet input, CSV output and no progress events.
    ///
    /// # Arguments
    /// * `bucket` - Bucket of the object
    /// * `key` - Key of the object
    /// * `expression` - SQL expression
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            expression: expression.into(),
            expression_type: ExpressionType::Sql,
            input: InputSerialization::default(),
            output: OutputSerialization::default(),
            scan_range: ScanRange::default(),
            request_progress: false,
        }
    }

    pub fn with_input(mut self, input: InputSerialization) -> Self {
        self.input = input;
        self
    }

    pub fn with_output(mut self, output: OutputSerialization) -> Self {
        self.output = output;
        self
    }

    pub fn with_scan_range(mut self, scan_range: ScanRange) -> Self {
        self.scan_range = scan_range;
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.request_progress = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_conventions() {
        let request: SelectRequest = SelectRequest::new("b", "k", "SELECT * FROM S3Object s");
        assert_eq!(request.input.format, InputFormat::Parquet);
        assert_eq!(request.input.compression.as_str(), "NONE");
        assert_eq!(request.expression_type.as_str(), "SQL");
        assert!(request.scan_range.is_full());
        assert!(!request.request_progress);

        let OutputSerialization::Csv(csv) = request.output else {
            panic!("expected CSV output");
        };
        assert_eq!(csv.quote_fields, QuoteFields::Always);
        assert_eq!(csv.field_delimiter, ',');
        assert_eq!(csv.quote_character, '"');
        assert_eq!(csv.quote_escape_character, '"');
        assert_eq!(csv.record_delimiter, '\n');
    }

    #[test]
    fn test_builders() {
        let request: SelectRequest = SelectRequest::new("b", "k", "q")
            .with_input(
                InputSerialization::default()
                    .with_format(InputFormat::Csv(CsvInput::default()))
                    .with_compression(CompressionType::Gzip),
            )
            .with_output(OutputSerialization::Json(JsonOutput::default()))
            .with_scan_range(ScanRange {
                start: 10,
                end: Some(99),
            })
            .with_progress(true);

        assert!(matches!(request.input.format, InputFormat::Csv(_)));
        assert_eq!(request.input.compression, CompressionType::Gzip);
        assert!(!request.scan_range.is_full());
        assert!(request.request_progress);
    }
}
