//! AWS SDK S3 client implementation.

use std::fmt::Display;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::operation::select_object_content::SelectObjectContentOutput;
use aws_sdk_s3::primitives::event_stream::EventReceiver;
use aws_sdk_s3::types::error::SelectObjectContentEventStreamError;
use aws_sdk_s3::types::{self as sdk, SelectObjectContentEventStream};
use aws_sdk_s3::Client as S3Client;
use futures::stream::{self, StreamExt};

use rusty_s3access_query::{
    CompressionType, FileHeaderInfo, InputFormat, InputSerialization, JsonType,
    OutputSerialization, QuoteFields, ScanRange, SelectRequest,
};
use rusty_s3access_storage::{
    AccessSettings, EventStream, ListPage, ProgressDetails, SelectClient, SelectEvent,
    StorageError,
};

use crate::error::CrtError;

type SelectEventReceiver =
    EventReceiver<SelectObjectContentEventStream, SelectObjectContentEventStreamError>;

/// [`SelectClient`] implementation using the AWS SDK for Rust.
///
/// The SDK client pools connections and retries throttled calls itself; the
/// schedulers never retry.
#[derive(Clone)]
pub struct CrtSelectClient {
    /// The underlying S3 client.
    s3_client: S3Client,
}

impl CrtSelectClient {
    /// Create a client from access settings.
    ///
    /// Uses the static credentials in `settings` when present, otherwise the
    /// default credential chain. A custom endpoint switches to path-style
    /// addressing, which S3-compatible stores expect.
    ///
    /// # Arguments
    /// * `settings` - Region, endpoint and optional credentials
    ///
    /// # Errors
    /// Returns `StorageError::InvalidConfig` if static credentials lack a key.
    pub async fn new(settings: &AccessSettings) -> Result<Self, StorageError> {
        let config_loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(settings.region.clone()));

        let config_loader = if let Some(ref creds) = settings.credentials {
            if creds.access_key_id.is_empty() || creds.secret_access_key.is_empty() {
                return Err(CrtError::ConfigError(
                    "static credentials need an access key id and a secret".into(),
                )
                .into());
            }
            let credentials = Credentials::new(
                &creds.access_key_id,
                &creds.secret_access_key,
                creds.session_token.clone(),
                None,
                "rusty-s3access",
            );
            config_loader.credentials_provider(credentials)
        } else {
            config_loader
        };

        let config_loader = match settings.endpoint_url {
            Some(ref url) => config_loader.endpoint_url(url),
            None => config_loader,
        };

        let sdk_config = config_loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.endpoint_url.is_some())
            .build();

        log::debug!(
            "Created S3 client for region {} (endpoint: {})",
            settings.region,
            settings.endpoint_url.as_deref().unwrap_or("default")
        );
        Ok(Self {
            s3_client: S3Client::from_conf(s3_config),
        })
    }

    /// Create a client from an existing S3Client.
    ///
    /// # Arguments
    /// * `s3_client` - Pre-configured S3 client
    pub fn from_client(s3_client: S3Client) -> Self {
        Self { s3_client }
    }
}

#[async_trait]
impl SelectClient for CrtSelectClient {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StorageError> {
        let mut request = self
            .s3_client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix);

        if let Some(delimiter) = delimiter {
            request = request.delimiter(delimiter);
        }

        if let Some(token) = continuation_token {
            request = request.continuation_token(token);
        }

        let response = request.send().await.map_err(|err| {
            let service_err = err.into_service_error();
            if service_err.is_no_such_bucket() {
                StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: prefix.to_string(),
                }
            } else {
                service_error(&service_err, bucket, prefix)
            }
        })?;

        let mut page: ListPage = ListPage {
            common_prefixes: response
                .common_prefixes()
                .iter()
                .filter_map(|p| p.prefix().map(str::to_string))
                .collect(),
            keys: response
                .contents()
                .iter()
                .filter_map(|o| o.key().map(str::to_string))
                .collect(),
            next_token: None,
        };

        if response.is_truncated() == Some(true) {
            page.next_token = response.next_continuation_token().map(str::to_string);
        }

        Ok(page)
    }

    async fn select_object_content(
        &self,
        request: &SelectRequest,
    ) -> Result<EventStream, StorageError> {
        let mut call = self
            .s3_client
            .select_object_content()
            .bucket(&request.bucket)
            .key(&request.key)
            .expression(&request.expression)
            .expression_type(sdk::ExpressionType::Sql)
            .input_serialization(to_sdk_input(&request.input))
            .output_serialization(to_sdk_output(&request.output))
            .request_progress(
                sdk::RequestProgress::builder()
                    .enabled(request.request_progress)
                    .build(),
            );

        if !request.scan_range.is_full() {
            call = call.scan_range(to_sdk_scan_range(&request.scan_range));
        }

        let output: SelectObjectContentOutput = call.send().await.map_err(|err| {
            let service_err = err.into_service_error();
            service_error(&service_err, &request.bucket, &request.key)
        })?;

        let events = stream::try_unfold(output.payload, next_event);

        Ok(events.boxed())
    }
}

/// Pull the next event that maps to a [`SelectEvent`].
async fn next_event(
    mut receiver: SelectEventReceiver,
) -> Result<Option<(SelectEvent, SelectEventReceiver)>, StorageError> {
    loop {
        let event: Option<SelectObjectContentEventStream> =
            receiver.recv().await.map_err(|err| {
                StorageError::from(CrtError::SdkError {
                    message: err.to_string(),
                    retryable: true,
                })
            })?;
        match event {
            None => return Ok(None),
            Some(event) => {
                if let Some(event) = convert_event(event) {
                    return Ok(Some((event, receiver)));
                }
            }
        }
    }
}

/// Map a service error to a [`StorageError`] by its error code.
fn service_error<E>(err: &E, bucket: &str, key: &str) -> StorageError
where
    E: ProvideErrorMetadata + Display,
{
    match err.code() {
        Some("NoSuchKey") | Some("NoSuchBucket") => StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        Some("AccessDenied") | Some("Forbidden") => StorageError::AccessDenied {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: err.message().unwrap_or_default().to_string(),
        },
        code => StorageError::NetworkError {
            message: err.to_string(),
            retryable: matches!(
                code,
                Some("SlowDown") | Some("InternalError") | Some("ServiceUnavailable") | None
            ),
        },
    }
}

/// Translate one SDK stream event. Continuation events carry nothing and
/// are dropped; stats events are reported as progress.
pub(crate) fn convert_event(event: SelectObjectContentEventStream) -> Option<SelectEvent> {
    match event {
        SelectObjectContentEventStream::Records(records) => Some(SelectEvent::Records(
            records
                .payload()
                .map(|blob| blob.as_ref().to_vec())
                .unwrap_or_default(),
        )),
        SelectObjectContentEventStream::Progress(progress) => {
            progress.details().map(|d| {
                SelectEvent::Progress(progress_details(
                    d.bytes_scanned(),
                    d.bytes_processed(),
                    d.bytes_returned(),
                ))
            })
        }
        SelectObjectContentEventStream::Stats(stats) => stats.details().map(|d| {
            SelectEvent::Progress(progress_details(
                d.bytes_scanned(),
                d.bytes_processed(),
                d.bytes_returned(),
            ))
        }),
        SelectObjectContentEventStream::End(_) => Some(SelectEvent::End),
        SelectObjectContentEventStream::Cont(_) => None,
        other => {
            log::debug!("Ignoring unknown select event: {:?}", other);
            None
        }
    }
}

fn progress_details(
    scanned: Option<i64>,
    processed: Option<i64>,
    returned: Option<i64>,
) -> ProgressDetails {
    let count = |n: Option<i64>| -> u64 { n.unwrap_or_default().max(0) as u64 };
    ProgressDetails {
        bytes_scanned: count(scanned),
        bytes_processed: count(processed),
        bytes_returned: count(returned),
    }
}

pub(crate) fn to_sdk_input(input: &InputSerialization) -> sdk::InputSerialization {
    let builder = sdk::InputSerialization::builder().compression_type(match input.compression {
        CompressionType::None => sdk::CompressionType::None,
        CompressionType::Gzip => sdk::CompressionType::Gzip,
        CompressionType::Bzip2 => sdk::CompressionType::Bzip2,
    });

    let builder = match &input.format {
        InputFormat::Parquet => builder.parquet(sdk::ParquetInput::builder().build()),
        InputFormat::Csv(csv) => {
            let mut csv_input = sdk::CsvInput::builder()
                .allow_quoted_record_delimiter(csv.allow_quoted_record_delimiter)
                .field_delimiter(csv.field_delimiter.to_string())
                .quote_character(csv.quote_character.to_string())
                .quote_escape_character(csv.quote_escape_character.to_string())
                .file_header_info(match csv.file_header_info {
                    FileHeaderInfo::None => sdk::FileHeaderInfo::None,
                    FileHeaderInfo::Ignore => sdk::FileHeaderInfo::Ignore,
                    FileHeaderInfo::Use => sdk::FileHeaderInfo::Use,
                });
            if let Some(comments) = csv.comments {
                csv_input = csv_input.comments(comments.to_string());
            }
            if let Some(delimiter) = csv.record_delimiter {
                csv_input = csv_input.record_delimiter(delimiter.to_string());
            }
            builder.csv(csv_input.build())
        }
        InputFormat::Json(json) => {
            let mut json_input = sdk::JsonInput::builder();
            if let Some(json_type) = json.json_type {
                json_input = json_input.r#type(match json_type {
                    JsonType::Document => sdk::JsonType::Document,
                    JsonType::Lines => sdk::JsonType::Lines,
                });
            }
            builder.json(json_input.build())
        }
    };

    builder.build()
}

pub(crate) fn to_sdk_output(output: &OutputSerialization) -> sdk::OutputSerialization {
    match output {
        OutputSerialization::Csv(csv) => sdk::OutputSerialization::builder()
            .csv(
                sdk::CsvOutput::builder()
                    .quote_fields(match csv.quote_fields {
                        QuoteFields::Always => sdk::QuoteFields::Always,
                        QuoteFields::AsNeeded => sdk::QuoteFields::Asneeded,
                    })
                    .record_delimiter(csv.record_delimiter.to_string())
                    .field_delimiter(csv.field_delimiter.to_string())
                    .quote_character(csv.quote_character.to_string())
                    .quote_escape_character(csv.quote_escape_character.to_string())
                    .build(),
            )
            .build(),
        OutputSerialization::Json(json) => sdk::OutputSerialization::builder()
            .json(
                sdk::JsonOutput::builder()
                    .record_delimiter(json.record_delimiter.to_string())
                    .build(),
            )
            .build(),
    }
}

fn to_sdk_scan_range(range: &ScanRange) -> sdk::ScanRange {
    let builder = sdk::ScanRange::builder().start(range.start as i64);
    match range.end {
        Some(end) => builder.end(end as i64).build(),
        None => builder.build(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::primitives::Blob;
    use rusty_s3access_query::{CsvInput, CsvOutput, JsonInput, JsonOutput};

    #[test]
    fn test_crt_client_is_select_client() {
        fn assert_select_client<T: SelectClient>() {}
        assert_select_client::<CrtSelectClient>();
    }

    #[test]
    fn test_csv_input() {
        let input: InputSerialization = InputSerialization::default()
            .with_format(InputFormat::Csv(CsvInput {
                file_header_info: FileHeaderInfo::Use,
                comments: Some('#'),
                ..CsvInput::default()
            }))
            .with_compression(CompressionType::Gzip);

        let sdk_input: sdk::InputSerialization = to_sdk_input(&input);
        assert_eq!(sdk_input.compression_type(), Some(&sdk::CompressionType::Gzip));
        let csv = sdk_input.csv().unwrap();
        assert_eq!(csv.file_header_info(), Some(&sdk::FileHeaderInfo::Use));
        assert_eq!(csv.comments(), Some("#"));
        assert_eq!(csv.field_delimiter(), Some(","));
        assert!(csv.record_delimiter().is_none());
        assert!(sdk_input.parquet().is_none());
    }

    #[test]
    fn test_parquet_and_json_input() {
        let sdk_input: sdk::InputSerialization = to_sdk_input(&InputSerialization::parquet());
        assert!(sdk_input.parquet().is_some());
        assert_eq!(sdk_input.compression_type(), Some(&sdk::CompressionType::None));

        let input: InputSerialization = InputSerialization::default().with_format(
            InputFormat::Json(JsonInput {
                json_type: Some(JsonType::Lines),
            }),
        );
        let sdk_input: sdk::InputSerialization = to_sdk_input(&input);
        assert_eq!(sdk_input.json().unwrap().r#type(), Some(&sdk::JsonType::Lines));
    }

    #[test]
    fn test_output() {
        let sdk_output: sdk::OutputSerialization =
            to_sdk_output(&OutputSerialization::Csv(CsvOutput::default()));
        let csv = sdk_output.csv().unwrap();
        assert_eq!(csv.quote_fields(), Some(&sdk::QuoteFields::Always));
        assert_eq!(csv.record_delimiter(), Some("\n"));

        let sdk_output: sdk::OutputSerialization =
            to_sdk_output(&OutputSerialization::Json(JsonOutput::default()));
        assert_eq!(sdk_output.json().unwrap().record_delimiter(), Some("\n"));
    }

    #[test]
    fn test_scan_range() {
        let range: sdk::ScanRange = to_sdk_scan_range(&ScanRange {
            start: 10,
            end: Some(99),
        });
        assert_eq!(range.start(), Some(10));
        assert_eq!(range.end(), Some(99));
    }

    #[test]
    fn test_convert_events() {
        let records = SelectObjectContentEventStream::Records(
            sdk::RecordsEvent::builder()
                .payload(Blob::new(b"\"a\",\"1\"\n".to_vec()))
                .build(),
        );
        assert_eq!(
            convert_event(records),
            Some(SelectEvent::Records(b"\"a\",\"1\"\n".to_vec()))
        );

        let progress = SelectObjectContentEventStream::Progress(
            sdk::ProgressEvent::builder()
                .details(
                    sdk::Progress::builder()
                        .bytes_scanned(100)
                        .bytes_processed(80)
                        .build(),
                )
                .build(),
        );
        assert_eq!(
            convert_event(progress),
            Some(SelectEvent::Progress(ProgressDetails {
                bytes_scanned: 100,
                bytes_processed: 80,
                bytes_returned: 0,
            }))
        );

        let end = SelectObjectContentEventStream::End(sdk::EndEvent::builder().build());
        assert_eq!(convert_event(end), Some(SelectEvent::End));

        let cont =
            SelectObjectContentEventStream::Cont(sdk::ContinuationEvent::builder().build());
        assert_eq!(convert_event(cont), None);
    }
}
