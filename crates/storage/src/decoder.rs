//! Reassembly of S3 Select event streams.
//!
//! A select response is a sequence of events: record chunks, progress
//! counters and a final end event. The payload is the concatenation of all
//! record chunks; it is only valid once the end event has been seen.

use futures::{Stream, StreamExt};
use rusty_s3access_common::ProgressCallback;

use crate::error::{SelectError, StorageError};
use crate::types::{ProgressDetails, SelectEvent, SelectProgress};

/// Accumulates the events of one object's response.
struct PayloadAccumulator<'a> {
    bucket: &'a str,
    key: &'a str,
    payload: Vec<u8>,
    ended: bool,
    progress: Option<&'a dyn ProgressCallback<SelectProgress>>,
}

impl<'a> PayloadAccumulator<'a> {
    fn new(
        bucket: &'a str,
        key: &'a str,
        progress: Option<&'a dyn ProgressCallback<SelectProgress>>,
    ) -> Self {
        Self {
            bucket,
            key,
            payload: Vec::new(),
            ended: false,
            progress,
        }
    }

    /// Apply one event. Returns `false` once the end event has been seen.
    fn accept(&mut self, event: SelectEvent) -> bool {
        match event {
            SelectEvent::Records(chunk) => self.payload.extend_from_slice(&chunk),
            SelectEvent::Progress(details) => self.report(details),
            SelectEvent::End => self.ended = true,
        }
        !self.ended
    }

    fn report(&self, details: ProgressDetails) {
        if let Some(cb) = self.progress {
            cb.on_progress(&SelectProgress {
                bucket: self.bucket.to_string(),
                key: self.key.to_string(),
                details,
                completed: false,
            });
        }
    }

    fn finish(self) -> Result<Vec<u8>, SelectError> {
        if !self.ended {
            return Err(SelectError::IncompleteStream {
                bucket: self.bucket.to_string(),
                key: self.key.to_string(),
            });
        }
        Ok(self.payload)
    }
}

/// Reassemble the payload of a blocking event sequence.
///
/// Consumption stops at the end event.
///
/// # Arguments
/// * `bucket` - Bucket of the queried object, for reporting
/// * `key` - Key of the queried object, for reporting
/// * `events` - Response events in arrival order
/// * `progress` - Receives progress events, if any
///
/// # Errors
/// Returns the first transport error, or `SelectError::IncompleteStream` if
/// the events run out before the end event.
pub fn decode_events<I>(
    bucket: &str,
    key: &str,
    events: I,
    progress: Option<&dyn ProgressCallback<SelectProgress>>,
) -> Result<Vec<u8>, SelectError>
where
    I: IntoIterator<Item = Result<SelectEvent, StorageError>>,
{
    let mut accumulator: PayloadAccumulator<'_> = PayloadAccumulator::new(bucket, key, progress);
    for event in events {
        if !accumulator.accept(event?) {
            break;
        }
    }
    accumulator.finish()
}

/// Reassemble the payload of an asynchronous event stream.
///
/// Dropping the returned future stops consumption; there is nothing else to
/// release.
///
/// # Errors
/// Same as [`decode_events`].
pub async fn decode_event_stream<S>(
    bucket: &str,
    key: &str,
    mut events: S,
    progress: Option<&dyn ProgressCallback<SelectProgress>>,
) -> Result<Vec<u8>, SelectError>
where
    S: Stream<Item = Result<SelectEvent, StorageError>> + Unpin,
{
    let mut accumulator: PayloadAccumulator<'_> = PayloadAccumulator::new(bucket, key, progress);
    while let Some(event) = events.next().await {
        if !accumulator.accept(event?) {
            break;
        }
    }
    accumulator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use rusty_s3access_common::progress_fn;
    use std::sync::Mutex;

    fn records(data: &[u8]) -> Result<SelectEvent, StorageError> {
        Ok(SelectEvent::Records(data.to_vec()))
    }

    #[test]
    fn test_concatenates_records_in_order() {
        let events = vec![records(b"a,1\n"), records(b"b,2\n"), Ok(SelectEvent::End)];
        let payload: Vec<u8> = decode_events("b", "k", events, None).unwrap();
        assert_eq!(payload, b"a,1\nb,2\n");
    }

    #[test]
    fn test_missing_end_is_incomplete() {
        let events = vec![records(b"a"), records(b"b")];
        let result: Result<Vec<u8>, SelectError> = decode_events("b", "k", events, None);
        assert!(matches!(
            result,
            Err(SelectError::IncompleteStream { ref bucket, ref key }) if bucket == "b" && key == "k"
        ));
    }

    #[test]
    fn test_empty_payload_with_end() {
        let payload: Vec<u8> = decode_events("b", "k", vec![Ok(SelectEvent::End)], None).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn test_transport_error_propagates() {
        let events = vec![
            records(b"a"),
            Err(StorageError::NetworkError {
                message: "reset".into(),
                retryable: true,
            }),
        ];
        assert!(matches!(
            decode_events("b", "k", events, None),
            Err(SelectError::Storage(_))
        ));
    }

    #[test]
    fn test_events_after_end_are_ignored() {
        let events = vec![records(b"a"), Ok(SelectEvent::End), records(b"zzz")];
        assert_eq!(decode_events("b", "k", events, None).unwrap(), b"a");
    }

    #[test]
    fn test_progress_events_reach_callback() {
        let seen: Mutex<Vec<SelectProgress>> = Mutex::new(Vec::new());
        let callback = progress_fn(|p: &SelectProgress| {
            if let Ok(mut seen) = seen.lock() {
                seen.push(p.clone());
            }
        });
        let details: ProgressDetails = ProgressDetails {
            bytes_scanned: 10,
            bytes_processed: 8,
            bytes_returned: 4,
        };
        let events = vec![
            Ok(SelectEvent::Progress(details)),
            records(b"x"),
            Ok(SelectEvent::End),
        ];
        decode_events("bkt", "obj", events, Some(&callback)).unwrap();
        drop(callback);

        let seen: Vec<SelectProgress> = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].bucket, "bkt");
        assert_eq!(seen[0].key, "obj");
        assert_eq!(seen[0].details, details);
        assert!(!seen[0].completed);
    }

    #[tokio::test]
    async fn test_stream_decoding() {
        let events = stream::iter(vec![records(b"1\n"), records(b"2\n"), Ok(SelectEvent::End)]);
        let payload: Vec<u8> = decode_event_stream("b", "k", events, None).await.unwrap();
        assert_eq!(payload, b"1\n2\n");
    }

    #[tokio::test]
    async fn test_stream_without_end_is_incomplete() {
        let events = stream::iter(vec![records(b"1\n")]);
        assert!(matches!(
            decode_event_stream("b", "k", events, None).await,
            Err(SelectError::IncompleteStream { .. })
        ));
    }
}
