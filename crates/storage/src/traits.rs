//! Transport interfaces for listing and S3 Select calls.

use async_trait::async_trait;
use futures::stream::BoxStream;
use rusty_s3access_query::SelectRequest;

use crate::error::StorageError;
use crate::types::{ListPage, SelectEvent};

/// Events of one select response, in arrival order.
pub type EventStream = BoxStream<'static, Result<SelectEvent, StorageError>>;

/// Blocking counterpart of [`EventStream`].
pub type EventIter = Box<dyn Iterator<Item = Result<SelectEvent, StorageError>> + Send>;

/// Low-level S3 operations for the cooperative scheduler - implemented by each backend.
#[async_trait]
pub trait SelectClient: Send + Sync {
    /// Fetch one page of a listing.
    ///
    /// # Arguments
    /// * `bucket` - Bucket to list
    /// * `prefix` - Key prefix
    /// * `delimiter` - Group keys into common prefixes at this delimiter
    /// * `continuation_token` - Token from the previous page
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StorageError>;

    /// Start a select query and return its event stream.
    async fn select_object_content(&self, request: &SelectRequest)
        -> Result<EventStream, StorageError>;
}

/// Low-level S3 operations for the thread-pool scheduler.
///
/// Instances are not shared between threads: each worker owns one.
pub trait BlockingSelectClient: Send {
    /// Fetch one page of a listing. See [`SelectClient::list_objects`].
    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StorageError>;

    /// Start a select query and return its events as a blocking iterator.
    fn select_object_content(&self, request: &SelectRequest) -> Result<EventIter, StorageError>;
}

/// Creates one [`BlockingSelectClient`] per execution context.
pub trait ClientFactory: Send + Sync {
    type Client: BlockingSelectClient;

    /// Create a new client.
    fn create(&self) -> Result<Self::Client, StorageError>;
}
