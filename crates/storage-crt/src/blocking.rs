//! Blocking wrapper over [`CrtSelectClient`] for the thread-pool scheduler.

use futures::StreamExt;
use tokio::runtime::{Builder, Runtime};

use rusty_s3access_query::SelectRequest;
use rusty_s3access_storage::{
    AccessSettings, BlockingSelectClient, ClientFactory, EventIter, EventStream, ListPage,
    SelectClient, SelectEvent, StorageError,
};

use crate::client::CrtSelectClient;
use crate::error::CrtError;

/// A [`CrtSelectClient`] driven by its own single-threaded runtime.
///
/// Each worker thread of the blocking scheduler owns one; nothing is shared
/// between workers.
pub struct BlockingCrtClient {
    runtime: Runtime,
    inner: CrtSelectClient,
}

impl BlockingCrtClient {
    /// Create a client and its runtime.
    ///
    /// # Arguments
    /// * `settings` - Region, endpoint and optional credentials
    ///
    /// # Errors
    /// Returns `StorageError::IoError` if the runtime cannot be started, or
    /// the errors of [`CrtSelectClient::new`].
    pub fn new(settings: &AccessSettings) -> Result<Self, StorageError> {
        let runtime: Runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(CrtError::from)?;
        let inner: CrtSelectClient = runtime.block_on(CrtSelectClient::new(settings))?;
        Ok(Self { runtime, inner })
    }
}

impl BlockingSelectClient for BlockingCrtClient {
    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StorageError> {
        self.runtime.block_on(
            self.inner
                .list_objects(bucket, prefix, delimiter, continuation_token),
        )
    }

    /// Runs the query to the end of its stream before returning. The events,
    /// including a trailing error if the stream broke, are replayed in order.
    fn select_object_content(&self, request: &SelectRequest) -> Result<EventIter, StorageError> {
        let events: Vec<Result<SelectEvent, StorageError>> = self.runtime.block_on(async {
            let stream: EventStream = self.inner.select_object_content(request).await?;
            Ok::<_, StorageError>(stream.collect().await)
        })?;
        Ok(Box::new(events.into_iter()))
    }
}

/// Creates a [`BlockingCrtClient`] per worker.
#[derive(Debug, Clone)]
pub struct CrtClientFactory {
    settings: AccessSettings,
}

impl CrtClientFactory {
    pub fn new(settings: AccessSettings) -> Self {
        Self { settings }
    }
}

impl ClientFactory for CrtClientFactory {
    type Client = BlockingCrtClient;

    fn create(&self) -> Result<BlockingCrtClient, StorageError> {
        BlockingCrtClient::new(&self.settings)
    }
}
