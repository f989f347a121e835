//! In-memory object store implementing both transport traits.
//!
//! Select calls do not evaluate SQL: every object returns its whole payload.
//! The store records each request and the peak number of concurrent calls.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rusty_s3access_query::SelectRequest;
use rusty_s3access_storage::{
    BlockingSelectClient, ClientFactory, EventIter, EventStream, ListPage, ProgressDetails,
    SelectClient, SelectEvent, StorageError,
};

pub const BUCKET: &str = "bkt";

/// Shared state of the fake service.
#[derive(Default)]
pub struct MockStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    page_size: usize,
    delay: Duration,
    failing: Mutex<HashSet<String>>,
    truncated: Mutex<HashSet<String>>,
    queries: Mutex<Vec<SelectRequest>>,
    list_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockStore {
    /// Store with listing pages of `page_size` entries and select calls that
    /// take `delay`.
    pub fn new(page_size: usize, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            page_size: page_size.max(1),
            delay,
            ..Self::default()
        })
    }

    /// Add an object whose select payload is `rows` as fully quoted CSV.
    pub fn put_rows(&self, key: &str, rows: &[&[&str]]) {
        let mut payload: String = String::new();
        for row in rows {
            let fields: Vec<String> = row.iter().map(|f| format!("\"{}\"", f)).collect();
            payload.push_str(&fields.join(","));
            payload.push('\n');
        }
        self.put_raw(key, payload.into_bytes());
    }

    /// Add an object with an arbitrary select payload.
    pub fn put_raw(&self, key: &str, payload: Vec<u8>) {
        self.objects.lock().unwrap().insert(key.to_string(), payload);
    }

    /// Make select calls on `key` fail.
    pub fn fail_on(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    /// Make the stream of `key` end without an end event.
    pub fn truncate(&self, key: &str) {
        self.truncated.lock().unwrap().insert(key.to_string());
    }

    /// Keys queried so far, sorted.
    pub fn queried_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .queries
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Requests issued so far.
    pub fn queries(&self) -> Vec<SelectRequest> {
        self.queries.lock().unwrap().clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StorageError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if bucket != BUCKET {
            return Err(StorageError::NotFound {
                bucket: bucket.to_string(),
                key: prefix.to_string(),
            });
        }

        // Sorted entries: (is_prefix, name)
        let mut entries: BTreeSet<(String, bool)> = BTreeSet::new();
        for key in self.objects.lock().unwrap().keys() {
            let Some(rest) = key.strip_prefix(prefix) else {
                continue;
            };
            match delimiter.and_then(|d| rest.find(d).map(|idx| (d, idx))) {
                Some((d, idx)) => {
                    entries.insert((format!("{}{}", prefix, &rest[..idx + d.len()]), true));
                }
                None => {
                    entries.insert((key.clone(), false));
                }
            }
        }

        let start: usize = match continuation_token {
            Some(token) => token.parse().map_err(|_| StorageError::Other {
                message: format!("bad token {}", token),
            })?,
            None => 0,
        };
        let entries: Vec<(String, bool)> = entries.into_iter().collect();
        let end: usize = (start + self.page_size).min(entries.len());

        let mut page: ListPage = ListPage::default();
        for (name, is_prefix) in &entries[start.min(end)..end] {
            if *is_prefix {
                page.common_prefixes.push(name.clone());
            } else {
                page.keys.push(name.clone());
            }
        }
        if end < entries.len() {
            page.next_token = Some(end.to_string());
        }
        Ok(page)
    }

    fn begin_select(&self, request: &SelectRequest) {
        self.queries.lock().unwrap().push(request.clone());
        let now: usize = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn end_select(&self, request: &SelectRequest) -> Result<Vec<SelectEvent>, StorageError> {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&request.key) {
            return Err(StorageError::NetworkError {
                message: format!("select failed for {}", request.key),
                retryable: true,
            });
        }
        let payload: Vec<u8> = self
            .objects
            .lock()
            .unwrap()
            .get(&request.key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                bucket: request.bucket.clone(),
                key: request.key.clone(),
            })?;

        let split: usize = payload.len() / 2;
        let mut events: Vec<SelectEvent> = Vec::new();
        if request.request_progress {
            events.push(SelectEvent::Progress(ProgressDetails {
                bytes_scanned: payload.len() as u64,
                bytes_processed: payload.len() as u64,
                bytes_returned: payload.len() as u64,
            }));
        }
        events.push(SelectEvent::Records(payload[..split].to_vec()));
        events.push(SelectEvent::Records(payload[split..].to_vec()));
        if !self.truncated.lock().unwrap().contains(&request.key) {
            events.push(SelectEvent::End);
        }
        Ok(events)
    }
}

/// Client handle onto a [`MockStore`].
pub struct MockClient {
    pub store: Arc<MockStore>,
}

impl MockClient {
    pub fn new(store: &Arc<MockStore>) -> Self {
        Self {
            store: Arc::clone(store),
        }
    }
}

#[async_trait]
impl SelectClient for MockClient {
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StorageError> {
        tokio::task::yield_now().await;
        self.store
            .list_page(bucket, prefix, delimiter, continuation_token)
    }

    async fn select_object_content(
        &self,
        request: &SelectRequest,
    ) -> Result<EventStream, StorageError> {
        self.store.begin_select(request);
        tokio::time::sleep(self.store.delay).await;
        let events: Vec<SelectEvent> = self.store.end_select(request)?;
        Ok(stream::iter(events.into_iter().map(Ok)).boxed())
    }
}

impl BlockingSelectClient for MockClient {
    fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StorageError> {
        self.store
            .list_page(bucket, prefix, delimiter, continuation_token)
    }

    fn select_object_content(&self, request: &SelectRequest) -> Result<EventIter, StorageError> {
        self.store.begin_select(request);
        std::thread::sleep(self.store.delay);
        let events: Vec<SelectEvent> = self.store.end_select(request)?;
        Ok(Box::new(events.into_iter().map(Ok)))
    }
}

/// Factory counting the clients it hands out.
pub struct MockFactory {
    pub store: Arc<MockStore>,
    pub created: AtomicUsize,
}

impl MockFactory {
    pub fn new(store: &Arc<MockStore>) -> Self {
        Self {
            store: Arc::clone(store),
            created: AtomicUsize::new(0),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl ClientFactory for MockFactory {
    type Client = MockClient;

    fn create(&self) -> Result<MockClient, StorageError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(MockClient::new(&self.store))
    }
}

/// Three partitions, two objects each.
pub fn sales_store(delay: Duration) -> Arc<MockStore> {
    let store: Arc<MockStore> = MockStore::new(2, delay);
    store.put_rows("sales/country=USA/part-0.csv", &[&["apple", "3"], &["pear", "5"]]);
    store.put_rows("sales/country=USA/part-1.csv", &[&["plum", "7"]]);
    store.put_rows("sales/country=FR/part-0.csv", &[&["pomme", "2"]]);
    store.put_rows("sales/country=FR/part-1.csv", &[&["poire", "4"]]);
    store.put_rows("sales/country=NZ/part-0.csv", &[&["kiwi", "9"]]);
    store.put_rows("sales/country=NZ/part-1.csv", &[&["feijoa", "1"]]);
    store.put_rows("sales/README.csv", &[&["not", "data"]]);
    store
}
