//! Paginated listing and glob expansion.
//!
//! Directory listings (`ls`) are fetched eagerly, following continuation
//! tokens until the listing is complete. Prefix listings and glob expansion
//! are lazy: the next page is only requested once the consumer has drained the
//! current one. Both flavours exist for async ([`SelectClient`]) and blocking
//! ([`BlockingSelectClient`]) transports.

use std::collections::VecDeque;

use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use rusty_s3access_query::{GlobPattern, S3Path};

use crate::error::SelectError;
use crate::traits::{BlockingSelectClient, SelectClient};
use crate::types::{ListPage, ListResult};

/// Delimiter used for directory listings.
const DELIMITER: &str = "/";

/// Lazy stream of listed objects.
pub type PathStream<'a> = BoxStream<'a, Result<S3Path, SelectError>>;

/// Pagination cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PageState {
    Start,
    Next(String),
    Done,
}

impl PageState {
    fn token(&self) -> Option<&str> {
        match self {
            PageState::Next(token) => Some(token),
            _ => None,
        }
    }

    fn after(page: &ListPage) -> Self {
        match &page.next_token {
            Some(token) => PageState::Next(token.clone()),
            None => PageState::Done,
        }
    }
}

fn directory_result(bucket: &str, pages: Vec<ListPage>) -> ListResult {
    let mut result: ListResult = ListResult::default();
    for page in pages {
        result
            .prefixes
            .extend(page.common_prefixes.iter().map(|p| S3Path::new(bucket, p)));
        result
            .entries
            .extend(page.keys.iter().map(|k| S3Path::new(bucket, k)));
    }
    result
}

/// List one directory level of `path`.
///
/// # Arguments
/// * `client` - Transport client
/// * `path` - Directory to list; its key is treated as a directory
///
/// # Returns
/// Sub-directories and objects of the directory, across all pages.
pub async fn list<C>(client: &C, path: &S3Path) -> Result<ListResult, SelectError>
where
    C: SelectClient + ?Sized,
{
    let prefix: String = path.directory_prefix();
    let mut pages: Vec<ListPage> = Vec::new();
    let mut state: PageState = PageState::Start;
    while state != PageState::Done {
        if let Some(token) = state.token() {
            log::debug!("Listing s3://{}/{} continues at {}", path.bucket(), prefix, token);
        }
        let page: ListPage = client
            .list_objects(path.bucket(), &prefix, Some(DELIMITER), state.token())
            .await?;
        state = PageState::after(&page);
        pages.push(page);
    }
    Ok(directory_result(path.bucket(), pages))
}

async fn fetch_page<C>(
    client: &C,
    bucket: &str,
    prefix: &str,
    state: PageState,
) -> Result<Option<(Vec<S3Path>, PageState)>, SelectError>
where
    C: SelectClient + ?Sized,
{
    if state == PageState::Done {
        return Ok(None);
    }
    if let Some(token) = state.token() {
        log::debug!("Listing s3://{}/{} continues at {}", bucket, prefix, token);
    }
    let page: ListPage = client
        .list_objects(bucket, prefix, None, state.token())
        .await?;
    let next: PageState = PageState::after(&page);
    let entries: Vec<S3Path> = page.keys.iter().map(|k| S3Path::new(bucket, k)).collect();
    Ok(Some((entries, next)))
}

fn prefix_stream<'a, C>(client: &'a C, bucket: String, prefix: String) -> PathStream<'a>
where
    C: SelectClient + ?Sized,
{
    stream::try_unfold(PageState::Start, move |state| {
        let bucket: String = bucket.clone();
        let prefix: String = prefix.clone();
        async move { fetch_page(client, &bucket, &prefix, state).await }
    })
    .map_ok(|entries| stream::iter(entries.into_iter().map(Ok::<S3Path, SelectError>)))
    .try_flatten()
    .boxed()
}

/// Lazily list every object whose key starts with the key of `path`.
///
/// # Arguments
/// * `client` - Transport client
/// * `path` - Bucket and flat key prefix
pub fn list_prefix<'a, C>(client: &'a C, path: &S3Path) -> PathStream<'a>
where
    C: SelectClient + ?Sized,
{
    prefix_stream(client, path.bucket().to_string(), path.key().to_string())
}

/// Lazily expand a key pattern.
///
/// The listing is narrowed to the literal prefix of the pattern; every listed
/// key is then matched against the whole pattern.
///
/// # Errors
/// Returns `QueryError::InvalidGlobPattern` (wrapped) if the pattern does not
/// compile. Listing errors are yielded by the stream.
pub fn glob<'a, C>(client: &'a C, path: &S3Path) -> Result<PathStream<'a>, SelectError>
where
    C: SelectClient + ?Sized,
{
    let pattern: GlobPattern = GlobPattern::new(path.key())?;
    let listed: PathStream<'a> = prefix_stream(client, path.bucket().to_string(), pattern.prefix());
    Ok(listed
        .try_filter(move |candidate| future::ready(pattern.matches(candidate.key())))
        .boxed())
}

/// Blocking counterpart of [`list`].
pub fn list_blocking<C>(client: &C, path: &S3Path) -> Result<ListResult, SelectError>
where
    C: BlockingSelectClient + ?Sized,
{
    let prefix: String = path.directory_prefix();
    let mut pages: Vec<ListPage> = Vec::new();
    let mut state: PageState = PageState::Start;
    while state != PageState::Done {
        if let Some(token) = state.token() {
            log::debug!("Listing s3://{}/{} continues at {}", path.bucket(), prefix, token);
        }
        let page: ListPage =
            client.list_objects(path.bucket(), &prefix, Some(DELIMITER), state.token())?;
        state = PageState::after(&page);
        pages.push(page);
    }
    Ok(directory_result(path.bucket(), pages))
}

/// Blocking lazy prefix listing. See [`list_prefix`].
pub struct PrefixIter<'a, C: BlockingSelectClient + ?Sized> {
    client: &'a C,
    bucket: String,
    prefix: String,
    buffered: VecDeque<S3Path>,
    state: PageState,
}

impl<'a, C: BlockingSelectClient + ?Sized> PrefixIter<'a, C> {
    /// Start listing; no request is made until the first `next()`.
    pub fn new(client: &'a C, path: &S3Path) -> Self {
        Self::with_prefix(client, path.bucket().to_string(), path.key().to_string())
    }

    fn with_prefix(client: &'a C, bucket: String, prefix: String) -> Self {
        Self {
            client,
            bucket,
            prefix,
            buffered: VecDeque::new(),
            state: PageState::Start,
        }
    }
}

impl<'a, C: BlockingSelectClient + ?Sized> Iterator for PrefixIter<'a, C> {
    type Item = Result<S3Path, SelectError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(path) = self.buffered.pop_front() {
                return Some(Ok(path));
            }
            if self.state == PageState::Done {
                return None;
            }
            if let Some(token) = self.state.token() {
                log::debug!("Listing s3://{}/{} continues at {}", self.bucket, self.prefix, token);
            }
            let page: ListPage = match self.client.list_objects(
                &self.bucket,
                &self.prefix,
                None,
                self.state.token(),
            ) {
                Ok(page) => page,
                Err(e) => {
                    self.state = PageState::Done;
                    return Some(Err(e.into()));
                }
            };
            self.state = PageState::after(&page);
            let bucket: &str = &self.bucket;
            self.buffered
                .extend(page.keys.iter().map(|k| S3Path::new(bucket, k)));
        }
    }
}

/// Blocking lazy glob expansion. See [`glob`].
pub struct GlobIter<'a, C: BlockingSelectClient + ?Sized> {
    listed: PrefixIter<'a, C>,
    pattern: GlobPattern,
}

impl<'a, C: BlockingSelectClient + ?Sized> GlobIter<'a, C> {
    /// Compile the pattern of `path` and prepare the listing.
    ///
    /// # Errors
    /// Returns `QueryError::InvalidGlobPattern` (wrapped) for invalid patterns.
    pub fn new(client: &'a C, path: &S3Path) -> Result<Self, SelectError> {
        let pattern: GlobPattern = GlobPattern::new(path.key())?;
        let listed: PrefixIter<'a, C> =
            PrefixIter::with_prefix(client, path.bucket().to_string(), pattern.prefix());
        Ok(Self { listed, pattern })
    }
}

impl<'a, C: BlockingSelectClient + ?Sized> Iterator for GlobIter<'a, C> {
    type Item = Result<S3Path, SelectError>;

    fn next(&mut self) -> Option<Self::Item> {
        for candidate in self.listed.by_ref() {
            match candidate {
                Ok(path) if !self.pattern.matches(path.key()) => continue,
                other => return Some(other),
            }
        }
        None
    }
}
