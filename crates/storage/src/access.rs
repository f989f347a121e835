//! Cooperative (async) select scheduler.
//!
//! Queries run as futures on the caller's task; at most
//! `AccessSettings::parallelism` of them are outstanding at once. Candidates
//! are pulled from the lazy glob listing only when a slot is free, and
//! completions are reaped in whatever order they finish.
//!
//! Dropping a `select` future stops consuming events of every outstanding
//! query. Remote calls already issued are not aborted.

use futures::future;
use futures::stream::{self, StreamExt, TryStreamExt};
use rusty_s3access_common::ProgressCallback;
use rusty_s3access_query::{ColumnSpec, Filter, S3Path, SelectRequest};

use crate::cache::CacheLayer;
use crate::decoder::decode_event_stream;
use crate::error::SelectError;
use crate::listing::{self, PathStream};
use crate::pipeline::{
    build_request, report_completed, CacheCheck, SelectContext, SelectOptions,
};
use crate::reader::{ReadOptions, Reader};
use crate::traits::{EventStream, SelectClient};
use crate::types::{AccessSettings, ListResult, SelectProgress};

/// Partition-aware S3 Select over an async transport.
///
/// # Example
///
/// ```ignore
/// let access = S3Access::new(client, AccessSettings::from_env());
/// let table = access
///     .select(
///         &S3Path::parse("s3://bucket/sales/country=*/*.parquet")?,
///         &columns,
///         &Filter::from_conditions(vec![("country", "USA".into())])?,
///         &TableReader::new(),
///         &SelectOptions::default(),
///     )
///     .await?;
/// ```
pub struct S3Access<C: SelectClient> {
    client: C,
    settings: AccessSettings,
    cache: CacheLayer,
}

impl<C: SelectClient> S3Access<C> {
    /// Create a scheduler. The cache root of `settings` is checked once here.
    pub fn new(client: C, settings: AccessSettings) -> Self {
        let cache: CacheLayer = CacheLayer::new(settings.cache_dir.clone());
        Self {
            client,
            settings,
            cache,
        }
    }

    /// The transport client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Settings in use.
    pub fn settings(&self) -> &AccessSettings {
        &self.settings
    }

    /// List one directory level.
    pub async fn ls(&self, path: &S3Path) -> Result<ListResult, SelectError> {
        listing::list(&self.client, path).await
    }

    /// Lazily list every object under a flat key prefix.
    pub fn ls_prefix(&self, path: &S3Path) -> PathStream<'_> {
        listing::list_prefix(&self.client, path)
    }

    /// Lazily expand a key pattern.
    ///
    /// # Errors
    /// Returns `QueryError::InvalidGlobPattern` (wrapped) for invalid patterns.
    pub fn glob(&self, path: &S3Path) -> Result<PathStream<'_>, SelectError> {
        listing::glob(&self.client, path)
    }

    /// Query an object or every object matching a key pattern, and combine
    /// the results.
    ///
    /// # Arguments
    /// * `path` - Object address or key pattern
    /// * `columns` - Columns to select; empty selects every column
    /// * `filter` - Filters; those on partition keys prune candidates locally
    /// * `reader` - Decode, combine and cache strategy
    /// * `options` - Distinct rows and progress reporting
    ///
    /// # Errors
    /// The first listing, query, stream or decode failure aborts the select;
    /// results of other objects are discarded. Cache failures never fail it.
    pub async fn select<R: Reader>(
        &self,
        path: &S3Path,
        columns: &ColumnSpec,
        filter: &Filter,
        reader: &R,
        options: &SelectOptions<'_>,
    ) -> Result<R::Output, SelectError> {
        let ctx: SelectContext<'_, R> =
            SelectContext::new(reader, &self.cache, path, columns, filter, options);
        let whole_file = match ctx.whole_pattern() {
            CacheCheck::Hit(output) => return Ok(output),
            CacheCheck::Miss(file) => file,
        };

        let candidates: PathStream<'_> = if path.is_glob() {
            listing::glob(&self.client, path)?
        } else {
            stream::once(future::ready(Ok(path.clone()))).boxed()
        };

        let ctx_ref: &SelectContext<'_, R> = &ctx;
        let results: Vec<R::Output> = candidates
            .map(|candidate| self.run_candidate(ctx_ref, candidate))
            .buffer_unordered(self.settings.parallelism.max(1))
            .try_filter_map(future::ok)
            .try_collect()
            .await?;

        ctx.finish(results, whole_file)
    }

    /// Prune one candidate, then serve it from the per-object cache or query
    /// it.
    ///
    /// # Returns
    /// `None` if the candidate was pruned.
    async fn run_candidate<R: Reader>(
        &self,
        ctx: &SelectContext<'_, R>,
        candidate: Result<S3Path, SelectError>,
    ) -> Result<Option<R::Output>, SelectError> {
        let Some(job) = ctx.plan(candidate?) else {
            return Ok(None);
        };
        let cache_file = match ctx.cached(&job) {
            CacheCheck::Hit(output) => return Ok(Some(output)),
            CacheCheck::Miss(file) => file,
        };
        let payload: Vec<u8> = self.fetch(&job.request, ctx.progress()).await?;
        let output: R::Output = ctx.decode(&job, &payload)?;
        ctx.record(&job, &output, cache_file.as_deref());
        Ok(Some(output))
    }

    /// Run one query against each of `sources` and combine the results.
    ///
    /// Nothing is pruned and nothing is cached: `query_text` is sent as is
    /// and rows carry no partition columns.
    ///
    /// # Arguments
    /// * `sources` - Objects to query
    /// * `query_text` - S3 Select expression, e.g. from
    ///   [`simple_selection`](rusty_s3access_query::simple_selection)
    /// * `columns` - Columns the query returns, for typed readers
    /// * `reader` - Decode and combine strategy
    /// * `options` - Distinct rows and progress reporting
    pub async fn select_sources<R: Reader>(
        &self,
        sources: &[S3Path],
        query_text: &str,
        columns: &ColumnSpec,
        reader: &R,
        options: &SelectOptions<'_>,
    ) -> Result<R::Output, SelectError> {
        let read_options: &ReadOptions = &options.read_options();
        let progress: Option<&dyn ProgressCallback<SelectProgress>> = options.progress;

        let results: Vec<R::Output> = stream::iter(sources)
            .map(|source| async move {
                let request: SelectRequest = build_request(reader, source, query_text, options);
                let payload: Vec<u8> = self.fetch(&request, progress).await?;
                let output: R::Output = reader.read(&payload, columns, read_options)?;
                report_completed(progress, &request);
                Ok::<_, SelectError>(output)
            })
            .buffer_unordered(self.settings.parallelism.max(1))
            .try_collect()
            .await?;

        Ok(reader.combine(results, columns, read_options)?)
    }

    async fn fetch(
        &self,
        request: &SelectRequest,
        progress: Option<&dyn ProgressCallback<SelectProgress>>,
    ) -> Result<Vec<u8>, SelectError> {
        log::debug!(
            "Selecting s3://{}/{}: {}",
            request.bucket,
            request.key,
            request.expression
        );
        let events: EventStream = self.client.select_object_content(request).await?;
        decode_event_stream(&request.bucket, &request.key, events, progress).await
    }
}
