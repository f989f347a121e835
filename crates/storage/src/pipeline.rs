//! Scheduler-independent steps of a select.
//!
//! Both schedulers run the same sequence:
//! 1. whole-pattern cache check (glob addresses only)
//! 2. per-candidate partition pruning, no I/O
//! 3. bounded fan-out (scheduler specific); each job checks its per-object
//!    cache entry, queries on a miss, decodes and writes the entry
//! 4. combine, whole-pattern cache write
//!
//! A single literal address is handled as a one-candidate fan-out.

use std::path::{Path, PathBuf};

use rusty_s3access_common::ProgressCallback;
use rusty_s3access_query::{
    ColumnSpec, Filter, InputSerialization, QueryPlan, S3Path, SelectRequest,
};

use crate::cache::{CacheLayer, CacheLookup};
use crate::error::SelectError;
use crate::reader::{ReadOptions, Reader};
use crate::types::{ProgressDetails, SelectProgress};

/// Per-call options of a select.
#[derive(Clone, Default)]
pub struct SelectOptions<'a> {
    /// Drop duplicate rows.
    pub distinct: bool,
    /// Format and compression of the queried objects. Parquet by default.
    pub input: InputSerialization,
    /// Receives service progress events and per-object completion notices.
    /// When set, requests ask the service for progress events.
    pub progress: Option<&'a dyn ProgressCallback<SelectProgress>>,
}

impl<'a> SelectOptions<'a> {
    /// Set row de-duplication.
    pub fn with_distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    /// Set the format of the queried objects.
    pub fn with_input(mut self, input: InputSerialization) -> Self {
        self.input = input;
        self
    }

    /// Report progress to `callback`.
    pub fn with_progress(mut self, callback: &'a dyn ProgressCallback<SelectProgress>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Options handed to the reader.
    pub fn read_options(&self) -> ReadOptions {
        ReadOptions::default().with_distinct(self.distinct)
    }
}

/// Build the select request for one object.
pub(crate) fn build_request<R: Reader + ?Sized>(
    reader: &R,
    path: &S3Path,
    query_text: &str,
    options: &SelectOptions<'_>,
) -> SelectRequest {
    SelectRequest::new(path.bucket(), path.key(), query_text)
        .with_input(options.input.clone())
        .with_output(reader.serialization())
        .with_progress(options.progress.is_some())
}

/// Tell the progress callback that an object's stream is complete.
pub(crate) fn report_completed(
    progress: Option<&dyn ProgressCallback<SelectProgress>>,
    request: &SelectRequest,
) {
    if let Some(cb) = progress {
        cb.on_progress(&SelectProgress {
            bucket: request.bucket.clone(),
            key: request.key.clone(),
            details: ProgressDetails::default(),
            completed: true,
        });
    }
}

/// A candidate that survived pruning, with its pushed-down request.
#[derive(Debug, Clone)]
pub(crate) struct Job {
    pub candidate: S3Path,
    pub request: SelectRequest,
}

/// Outcome of a cache check.
pub(crate) enum CacheCheck<O> {
    Hit(O),
    /// Where to write the result afterwards, if anywhere.
    Miss(Option<PathBuf>),
}

/// Everything fixed for the duration of one select.
///
/// Shared by reference between the scheduling context and the workers.
pub(crate) struct SelectContext<'a, R: Reader> {
    reader: &'a R,
    cache: &'a CacheLayer,
    path: &'a S3Path,
    columns: &'a ColumnSpec,
    filter: &'a Filter,
    options: &'a SelectOptions<'a>,
    read_options: ReadOptions,
}

impl<'a, R: Reader> SelectContext<'a, R> {
    pub fn new(
        reader: &'a R,
        cache: &'a CacheLayer,
        path: &'a S3Path,
        columns: &'a ColumnSpec,
        filter: &'a Filter,
        options: &'a SelectOptions<'a>,
    ) -> Self {
        Self {
            reader,
            cache,
            path,
            columns,
            filter,
            options,
            read_options: options.read_options().with_partitions(path.partitions()),
        }
    }

    pub fn progress(&self) -> Option<&'a dyn ProgressCallback<SelectProgress>> {
        self.options.progress
    }

    fn caching(&self) -> bool {
        self.reader.supports_caching() && self.cache.is_enabled()
    }

    /// Look up and load the cache entry of a query. Disk I/O.
    fn check(&self, path: &S3Path, query_text: &str) -> CacheCheck<R::Output> {
        if !self.caching() {
            return CacheCheck::Miss(None);
        }
        let lookup: CacheLookup = self
            .cache
            .lookup(path, query_text, self.reader.cache_extension());
        if lookup.hit {
            if let Some(output) = lookup
                .path
                .as_deref()
                .and_then(|file| self.cache.load(self.reader, file))
            {
                return CacheCheck::Hit(output);
            }
        }
        CacheCheck::Miss(lookup.path)
    }

    /// Check the whole-pattern cache entry of a glob address.
    pub fn whole_pattern(&self) -> CacheCheck<R::Output> {
        if !self.path.is_glob() {
            return CacheCheck::Miss(None);
        }
        let plan: QueryPlan = QueryPlan::build(self.path, self.columns, self.filter);
        let check: CacheCheck<R::Output> = self.check(self.path, &plan.query_text);
        if matches!(check, CacheCheck::Hit(_)) {
            log::debug!("Serving {} from the whole-pattern cache", self.path);
        }
        check
    }

    /// Prune a candidate or build its request. No I/O.
    ///
    /// # Returns
    /// `None` if a partition filter excludes the candidate.
    pub fn plan(&self, candidate: S3Path) -> Option<Job> {
        if !self.filter.matches_partitions(&candidate) {
            log::debug!("Pruned {} by partition filter", candidate);
            return None;
        }
        let plan: QueryPlan = QueryPlan::build(&candidate, self.columns, self.filter);
        let request: SelectRequest =
            build_request(self.reader, &candidate, &plan.query_text, self.options);
        Some(Job { candidate, request })
    }

    /// Check the per-object cache entry of a job. Disk I/O.
    pub fn cached(&self, job: &Job) -> CacheCheck<R::Output> {
        self.check(&job.candidate, &job.request.expression)
    }

    /// Decode one object's payload. Partition values of the object lead
    /// every row.
    pub fn decode(&self, job: &Job, payload: &[u8]) -> Result<R::Output, SelectError> {
        let options: ReadOptions = self
            .read_options
            .clone()
            .with_partitions(job.candidate.partitions());
        Ok(self.reader.read(payload, self.columns, &options)?)
    }

    /// Report a fetched job as complete and write its per-object cache entry.
    /// Disk I/O.
    pub fn record(&self, job: &Job, output: &R::Output, cache_file: Option<&Path>) {
        report_completed(self.progress(), &job.request);
        if let Some(file) = cache_file {
            // Failures are logged by the cache and only cost a re-query.
            let _ = self.cache.store(self.reader, file, output);
        }
    }

    /// Combine all results and write the whole-pattern entry.
    pub fn finish(
        &self,
        results: Vec<R::Output>,
        whole_file: Option<PathBuf>,
    ) -> Result<R::Output, SelectError> {
        let combined: R::Output = self
            .reader
            .combine(results, self.columns, &self.read_options)?;
        if let Some(file) = whole_file {
            let _ = self.cache.store(self.reader, &file, &combined);
        }
        Ok(combined)
    }
}
