//! Parallel-thread select scheduler.
//!
//! The scheduling thread lists and prunes candidates and hands the survivors
//! to a pool of at most `AccessSettings::parallelism` scoped worker threads.
//! Each job runs entirely on a worker: per-object cache check, query on a
//! miss, decode, cache write. The scheduling thread does no disk I/O while
//! jobs are in flight and alone owns the in-flight counter and the collected
//! results.
//!
//! Each worker creates its own client on its first job and reuses it until
//! the select finishes. The scheduling thread uses a separate client, created
//! with the scheduler, for listings.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::thread;

use rusty_s3access_query::{ColumnSpec, Filter, S3Path};

use crate::cache::CacheLayer;
use crate::decoder::decode_events;
use crate::error::{SelectError, StorageError};
use crate::listing::{self, GlobIter, PrefixIter};
use crate::pipeline::{CacheCheck, Job, SelectContext, SelectOptions};
use crate::reader::Reader;
use crate::traits::{BlockingSelectClient, ClientFactory, EventIter};
use crate::types::{AccessSettings, ListResult};

/// Lazy sequence of candidates for one select.
type Candidates<'a> = Box<dyn Iterator<Item = Result<S3Path, SelectError>> + 'a>;

/// Message from a worker: the job and its decoded result.
type Completion<O> = (Job, Result<O, SelectError>);

/// Partition-aware S3 Select over a blocking transport.
pub struct BlockingS3Access<F: ClientFactory> {
    factory: F,
    client: F::Client,
    settings: AccessSettings,
    cache: CacheLayer,
}

impl<F: ClientFactory> BlockingS3Access<F> {
    /// Create a scheduler and its listing client.
    ///
    /// # Errors
    /// Returns the factory's error if the listing client cannot be created.
    pub fn new(factory: F, settings: AccessSettings) -> Result<Self, StorageError> {
        let client: F::Client = factory.create()?;
        let cache: CacheLayer = CacheLayer::new(settings.cache_dir.clone());
        Ok(Self {
            factory,
            client,
            settings,
            cache,
        })
    }

    /// The client factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Settings in use.
    pub fn settings(&self) -> &AccessSettings {
        &self.settings
    }

    /// List one directory level.
    pub fn ls(&self, path: &S3Path) -> Result<ListResult, SelectError> {
        listing::list_blocking(&self.client, path)
    }

    /// Lazily list every object under a flat key prefix.
    pub fn ls_prefix(&self, path: &S3Path) -> PrefixIter<'_, F::Client> {
        PrefixIter::new(&self.client, path)
    }

    /// Lazily expand a key pattern.
    ///
    /// # Errors
    /// Returns `QueryError::InvalidGlobPattern` (wrapped) for invalid patterns.
    pub fn glob(&self, path: &S3Path) -> Result<GlobIter<'_, F::Client>, SelectError> {
        GlobIter::new(&self.client, path)
    }

    /// Query an object or every object matching a key pattern, and combine
    /// the results.
    ///
    /// Blocks until every query has finished or one has failed. On failure no
    /// further queries are started; those in flight are waited for and their
    /// results discarded.
    ///
    /// See [`S3Access::select`](crate::S3Access::select) for the arguments.
    pub fn select<R: Reader>(
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

        let candidates: Candidates<'_> = if path.is_glob() {
            Box::new(GlobIter::new(&self.client, path)?)
        } else {
            Box::new(std::iter::once(Ok(path.clone())))
        };

        let results: Vec<R::Output> = self.fan_out(&ctx, candidates)?;
        ctx.finish(results, whole_file)
    }

    fn fan_out<R: Reader>(
        &self,
        ctx: &SelectContext<'_, R>,
        mut candidates: Candidates<'_>,
    ) -> Result<Vec<R::Output>, SelectError> {
        let max_workers: usize = self.settings.parallelism.max(1);
        let factory: &F = &self.factory;
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (done_tx, done_rx) = mpsc::channel::<Completion<R::Output>>();
        let job_rx: Mutex<Receiver<Job>> = Mutex::new(job_rx);

        thread::scope(|scope| {
            let mut workers: Vec<thread::ScopedJoinHandle<'_, ()>> = Vec::new();
            let mut results: Vec<R::Output> = Vec::new();
            let mut failure: Option<SelectError> = None;
            let mut spawned: usize = 0;
            let mut exhausted: bool = false;

            loop {
                while failure.is_none() && !exhausted && spawned < max_workers {
                    let candidate: S3Path = match candidates.next() {
                        None => {
                            exhausted = true;
                            break;
                        }
                        Some(Err(e)) => {
                            failure = Some(e);
                            break;
                        }
                        Some(Ok(candidate)) => candidate,
                    };
                    let Some(job) = ctx.plan(candidate) else {
                        continue;
                    };
                    if job_tx.send(job).is_err() {
                        failure = Some(SelectError::WorkerPanicked);
                        break;
                    }
                    spawned += 1;
                    if workers.len() < spawned {
                        let jobs: &Mutex<Receiver<Job>> = &job_rx;
                        let done: Sender<Completion<R::Output>> = done_tx.clone();
                        workers.push(scope.spawn(move || run_worker(factory, ctx, jobs, done)));
                    }
                }

                if spawned == 0 {
                    break;
                }
                let first: Completion<R::Output> = match done_rx.recv() {
                    Ok(completion) => completion,
                    Err(_) => {
                        failure = failure.or(Some(SelectError::WorkerPanicked));
                        break;
                    }
                };
                for (job, result) in std::iter::once(first).chain(done_rx.try_iter()) {
                    spawned -= 1;
                    match result {
                        Ok(output) => results.push(output),
                        Err(e) => {
                            log::debug!(
                                "Select of s3://{}/{} failed: {}",
                                job.request.bucket,
                                job.request.key,
                                e
                            );
                            failure = failure.or(Some(e));
                        }
                    }
                }
            }

            drop(job_tx);
            for worker in workers {
                if worker.join().is_err() {
                    failure = failure.or(Some(SelectError::WorkerPanicked));
                }
            }

            match failure {
                Some(e) => Err(e),
                None => Ok(results),
            }
        })
    }
}

/// Worker loop: take jobs until the queue closes.
fn run_worker<F, R>(
    factory: &F,
    ctx: &SelectContext<'_, R>,
    jobs: &Mutex<Receiver<Job>>,
    done: Sender<Completion<R::Output>>,
) where
    F: ClientFactory,
    R: Reader,
{
    let mut client: Option<F::Client> = None;
    loop {
        let job: Job = {
            let Ok(queue) = jobs.lock() else {
                return;
            };
            match queue.recv() {
                Ok(job) => job,
                Err(_) => return,
            }
        };
        let result: Result<R::Output, SelectError> =
            panic::catch_unwind(AssertUnwindSafe(|| run_job(factory, &mut client, ctx, &job)))
                .unwrap_or(Err(SelectError::WorkerPanicked));
        if done.send((job, result)).is_err() {
            return;
        }
    }
}

fn run_job<F, R>(
    factory: &F,
    client: &mut Option<F::Client>,
    ctx: &SelectContext<'_, R>,
    job: &Job,
) -> Result<R::Output, SelectError>
where
    F: ClientFactory,
    R: Reader,
{
    let cache_file = match ctx.cached(job) {
        CacheCheck::Hit(output) => return Ok(output),
        CacheCheck::Miss(file) => file,
    };

    let client: &F::Client = ensure_client(factory, client)?;
    let request = &job.request;
    log::debug!(
        "Selecting s3://{}/{}: {}",
        request.bucket,
        request.key,
        request.expression
    );
    let events: EventIter = client.select_object_content(request)?;
    let payload: Vec<u8> = decode_events(&request.bucket, &request.key, events, ctx.progress())?;
    let output: R::Output = ctx.decode(job, &payload)?;
    ctx.record(job, &output, cache_file.as_deref());
    Ok(output)
}

/// The worker's client, created on first use.
fn ensure_client<'c, F: ClientFactory>(
    factory: &F,
    slot: &'c mut Option<F::Client>,
) -> Result<&'c F::Client, StorageError> {
    if slot.is_none() {
        *slot = Some(factory.create()?);
    }
    slot.as_ref().ok_or_else(|| StorageError::Other {
        message: "select client unavailable".into(),
    })
}
