//! Bulk download of a contiguous comic range
//!
//! # Architecture
//! - Ids are fed through `futures::stream::buffer_unordered(concurrency)`;
//!   a task is spawned only when a slot is free, so at most `concurrency`
//!   comics are in flight and a finished (or panicked) task always frees its
//!   slot.
//! - Each task fetches both sources for its id and inserts the merged comic
//!   into the shared [`ComicSet`] under a mutex.
//!
//! # Failure policy
//! Best-effort: a failed id is logged, counted and left out of the result.
//! Sibling tasks keep going. Only an unusable argument fails the call.
//!
//! # Cancellation
//! Once the token fires, no further ids are scheduled, in-flight tasks stop
//! at their next cancellation check, and results finishing after that point
//! are discarded. The partial set is returned with `cancelled = true`.

use crate::client::XkcdClient;
use crate::endpoints::ComicId;
use crate::error::FetchError;
use async_trait::async_trait;
use futures::future;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use sxkcd_common::{Comic, ComicSet};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// The one comic number xkcd never published
pub const MISSING_COMIC: u32 = 404;

const PROGRESS_LOG_EVERY: usize = 100;

/// Anything that can produce one merged comic by number
#[async_trait]
pub trait ComicSource: Send + Sync + 'static {
    async fn fetch_comic(&self, id: u32, cancel: &CancellationToken) -> Result<Comic, FetchError>;

    /// Number of the most recently published comic
    async fn latest_num(&self, cancel: &CancellationToken) -> Result<u32, FetchError>;
}

#[async_trait]
impl ComicSource for XkcdClient {
    async fn fetch_comic(&self, id: u32, cancel: &CancellationToken) -> Result<Comic, FetchError> {
        self.fetch(ComicId::new(id), cancel).await
    }

    async fn latest_num(&self, cancel: &CancellationToken) -> Result<u32, FetchError> {
        self.fetch_latest_num(cancel).await
    }
}

/// Outcome of one batch run
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub comics: ComicSet,
    /// Ids whose task was started
    pub attempted: usize,
    /// Ids that failed, ascending
    pub failed: Vec<u32>,
    /// True if the run was cut short by cancellation
    pub cancelled: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.comics.len()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attempted, {} succeeded, {} failed",
            self.attempted,
            self.succeeded(),
            self.failed.len()
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
enum TaskOutcome {
    Stored,
    Failed(u32),
    /// Cancelled before starting, mid-fetch, or finished after cancellation
    Cancelled,
}

/// Fetch every comic in `[1, max_id]` except [`MISSING_COMIC`].
pub async fn fetch_all<S: ComicSource>(
    source: Arc<S>,
    max_id: u32,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Result<BatchReport, FetchError> {
    if concurrency == 0 {
        return Err(FetchError::InvalidArgument(
            "concurrency limit must be at least 1".to_string(),
        ));
    }

    let total = (1..=max_id).filter(|id| *id != MISSING_COMIC).count();
    tracing::info!(max_id, total, concurrency, "Starting batch download");

    let results = Arc::new(Mutex::new(ComicSet::new()));
    let attempted = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    let stop = cancel.clone();
    let outcomes: Vec<TaskOutcome> = stream::iter((1..=max_id).filter(|id| *id != MISSING_COMIC))
        .take_while(move |_| future::ready(!stop.is_cancelled()))
        .map(|id| {
            let source = Arc::clone(&source);
            let results = Arc::clone(&results);
            let attempted = Arc::clone(&attempted);
            let completed = Arc::clone(&completed);
            let cancel = cancel.clone();

            let handle = tokio::spawn(async move {
                let outcome = run_task(source.as_ref(), id, &results, &attempted, &cancel).await;

                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % PROGRESS_LOG_EVERY == 0 || done == total {
                    tracing::info!(progress = format!("{}/{}", done, total), "Batch progress");
                }
                outcome
            });

            async move {
                match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!(comic_id = id, error = %e, "Comic task panicked");
                        TaskOutcome::Failed(id)
                    }
                }
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let comics = std::mem::take(&mut *results.lock().await);
    let mut failed: Vec<u32> = outcomes
        .iter()
        .filter_map(|o| match o {
            TaskOutcome::Failed(id) => Some(*id),
            _ => None,
        })
        .collect();
    failed.sort_unstable();

    let stored = outcomes.iter().filter(|o| matches!(o, TaskOutcome::Stored)).count();
    debug_assert_eq!(stored, comics.len());

    let report = BatchReport {
        comics,
        attempted: attempted.load(Ordering::Relaxed),
        failed,
        cancelled: cancel.is_cancelled(),
    };

    if report.cancelled {
        tracing::warn!(summary = %report, "Batch download cancelled");
    } else {
        tracing::info!(summary = %report, "Batch download completed");
    }
    Ok(report)
}

async fn run_task<S: ComicSource>(
    source: &S,
    id: u32,
    results: &Mutex<ComicSet>,
    attempted: &AtomicUsize,
    cancel: &CancellationToken,
) -> TaskOutcome {
    if cancel.is_cancelled() {
        return TaskOutcome::Cancelled;
    }
    attempted.fetch_add(1, Ordering::Relaxed);

    match source.fetch_comic(id, cancel).await {
        Ok(comic) => {
            let mut set = results.lock().await;
            if cancel.is_cancelled() {
                tracing::debug!(comic_id = id, "Discarding comic finished after cancellation");
                return TaskOutcome::Cancelled;
            }
            if comic.id != id {
                tracing::warn!(comic_id = id, stored_id = comic.id, "Source returned a different comic number");
                return TaskOutcome::Failed(id);
            }
            if set.insert(comic) {
                TaskOutcome::Stored
            } else {
                tracing::warn!(comic_id = id, "Comic already stored, keeping first copy");
                TaskOutcome::Failed(id)
            }
        }
        Err(e) if e.is_cancelled() => TaskOutcome::Cancelled,
        Err(e) => {
            tracing::warn!(comic_id = id, error = %e, "Comic download failed, skipping");
            TaskOutcome::Failed(id)
        }
    }
}
