//! Background watcher for newly published comics
//!
//! Every interval the watcher asks xkcd for the latest comic number, and if
//! the sink does not have that comic yet, fetches it and adds it. A tick that
//! starts while another is still running is skipped. Tick errors are logged
//! and the watcher keeps going.

use crate::batch::ComicSource;
use crate::sink::ComicSink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sxkcd_common::Result;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What one watcher tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Latest comic was fetched and added
    Added(u32),
    /// Latest comic was already in the sink
    AlreadyPresent(u32),
    /// Another tick was still running
    Busy,
}

/// Periodic latest-comic poller
pub struct Watcher<S: ComicSource> {
    source: Arc<S>,
    sink: Arc<dyn ComicSink>,
    interval: Duration,
    busy: AtomicBool,
}

/// Clears the busy flag on every exit path of a tick
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: ComicSource> Watcher<S> {
    pub fn new(source: Arc<S>, sink: Arc<dyn ComicSink>, interval: Duration) -> Self {
        Self {
            source,
            sink,
            interval,
            busy: AtomicBool::new(false),
        }
    }

    /// Check for a new comic once
    pub async fn tick(&self, cancel: &CancellationToken) -> Result<TickOutcome> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Fetching already in progress, skipping tick");
            return Ok(TickOutcome::Busy);
        }
        let _guard = BusyGuard(&self.busy);

        let latest = self.source.latest_num(cancel).await?;
        if self.sink.exists(latest).await? {
            info!(comic_id = latest, "Latest comic already exists, skipping");
            return Ok(TickOutcome::AlreadyPresent(latest));
        }

        info!(comic_id = latest, "Fetching latest comic");
        let start = Instant::now();
        let comic = self.source.fetch_comic(latest, cancel).await?;
        self.sink.add(comic).await?;

        info!(
            comic_id = latest,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetched latest comic"
        );
        Ok(TickOutcome::Added(latest))
    }

    /// Tick every interval until `cancel` fires.
    ///
    /// The first tick happens one full interval after start.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = time::interval_at(Instant::now() + self.interval, self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = self.interval.as_secs(), "Watcher started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    match self.tick(&cancel).await {
                        Ok(outcome) => debug!(?outcome, "Watcher tick finished"),
                        Err(e) => warn!(error = %e, "Watcher tick failed"),
                    }
                }
            }
        }

        info!("Watcher stopped");
    }

    /// Run the watcher on its own task
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }
}
