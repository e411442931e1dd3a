//! # sxkcd-dl
//!
//! Bulk acquisition pipeline for xkcd comics and their explainxkcd
//! explanations:
//! - `endpoints`: request URLs for both upstream APIs
//! - `client` / `retry`: size-limited JSON GETs with exponential backoff
//! - `assemble` / `explain`: merge both payloads into one [`Comic`]
//! - `batch`: bounded-concurrency download of a comic range
//! - `archive` / `sink`: the JSON artifact and the indexing boundary
//! - `watcher`: periodic poll for newly published comics
//!
//! [`Comic`]: sxkcd_common::Comic

pub mod archive;
pub mod assemble;
pub mod batch;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod explain;
pub mod retry;
pub mod sink;
pub mod watcher;

pub use batch::{fetch_all, BatchReport, ComicSource, MISSING_COMIC};
pub use client::XkcdClient;
pub use config::DownloadSettings;
pub use endpoints::{ComicId, Endpoints};
pub use error::{FetchError, SourceKind};
pub use retry::RetryPolicy;
pub use sink::{ArchiveSink, ComicSink};
pub use watcher::{TickOutcome, Watcher};
