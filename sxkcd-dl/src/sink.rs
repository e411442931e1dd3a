//! Indexing collaborator boundary
//!
//! The downloader hands finished comics to a [`ComicSink`] and never looks at
//! how the sink stores them. [`ArchiveSink`] keeps them in the JSON archive
//! file; a search index would implement the same trait.

use crate::archive::{read_archive, write_archive};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use sxkcd_common::{Comic, ComicSet, Error, Result};
use tokio::sync::Mutex;

/// Destination for downloaded comics
#[async_trait]
pub trait ComicSink: Send + Sync {
    /// Whether a comic with this number is already stored
    async fn exists(&self, id: u32) -> Result<bool>;

    /// Store one comic; a comic already present is left unchanged
    async fn add(&self, comic: Comic) -> Result<()>;
}

/// Sink backed by the archive file
///
/// Every `add` is a read-modify-write of the whole file, serialized by a
/// mutex so concurrent adds through one sink never lose updates.
#[derive(Debug)]
pub struct ArchiveSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ArchiveSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current archive contents; a file that does not exist yet is empty
    pub async fn load(&self) -> Result<ComicSet> {
        match read_archive(&self.path).await {
            Ok(set) => Ok(set),
            Err(Error::NotFound(_)) => Ok(ComicSet::new()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ComicSink for ArchiveSink {
    async fn exists(&self, id: u32) -> Result<bool> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.contains(id))
    }

    async fn add(&self, comic: Comic) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut set = self.load().await?;
        let id = comic.id;
        if !set.insert(comic) {
            tracing::debug!(comic_id = id, "Comic already archived");
            return Ok(());
        }
        write_archive(&set, &self.path).await?;
        tracing::info!(comic_id = id, path = %self.path.display(), "Comic archived");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn comic(id: u32, title: &str) -> Comic {
        Comic {
            id,
            title: title.to_string(),
            alt: None,
            transcript: None,
            image_url: String::new(),
            explanation: String::new(),
            date: Utc.with_ymd_and_hms(2020, 2, 2, 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let sink = ArchiveSink::new(dir.path().join("comics.json"));

        assert!(!sink.exists(1).await.unwrap());
        assert!(sink.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_persists_and_keeps_first_copy() {
        let dir = TempDir::new().unwrap();
        let sink = ArchiveSink::new(dir.path().join("comics.json"));

        sink.add(comic(2000, "first")).await.unwrap();
        sink.add(comic(2000, "second")).await.unwrap();

        assert!(sink.exists(2000).await.unwrap());
        let reopened = ArchiveSink::new(sink.path());
        let set = reopened.load().await.unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(2000).unwrap().title, "first");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(ArchiveSink::new(dir.path().join("comics.json")));

        let handles: Vec<_> = (1..=20)
            .map(|id| {
                let sink = Arc::clone(&sink);
                tokio::spawn(async move { sink.add(comic(id, "c")).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(sink.load().await.unwrap().len(), 20);
    }
}
