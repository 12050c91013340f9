//! Saved page store
//!
//! One file per crawled page. Names combine a UTC timestamp with the worker
//! id and a store-wide sequence number, and files are created exclusively,
//! so concurrent workers never overwrite each other without any locking.

use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Attempts before giving up on finding a free file name
const MAX_NAME_ATTEMPTS: u32 = 16;

/// A page persisted by a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPage {
    /// Unique identifier, also the file stem
    pub id: String,
    pub path: PathBuf,
    pub url: String,
}

/// Directory of saved pages
#[derive(Debug)]
pub struct PageStore {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl PageStore {
    /// Opens the store, creating the directory if needed
    pub async fn create(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            sequence: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `content` to a new, never-before-used file
    pub async fn save(
        &self,
        worker_id: usize,
        url: &str,
        content: &[u8],
    ) -> std::io::Result<SavedPage> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
            let id = format!(
                "{}-w{}-{:06}",
                Utc::now().format("%Y%m%dT%H%M%S%.9fZ"),
                worker_id,
                seq
            );
            let path = self.dir.join(format!("{}.html", id));

            let mut file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                // Another process wrote the same name; draw a new one
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            };

            file.write_all(content).await?;
            file.flush().await?;

            return Ok(SavedPage {
                id,
                path,
                url: url.to_string(),
            });
        }

        Err(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free page name in {}", self.dir.display()),
        ))
    }

    /// Number of saved page files currently in the directory
    pub async fn count(&self) -> std::io::Result<usize> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().is_some_and(|ext| ext == "html") {
                count += 1;
            }
        }
        Ok(count)
    }
}
