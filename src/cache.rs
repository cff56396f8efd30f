//! Content-addressed cache of library images.
//!
//! Entries live at `<root>/library/<hash>/<name>`. An entry only ever
//! appears at that path through an atomic rename of a fully written and
//! verified temporary file from the same directory, so concurrent pulls of
//! the same hash converge on identical bytes and readers never see a
//! partial entry.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::digest::{self, ContentHash};

const LIBRARY_DIR: &str = "library";
const PARTIAL_PREFIX: &str = ".partial-";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CacheError>;

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A verified entry of the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub content_hash: ContentHash,
    pub logical_name: String,
    pub local_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LibraryCache {
    root: PathBuf,
    verify_on_hit: bool,
}

impl LibraryCache {
    pub fn new(root: impl Into<PathBuf>, verify_on_hit: bool) -> Self {
        Self {
            root: root.into(),
            verify_on_hit,
        }
    }

    /// Where the entry for `(hash, name)` lives. Nothing is created.
    pub fn path_for(&self, hash: &ContentHash, name: &str) -> PathBuf {
        self.root.join(LIBRARY_DIR).join(hash.as_str()).join(name)
    }

    /// Whether a usable entry exists.
    ///
    /// With `verify_on_hit`, the stored bytes are hashed again and a
    /// mismatching entry is removed and reported as absent.
    pub async fn exists(&self, hash: &ContentHash, name: &str) -> Result<bool> {
        let path = self.path_for(hash, name);

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => (),
            Ok(_) => return Ok(false),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(io_err(&path)(e)),
        }

        if !self.verify_on_hit {
            return Ok(true);
        }

        let actual = digest::hash_file(&path, hash.algorithm())
            .await
            .map_err(io_err(&path))?;

        if actual.matches(hash) {
            debug!(path = %path.display(), "Cache entry verified");
            return Ok(true);
        }

        warn!(
            path = %path.display(),
            expected = %hash,
            actual = %actual,
            "Discarding corrupt cache entry"
        );

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(false),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(&path)(e)),
        }
    }

    pub fn entry(&self, hash: &ContentHash, name: &str) -> CacheEntry {
        CacheEntry {
            content_hash: hash.clone(),
            logical_name: name.to_string(),
            local_path: self.path_for(hash, name),
        }
    }

    /// Open a temporary file next to the final location of `(hash, name)`.
    ///
    /// The temporary file is deleted when the returned value is dropped
    /// without [`StagedEntry::commit`].
    pub async fn stage(&self, hash: &ContentHash, name: &str) -> Result<StagedEntry> {
        let target = self.path_for(hash, name);
        let dir = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(io_err(&dir))?;

        let temp = tempfile::Builder::new()
            .prefix(PARTIAL_PREFIX)
            .tempfile_in(&dir)
            .map_err(io_err(&dir))?;

        let (file, temp) = temp.into_parts();
        debug!(temp = %temp.display(), "Staging cache entry");

        Ok(StagedEntry {
            file: tokio::fs::File::from_std(file),
            temp,
            entry: self.entry(hash, name),
        })
    }
}

/// An entry being written. See [`LibraryCache::stage`].
#[derive(Debug)]
pub struct StagedEntry {
    file: tokio::fs::File,
    temp: TempPath,
    entry: CacheEntry,
}

impl StagedEntry {
    pub fn file(&mut self) -> &mut tokio::fs::File {
        &mut self.file
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Flush the written bytes to disk.
    pub async fn finish_writing(&mut self) -> Result<()> {
        let path = self.temp.to_path_buf();
        self.file.flush().await.map_err(io_err(&path))?;
        self.file.sync_all().await.map_err(io_err(&path))
    }

    /// Move the temporary file into place. The caller is responsible for
    /// having verified its content.
    pub async fn commit(self) -> Result<CacheEntry> {
        let StagedEntry { file, temp, entry } = self;
        drop(file);

        let target = entry.local_path.clone();
        tokio::task::spawn_blocking(move || temp.persist(&target))
            .await
            .map_err(|e| io_err(&entry.local_path)(io::Error::other(e)))?
            .map_err(|e| io_err(&entry.local_path)(e.error))?;

        debug!(path = %entry.local_path.display(), "Cache entry committed");
        Ok(entry)
    }
}
