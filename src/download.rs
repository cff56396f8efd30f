//! Library image download into the cache, with end-to-end hash check.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, LibraryCache};
use crate::clients::{ClientError, LibraryClient, LibraryQuery};
use crate::digest::{self, ContentHash};
use crate::error::{PullError, Result};

/// Result of [`Downloader::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub entry: CacheEntry,
    /// Zero on a cache hit.
    pub bytes_transferred: u64,
    pub cache_hit: bool,
}

#[derive(Clone)]
pub struct Downloader {
    client: Arc<dyn LibraryClient>,
    cache: LibraryCache,
}

impl Downloader {
    pub fn new(client: Arc<dyn LibraryClient>, cache: LibraryCache) -> Self {
        Self { client, cache }
    }

    /// Make sure the cache holds `(expected, name)`, downloading it if needed.
    ///
    /// Freshly downloaded bytes are hashed again and only committed to the
    /// cache when they match `expected`. On any failure the staged file is
    /// discarded and the cache is left as it was.
    pub async fn fetch(
        &self,
        query: &LibraryQuery<'_>,
        expected: &ContentHash,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Fetched> {
        if self.cache.exists(expected, name).await? {
            let entry = self.cache.entry(expected, name);
            info!(path = %entry.local_path.display(), "Using cached image");
            return Ok(Fetched {
                entry,
                bytes_transferred: 0,
                cache_hit: true,
            });
        }

        let mut staged = self.cache.stage(expected, name).await?;
        let temp = staged.temp_path().to_path_buf();

        info!(reference = query.reference, hash = %expected, "Downloading library image");

        let written = match self.client.download(query, staged.file(), cancel).await {
            Ok(n) => n,
            Err(ClientError::Sink(source)) => return Err(PullError::fs(&temp, source)),
            Err(e) => return Err(e.into()),
        };
        staged.finish_writing().await?;

        let actual = digest::hash_file(&temp, expected.algorithm())
            .await
            .map_err(|e| PullError::fs(&temp, e))?;

        if !actual.matches(expected) {
            warn!(expected = %expected, actual = %actual, "Downloaded image failed hash check");
            drop(staged);
            return Err(PullError::IntegrityMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }

        let entry = staged.commit().await?;
        debug!(path = %entry.local_path.display(), bytes = written, "Image cached");

        Ok(Fetched {
            entry,
            bytes_transferred: written,
            cache_hit: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{LibraryImage, Result as ClientResult};
    use crate::digest::HashAlgorithm;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tokio::io::{AsyncWrite, AsyncWriteExt};

    struct StaticLibrary {
        body: &'static [u8],
        downloads: AtomicUsize,
    }

    impl StaticLibrary {
        fn new(body: &'static [u8]) -> Arc<Self> {
            Arc::new(Self {
                body,
                downloads: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LibraryClient for StaticLibrary {
        async fn image_info(&self, _query: &LibraryQuery<'_>) -> ClientResult<LibraryImage> {
            Ok(LibraryImage {
                hash: ContentHash::of_bytes(HashAlgorithm::SHA256, self.body),
                size: Some(self.body.len() as u64),
            })
        }

        async fn download(
            &self,
            _query: &LibraryQuery<'_>,
            sink: &mut (dyn AsyncWrite + Send + Unpin),
            cancel: &CancellationToken,
        ) -> ClientResult<u64> {
            if cancel.is_cancelled() {
                return Err(ClientError::Interrupted);
            }
            self.downloads.fetch_add(1, Ordering::SeqCst);
            sink.write_all(self.body).await.map_err(ClientError::Sink)?;
            Ok(self.body.len() as u64)
        }
    }

    const QUERY: LibraryQuery<'static> = LibraryQuery {
        base_uri: "https://library.example",
        reference: "library://alpine",
        token: None,
    };

    fn hash_of(data: &[u8]) -> ContentHash {
        ContentHash::of_bytes(HashAlgorithm::SHA256, data)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let dir = TempDir::new().unwrap();
        let library = StaticLibrary::new(b"alpine image");
        let downloader = Downloader::new(library.clone(), LibraryCache::new(dir.path(), true));
        let hash = hash_of(b"alpine image");

        let first = downloader
            .fetch(&QUERY, &hash, "alpine_latest", &CancellationToken::new())
            .await
            .unwrap();
        assert!(!first.cache_hit);
        assert_eq!(first.bytes_transferred, 12);
        assert_eq!(std::fs::read(&first.entry.local_path).unwrap(), b"alpine image");

        let second = downloader
            .fetch(&QUERY, &hash, "alpine_latest", &CancellationToken::new())
            .await
            .unwrap();
        assert!(second.cache_hit);
        assert_eq!(second.bytes_transferred, 0);
        assert_eq!(library.downloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hash_mismatch_leaves_no_entry() {
        let dir = TempDir::new().unwrap();
        let cache = LibraryCache::new(dir.path(), true);
        let downloader = Downloader::new(StaticLibrary::new(b"tampered"), cache.clone());
        let declared = hash_of(b"original");

        let err = downloader
            .fetch(&QUERY, &declared, "alpine_latest", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PullError::IntegrityMismatch { .. }));
        assert!(!cache.path_for(&declared, "alpine_latest").exists());

        let entry_dir = cache.path_for(&declared, "alpine_latest");
        let leftovers = std::fs::read_dir(entry_dir.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_cancelled_download_is_interrupted() {
        let dir = TempDir::new().unwrap();
        let cache = LibraryCache::new(dir.path(), true);
        let downloader = Downloader::new(StaticLibrary::new(b"alpine image"), cache.clone());
        let hash = hash_of(b"alpine image");

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = downloader
            .fetch(&QUERY, &hash, "alpine_latest", &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, PullError::Interrupted));
        assert!(!cache.path_for(&hash, "alpine_latest").exists());
    }
}
