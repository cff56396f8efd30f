//! Plain HTTP(S) download straight to the destination.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{ClientError, NetFetcher, Result, get, stream_body};

#[derive(Clone)]
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ClientError + '_ {
    move |source| ClientError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl NetFetcher for HttpFetcher {
    /// The body is written to a temporary file in the destination directory
    /// and renamed over `destination` once complete.
    async fn fetch(
        &self,
        destination: &Path,
        url: &str,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        if !overwrite && tokio::fs::try_exists(destination).await.unwrap_or(false) {
            return Err(ClientError::AlreadyExists(destination.to_path_buf()));
        }

        let response = get(&self.http, url, None).await?;

        let dir = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let (file, temp) = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(dir)
            .map_err(io_error(dir))?
            .into_parts();

        let mut file = tokio::fs::File::from_std(file);
        let written = match stream_body(response, &mut file, cancel).await {
            Ok(n) => n,
            Err(ClientError::Sink(source)) => return Err(io_error(&temp)(source)),
            Err(e) => return Err(e),
        };
        file.sync_all().await.map_err(io_error(&temp))?;
        drop(file);

        let persisted = if overwrite {
            temp.persist(destination)
        } else {
            temp.persist_noclobber(destination)
        };

        match persisted {
            Ok(()) => (),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                return Err(ClientError::AlreadyExists(destination.to_path_buf()));
            }
            Err(e) => return Err(io_error(destination)(e.error)),
        }

        info!(url, destination = %destination.display(), bytes = written, "Download complete");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::tests::serve;
    use axum::{Router, http::StatusCode, routing::get};
    use tempfile::TempDir;

    fn app() -> Router {
        Router::new()
            .route("/images/lolcow.sif", get(|| async { "moo" }))
            .route("/missing.sif", get(|| async { StatusCode::NOT_FOUND }))
    }

    #[tokio::test]
    async fn test_fetch_to_destination() {
        let base = serve(app()).await;
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("lolcow.sif");

        let fetcher = HttpFetcher::new(reqwest::Client::new());
        let written = fetcher
            .fetch(
                &destination,
                &format!("{base}/images/lolcow.sif"),
                false,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(written, 3);
        assert_eq!(std::fs::read(&destination).unwrap(), b"moo");
        // Only the destination remains in the directory.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_existing_destination_is_kept_without_overwrite() {
        let base = serve(app()).await;
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("lolcow.sif");
        std::fs::write(&destination, b"old").unwrap();

        let fetcher = HttpFetcher::new(reqwest::Client::new());
        let err = fetcher
            .fetch(
                &destination,
                &format!("{base}/images/lolcow.sif"),
                false,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::AlreadyExists(_)));
        assert_eq!(std::fs::read(&destination).unwrap(), b"old");

        fetcher
            .fetch(
                &destination,
                &format!("{base}/images/lolcow.sif"),
                true,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), b"moo");
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_no_file() {
        let base = serve(app()).await;
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("missing.sif");

        let fetcher = HttpFetcher::new(reqwest::Client::new());
        let err = fetcher
            .fetch(
                &destination,
                &format!("{base}/missing.sif"),
                false,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Status { status: 404, .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
