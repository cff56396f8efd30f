//! Copy a verified image to its destination.

use std::io;
use std::path::Path;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{PullError, Result};

#[cfg(unix)]
const DESTINATION_MODE: u32 = 0o777;

/// Copy `source` to `destination`. Returns the number of bytes copied.
///
/// Without `overwrite` the destination must not exist yet. A failed or
/// cancelled copy removes whatever was written to `destination`.
pub async fn materialize(
    source: &Path,
    destination: &Path,
    overwrite: bool,
    cancel: &CancellationToken,
) -> Result<u64> {
    let mut reader = File::open(source)
        .await
        .map_err(|e| PullError::fs(source, e))?;

    let mut writer = open_destination(destination, overwrite)
        .await
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => PullError::UserInput(format!(
                "image file {} already exists - will not overwrite",
                destination.display()
            )),
            _ => PullError::fs(destination, e),
        })?;

    let copied = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PullError::Interrupted),
        copied = copy(&mut reader, &mut writer) => copied.map_err(|e| PullError::fs(destination, e)),
    };
    drop(writer);

    match copied {
        Ok(n) => {
            debug!(source = %source.display(), destination = %destination.display(), bytes = n, "Image copied");
            Ok(n)
        }
        Err(e) => {
            discard(destination).await;
            Err(e)
        }
    }
}

async fn copy(reader: &mut File, writer: &mut File) -> io::Result<u64> {
    let n = tokio::io::copy(reader, writer).await?;
    writer.flush().await?;
    writer.sync_all().await?;
    Ok(n)
}

async fn open_destination(path: &Path, overwrite: bool) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true);

    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    #[cfg(unix)]
    options.mode(DESTINATION_MODE);

    options.open(path).await
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => (),
        Err(e) if e.kind() == io::ErrorKind::NotFound => (),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial image"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_copy_to_new_destination() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("cached");
        let destination = dir.path().join("alpine_latest");
        std::fs::write(&source, b"image").unwrap();

        let n = materialize(&source, &destination, false, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(n, 5);
        assert_eq!(std::fs::read(&destination).unwrap(), b"image");
    }

    #[tokio::test]
    async fn test_existing_destination_requires_overwrite() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("cached");
        let destination = dir.path().join("alpine_latest");
        std::fs::write(&source, b"image").unwrap();
        std::fs::write(&destination, b"a much older image").unwrap();

        let err = materialize(&source, &destination, false, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PullError::UserInput(_)));
        assert_eq!(std::fs::read(&destination).unwrap(), b"a much older image");

        materialize(&source, &destination, true, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), b"image");
    }

    #[tokio::test]
    async fn test_missing_source_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("alpine_latest");

        let err = materialize(
            &dir.path().join("missing"),
            &destination,
            false,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PullError::Filesystem { .. }));
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_cancelled_copy_removes_destination() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("cached");
        let destination = dir.path().join("alpine_latest");
        std::fs::write(&source, b"image").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = materialize(&source, &destination, false, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, PullError::Interrupted));
        assert!(!destination.exists());
    }
}
