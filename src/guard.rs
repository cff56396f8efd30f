//! Removes the in-progress image when the process is asked to terminate.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::EXIT_INTERRUPTED;

/// Background watcher tied to one destination path.
///
/// On interrupt or terminate the guard cancels its token, deletes the
/// destination and ends the process. Dropping or disarming the guard stops
/// the watcher.
#[derive(Debug)]
pub struct InterruptGuard {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl InterruptGuard {
    /// Watch for SIGINT and SIGTERM. The handlers are registered before
    /// this returns, so it must be called before `destination` is opened.
    pub fn install(destination: impl Into<PathBuf>) -> io::Result<Self> {
        let signal = termination_signal()?;
        Ok(Self::watch(destination, signal, |code| {
            std::process::exit(code)
        }))
    }

    /// Watch `signal` instead of the process signals and call `exit` instead
    /// of terminating the process.
    pub fn watch<S, E>(destination: impl Into<PathBuf>, signal: S, exit: E) -> Self
    where
        S: Future<Output = ()> + Send + 'static,
        E: FnOnce(i32) + Send + 'static,
    {
        let destination = destination.into();
        let token = CancellationToken::new();
        let cancel = token.clone();

        let task = tokio::spawn(async move {
            signal.await;
            warn!(destination = %destination.display(), "Termination requested, removing incomplete image");

            cancel.cancel();
            remove_incomplete(&destination).await;
            exit(i32::from(EXIT_INTERRUPTED));
        });

        Self { token, task }
    }

    /// Cancelled as soon as a termination request arrives.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn disarm(self) {
        debug!("Interrupt guard disarmed");
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn remove_incomplete(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed incomplete image"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => (),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove incomplete image"),
    }
}

#[cfg(unix)]
fn termination_signal() -> io::Result<impl Future<Output = ()> + Send + 'static> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => {},
            _ = terminate.recv() => {},
        }
    })
}

#[cfg(not(unix))]
fn termination_signal() -> io::Result<impl Future<Output = ()> + Send + 'static> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Unable to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    })
}
