//! Transport strategies for imgpull
//!
//! Each transport family is served by a [`TransportHandler`]:
//!
//! - [`LibraryHandler`] - library references, through the cache and the
//!   signature gate
//! - [`HubHandler`] - legacy hub references
//! - [`NetHandler`] - plain `http://` and `https://` URLs
//! - [`RegistryHandler`] - every other transport tag
//!
//! [`HandlerRegistry`] maps a [`TransportKind`](crate::reference::TransportKind)
//! to its handler.
//!
//! ## Example
//!
//! ```rust,ignore
//! use imgpull::handlers::HandlerRegistry;
//!
//! let registry = HandlerRegistry::with_defaults(&config, metrics)?;
//! let handler = registry.get(request.reference.kind())?;
//! let outcome = handler.pull(&request, &cancel).await?;
//! ```

mod direct;
mod library;
mod registry;
mod traits;

pub use direct::{HubHandler, NetHandler, RegistryHandler};
pub use library::LibraryHandler;
pub use registry::{Collaborators, HandlerRegistry, RegistryError};
pub use traits::{PullOutcome, TransportHandler};

use std::io;
use std::path::Path;

use tracing::warn;

use crate::error::{PullError, Result};
use crate::request::PullRequest;

/// Fail when the destination exists and may not be overwritten.
/// Returns whether the destination exists.
pub(crate) async fn refuse_overwrite(request: &PullRequest) -> Result<bool> {
    let existed = match tokio::fs::symlink_metadata(&request.destination).await {
        Ok(_) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => return Err(PullError::fs(&request.destination, e)),
    };

    if existed && !request.overwrite_allowed {
        return Err(PullError::UserInput(format!(
            "image file {} already exists - will not overwrite",
            request.destination.display()
        )));
    }

    Ok(existed)
}

pub(crate) async fn discard_destination(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => (),
        Err(e) if e.kind() == io::ErrorKind::NotFound => (),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove incomplete image"),
    }
}
