use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::PullError;
use crate::reference::TransportKind;
use crate::request::PullRequest;
use crate::trust::TrustDecision;

/// What a successful pull produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullOutcome {
    pub destination: PathBuf,
    pub trust: TrustDecision,
    /// Bytes moved over the network. Zero when served from the cache.
    pub bytes_transferred: u64,
}

/// Strategy for one family of transports.
///
/// A handler owns the destination for the duration of the call: on error
/// the destination is either untouched (it existed before and was not to
/// be overwritten) or removed.
#[async_trait]
pub trait TransportHandler: Send + Sync {
    fn kind(&self) -> TransportKind;

    async fn pull(
        &self,
        request: &PullRequest,
        cancel: &CancellationToken,
    ) -> Result<PullOutcome, PullError>;
}
