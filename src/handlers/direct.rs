//! Strategies that fetch straight to the destination: legacy hub, plain
//! HTTP(S) and registry references. None of them pass through the cache or
//! the signature gate.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::traits::{PullOutcome, TransportHandler};
use super::{discard_destination, refuse_overwrite};
use crate::clients::{ClientError, HubClient, NetFetcher, RegistryOptions, RegistryPuller};
use crate::error::Result;
use crate::humanize::ByteSize;
use crate::reference::TransportKind;
use crate::request::PullRequest;
use crate::trust::TrustDecision;

/// Turn a collaborator result into an outcome, removing a destination this
/// pull created when the collaborator failed.
async fn finish(
    kind: TransportKind,
    request: &PullRequest,
    existed: bool,
    result: std::result::Result<u64, ClientError>,
) -> Result<PullOutcome> {
    match result {
        Ok(bytes) => {
            warn!(transport = %kind, "Skipping signature verification; not supported for this transport");
            info!(
                destination = %request.destination.display(),
                size = %ByteSize(bytes),
                "Download complete"
            );
            Ok(PullOutcome {
                destination: request.destination.clone(),
                trust: TrustDecision::Skipped,
                bytes_transferred: bytes,
            })
        }
        // Someone else created the file in the meantime; it is not ours to remove.
        Err(e @ ClientError::AlreadyExists(_)) => Err(e.into()),
        Err(e) => {
            if !existed {
                discard_destination(&request.destination).await;
            }
            Err(e.into())
        }
    }
}

pub struct HubHandler {
    client: Arc<dyn HubClient>,
}

impl HubHandler {
    pub fn new(client: Arc<dyn HubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TransportHandler for HubHandler {
    fn kind(&self) -> TransportKind {
        TransportKind::Hub
    }

    async fn pull(&self, request: &PullRequest, cancel: &CancellationToken) -> Result<PullOutcome> {
        let existed = refuse_overwrite(request).await?;

        let result = self
            .client
            .pull(
                &request.destination,
                request.reference.raw(),
                request.overwrite_allowed,
                request.https_disabled,
                cancel,
            )
            .await;

        finish(self.kind(), request, existed, result).await
    }
}

pub struct NetHandler {
    fetcher: Arc<dyn NetFetcher>,
}

impl NetHandler {
    pub fn new(fetcher: Arc<dyn NetFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl TransportHandler for NetHandler {
    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }

    async fn pull(&self, request: &PullRequest, cancel: &CancellationToken) -> Result<PullOutcome> {
        let existed = refuse_overwrite(request).await?;

        let result = self
            .fetcher
            .fetch(
                &request.destination,
                request.reference.raw(),
                request.overwrite_allowed,
                cancel,
            )
            .await;

        finish(self.kind(), request, existed, result).await
    }
}

pub struct RegistryHandler {
    puller: Arc<dyn RegistryPuller>,
}

impl RegistryHandler {
    pub fn new(puller: Arc<dyn RegistryPuller>) -> Self {
        Self { puller }
    }

    fn options(request: &PullRequest) -> RegistryOptions {
        RegistryOptions {
            tmp_dir: request.tmp_dir.clone(),
            overwrite: request.overwrite_allowed,
            no_https: request.https_disabled,
            credentials: request.registry_credentials.clone(),
        }
    }
}

#[async_trait]
impl TransportHandler for RegistryHandler {
    fn kind(&self) -> TransportKind {
        TransportKind::Registry
    }

    async fn pull(&self, request: &PullRequest, cancel: &CancellationToken) -> Result<PullOutcome> {
        let existed = refuse_overwrite(request).await?;

        let destination: &Path = &request.destination;
        let result = self
            .puller
            .pull(
                destination,
                request.reference.raw(),
                &Self::options(request),
                cancel,
            )
            .await;

        finish(self.kind(), request, existed, result).await
    }
}
