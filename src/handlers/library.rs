//! Library strategy: metadata lookup, cached download, copy, signature gate.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::refuse_overwrite;
use super::traits::{PullOutcome, TransportHandler};
use crate::clients::{LibraryClient, LibraryQuery};
use crate::download::Downloader;
use crate::error::Result;
use crate::humanize::ByteSize;
use crate::materialize::materialize;
use crate::observability::Metrics;
use crate::reference::TransportKind;
use crate::request::PullRequest;
use crate::trust::{TrustDecision, TrustGate};

pub struct LibraryHandler {
    client: Arc<dyn LibraryClient>,
    downloader: Downloader,
    trust: TrustGate,
    metrics: Arc<Metrics>,
}

impl LibraryHandler {
    pub fn new(
        client: Arc<dyn LibraryClient>,
        downloader: Downloader,
        trust: TrustGate,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            client,
            downloader,
            trust,
            metrics,
        }
    }
}

#[async_trait]
impl TransportHandler for LibraryHandler {
    fn kind(&self) -> TransportKind {
        TransportKind::Library
    }

    async fn pull(&self, request: &PullRequest, cancel: &CancellationToken) -> Result<PullOutcome> {
        refuse_overwrite(request).await?;

        let query = LibraryQuery {
            base_uri: &request.library_uri,
            reference: request.reference.raw(),
            token: request.library_token.as_deref(),
        };

        let image = self.client.image_info(&query).await?;
        let name = request.reference.derived_name();

        let fetched = self
            .downloader
            .fetch(&query, &image.hash, &name, cancel)
            .await?;
        if fetched.cache_hit {
            self.metrics.cache_hit();
        } else {
            self.metrics.cache_miss();
            self.metrics.downloaded(fetched.bytes_transferred);
        }

        let copied = materialize(
            &fetched.entry.local_path,
            &request.destination,
            request.overwrite_allowed,
            cancel,
        )
        .await?;

        let trust = if request.unauthenticated_allowed || request.library_uri.is_empty() {
            warn!("Skipping container verification");
            TrustDecision::Skipped
        } else {
            self.trust.evaluate(&request.destination, cancel).await?
        };

        info!(
            destination = %request.destination.display(),
            size = %ByteSize(copied),
            ?trust,
            "Download complete"
        );

        Ok(PullOutcome {
            destination: request.destination.clone(),
            trust,
            bytes_transferred: fetched.bytes_transferred,
        })
    }
}

