//! Top-level pull orchestration.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use crate::cli::PullArgs;
use crate::config::Config;
use crate::error::{PullError, Result};
use crate::guard::InterruptGuard;
use crate::handlers::{Collaborators, HandlerRegistry};
use crate::observability::Metrics;
use crate::request::PullRequest;

pub use crate::handlers::PullOutcome;

/// Dispatches pull requests to the handler for their transport.
pub struct Puller {
    handlers: HandlerRegistry,
    metrics: Arc<Metrics>,
}

impl Puller {
    pub fn new(handlers: HandlerRegistry, metrics: Arc<Metrics>) -> Self {
        Self { handlers, metrics }
    }

    /// Puller backed by the production clients.
    pub fn from_config(config: &Config) -> Result<Self> {
        let metrics = Arc::new(Metrics::new());
        let handlers = HandlerRegistry::with_defaults(config, metrics.clone())?;
        Ok(Self::new(handlers, metrics))
    }

    /// Puller using the given collaborators, for embedding and tests.
    pub fn with_collaborators(collaborators: Collaborators, config: &Config) -> Self {
        let metrics = Arc::new(Metrics::new());
        let handlers = HandlerRegistry::with_collaborators(collaborators, config, metrics.clone());
        Self::new(handlers, metrics)
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub async fn pull(
        &self,
        request: &PullRequest,
        cancel: &CancellationToken,
    ) -> Result<PullOutcome> {
        let pull_id = Uuid::now_v7();
        let span = info_span!("pull", %pull_id, reference = %request.reference);

        let handler = self.handlers.get(request.reference.kind())?;

        async {
            debug!(strategy = %handler.kind(), ?request, "Dispatching pull");
            handler.pull(request, cancel).await
        }
        .instrument(span)
        .await
    }
}

/// Run `imgpull pull` end to end: settings, request, interrupt guard, pull.
pub async fn execute(args: &PullArgs) -> Result<PullOutcome> {
    let config = Config::load()?;
    let request = PullRequest::from_args(args)?;

    // Signal handlers go in before anything can create the destination.
    let guard = InterruptGuard::install(&request.destination)
        .map_err(|e| PullError::fs(&request.destination, e))?;

    let puller = Puller::from_config(&config)?;
    let result = puller.pull(&request, &guard.token()).await;
    guard.disarm();

    debug!(metrics = ?puller.metrics().snapshot(), "Pull finished");
    result
}
