use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use super::direct::{HubHandler, NetHandler, RegistryHandler};
use super::library::LibraryHandler;
use super::traits::TransportHandler;
use crate::cache::LibraryCache;
use crate::clients::{
    self, CommandRegistryPuller, CommandVerifier, HttpFetcher, HttpLibraryClient, HubClient,
    LibraryClient, NetFetcher, RegistryPuller, ShubClient, SignatureVerifier, StdinPrompt,
    TrustPrompt,
};
use crate::config::Config;
use crate::download::Downloader;
use crate::error::Result;
use crate::observability::Metrics;
use crate::reference::TransportKind;
use crate::trust::TrustGate;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no handler registered for {0} references")]
    NotFound(TransportKind),
}

/// Everything a pull talks to outside the process.
#[derive(Clone)]
pub struct Collaborators {
    pub library: Arc<dyn LibraryClient>,
    pub hub: Arc<dyn HubClient>,
    pub net: Arc<dyn NetFetcher>,
    pub registry: Arc<dyn RegistryPuller>,
    pub verifier: Arc<dyn SignatureVerifier>,
    pub prompt: Arc<dyn TrustPrompt>,
}

impl Collaborators {
    /// The production clients, configured from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = clients::http_client(&config.http)?;

        if !config.trust.has_verifier() {
            warn!(
                "No signature verification command configured (trust.verify_command); \
                 unauthenticated library images will need confirmation"
            );
        }

        Ok(Self {
            library: Arc::new(HttpLibraryClient::new(http.clone())),
            hub: Arc::new(ShubClient::new(http.clone(), config.shub.host.clone())),
            net: Arc::new(HttpFetcher::new(http)),
            registry: Arc::new(CommandRegistryPuller::new(
                config.registry.pull_command.as_deref(),
            )),
            verifier: Arc::new(CommandVerifier::new(config.trust.verify_command.as_deref())),
            prompt: Arc::new(StdinPrompt::new(config.trust.prompt_timeout())),
        })
    }
}

/// Transport kinds mapped to the handler serving them
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<TransportKind, Arc<dyn TransportHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under its own kind, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn TransportHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    /// Handler for `kind`, falling back to the registry handler.
    pub fn get(&self, kind: TransportKind) -> std::result::Result<Arc<dyn TransportHandler>, RegistryError> {
        self.handlers
            .get(&kind)
            .or_else(|| self.handlers.get(&TransportKind::Registry))
            .cloned()
            .ok_or(RegistryError::NotFound(kind))
    }

    pub fn has_handler(&self, kind: TransportKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Registry with the built-in strategies wired to `collaborators`.
    pub fn with_collaborators(
        collaborators: Collaborators,
        config: &Config,
        metrics: Arc<Metrics>,
    ) -> Self {
        let cache = LibraryCache::new(config.cache.root_dir(), config.cache.verify_on_hit);
        let downloader = Downloader::new(collaborators.library.clone(), cache);
        let trust = TrustGate::new(
            collaborators.verifier,
            collaborators.prompt,
            config.trust.on_verification_error,
        );

        let mut registry = Self::new();
        registry.register(Arc::new(LibraryHandler::new(
            collaborators.library,
            downloader,
            trust,
            metrics,
        )));
        registry.register(Arc::new(HubHandler::new(collaborators.hub)));
        registry.register(Arc::new(NetHandler::new(collaborators.net)));
        registry.register(Arc::new(RegistryHandler::new(collaborators.registry)));
        registry
    }

    /// Registry with the production clients.
    pub fn with_defaults(config: &Config, metrics: Arc<Metrics>) -> Result<Self> {
        let collaborators = Collaborators::from_config(config)?;
        Ok(Self::with_collaborators(collaborators, config, metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::PullOutcome;
    use crate::error::PullError;
    use crate::request::PullRequest;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct Named(TransportKind);

    #[async_trait]
    impl TransportHandler for Named {
        fn kind(&self) -> TransportKind {
            self.0
        }

        async fn pull(
            &self,
            _request: &PullRequest,
            _cancel: &CancellationToken,
        ) -> std::result::Result<PullOutcome, PullError> {
            unreachable!()
        }
    }

    #[test]
    fn test_unknown_kind_falls_back_to_registry() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(Named(TransportKind::Library)));
        registry.register(Arc::new(Named(TransportKind::Registry)));

        assert_eq!(
            registry.get(TransportKind::Library).unwrap().kind(),
            TransportKind::Library
        );
        assert_eq!(
            registry.get(TransportKind::Hub).unwrap().kind(),
            TransportKind::Registry
        );
        assert!(!registry.has_handler(TransportKind::Hub));
    }

    #[test]
    fn test_empty_registry() {
        let registry = HandlerRegistry::new();
        assert!(matches!(
            registry.get(TransportKind::Http),
            Err(RegistryError::NotFound(TransportKind::Http))
        ));
    }

    #[test]
    fn test_defaults_cover_every_kind() {
        let registry =
            HandlerRegistry::with_defaults(&Config::default(), Arc::new(Metrics::new())).unwrap();

        for kind in [
            TransportKind::Library,
            TransportKind::Hub,
            TransportKind::Http,
            TransportKind::Registry,
        ] {
            assert!(registry.has_handler(kind), "{kind}");
            assert_eq!(registry.get(kind).unwrap().kind(), kind);
        }
    }
}
