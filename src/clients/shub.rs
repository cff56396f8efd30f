//! Legacy hub client: resolve the container manifest, then fetch the image
//! URL it points to.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{HttpFetcher, HubClient, NetFetcher, Result, get};
use crate::reference;

#[derive(Debug, Deserialize)]
struct Manifest {
    image: String,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Clone)]
pub struct ShubClient {
    http: reqwest::Client,
    fetcher: HttpFetcher,
    host: String,
}

impl ShubClient {
    pub fn new(http: reqwest::Client, host: impl Into<String>) -> Self {
        Self {
            fetcher: HttpFetcher::new(http.clone()),
            http,
            host: host.into(),
        }
    }

    fn manifest_url(&self, reference: &str, no_https: bool) -> String {
        let scheme = if no_https { "http" } else { "https" };
        let (_, locator) = reference::split(reference);
        format!(
            "{scheme}://{}/api/container/{}",
            self.host.trim_end_matches('/'),
            locator.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl HubClient for ShubClient {
    async fn pull(
        &self,
        destination: &Path,
        reference: &str,
        overwrite: bool,
        no_https: bool,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let url = self.manifest_url(reference, no_https);
        let body = get(&self.http, &url, None).await?.bytes().await?;
        let manifest: Manifest = serde_json::from_slice(&body)?;

        debug!(%url, version = ?manifest.version, "Hub manifest resolved");
        info!(image = %manifest.image, "Downloading hub image");

        self.fetcher
            .fetch(destination, &manifest.image, overwrite, cancel)
            .await
    }
}
