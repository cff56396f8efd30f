//! Collaborators at the edge of a pull.
//!
//! Every remote protocol, the signature checker and the operator prompt are
//! reached through the traits below. The submodules provide the production
//! implementations; tests substitute in-process fakes.

mod library;
mod net;
mod prompt;
mod registry;
mod shub;
mod verify;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::HttpConfig;
use crate::digest::{ContentHash, DigestError};
use crate::request::RegistryCredentials;

pub use library::HttpLibraryClient;
pub use net::HttpFetcher;
pub use prompt::StdinPrompt;
pub use registry::CommandRegistryPuller;
pub use shub::ShubClient;
pub use verify::CommandVerifier;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid image hash: {0}")]
    InvalidHash(#[from] DigestError),

    #[error("{0}")]
    Unsupported(String),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("writing downloaded bytes failed: {0}")]
    Sink(#[source] std::io::Error),

    #[error("image file {} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("`{program}` failed: {reason}")]
    Command { program: String, reason: String },

    #[error("transfer cancelled")]
    Interrupted,
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Which library image to talk about.
#[derive(Debug, Clone, Copy)]
pub struct LibraryQuery<'a> {
    pub base_uri: &'a str,
    pub reference: &'a str,
    pub token: Option<&'a str>,
}

/// Metadata returned by the library before any byte is transferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryImage {
    pub hash: ContentHash,
    pub size: Option<u64>,
}

#[async_trait]
pub trait LibraryClient: Send + Sync {
    async fn image_info(&self, query: &LibraryQuery<'_>) -> Result<LibraryImage>;

    /// Stream the image bytes into `sink`. Returns the number of bytes written.
    async fn download(
        &self,
        query: &LibraryQuery<'_>,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
        cancel: &CancellationToken,
    ) -> Result<u64>;
}

#[async_trait]
pub trait HubClient: Send + Sync {
    async fn pull(
        &self,
        destination: &Path,
        reference: &str,
        overwrite: bool,
        no_https: bool,
        cancel: &CancellationToken,
    ) -> Result<u64>;
}

#[async_trait]
pub trait NetFetcher: Send + Sync {
    async fn fetch(
        &self,
        destination: &Path,
        url: &str,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<u64>;
}

/// Options forwarded to the registry strategy.
#[derive(Debug, Clone, Default)]
pub struct RegistryOptions {
    pub tmp_dir: Option<PathBuf>,
    pub overwrite: bool,
    pub no_https: bool,
    pub credentials: Option<RegistryCredentials>,
}

#[async_trait]
pub trait RegistryPuller: Send + Sync {
    async fn pull(
        &self,
        destination: &Path,
        reference: &str,
        options: &RegistryOptions,
        cancel: &CancellationToken,
    ) -> Result<u64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    Signed,
    NotSigned,
}

#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn verify(&self, image: &Path) -> Result<SignatureStatus>;
}

/// Yes/no question to the operator.
#[async_trait]
pub trait TrustPrompt: Send + Sync {
    async fn confirm(&self, question: &str) -> std::io::Result<bool>;
}

/// Build the shared `reqwest` client.
pub fn http_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .user_agent(&config.user_agent)
        .redirect(reqwest::redirect::Policy::limited(10));

    if let Some(secs) = config.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    Ok(builder.build()?)
}

/// Send a `GET`, failing on non-success statuses.
pub(crate) async fn get(
    http: &reqwest::Client,
    url: &str,
    token: Option<&str>,
) -> Result<reqwest::Response> {
    debug!(url, "GET");

    let mut request = http.get(url);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ClientError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    Ok(response)
}

/// Copy a response body into `sink`, chunk by chunk, until the body ends
/// or `cancel` fires.
pub(crate) async fn stream_body(
    mut response: reqwest::Response,
    sink: &mut (dyn AsyncWrite + Send + Unpin),
    cancel: &CancellationToken,
) -> Result<u64> {
    let mut written = 0u64;

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Interrupted),
            chunk = response.chunk() => chunk?,
        };

        let Some(chunk) = chunk else {
            break;
        };

        sink.write_all(&chunk).await.map_err(ClientError::Sink)?;
        written += chunk.len() as u64;
    }

    sink.flush().await.map_err(ClientError::Sink)?;

    Ok(written)
}
