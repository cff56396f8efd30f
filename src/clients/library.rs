//! Library API client.
//!
//! Image metadata comes from `GET <base>/v1/images/<path>` and the bytes
//! from `GET <base>/v1/imagefile/<path>`, where `<path>` is the reference
//! without its `library://` prefix and with a tag (defaults to `latest`).

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{LibraryClient, LibraryImage, LibraryQuery, Result, get, stream_body};
use crate::digest::ContentHash;
use crate::reference::{self, LIBRARY_PROTOCOL};

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: ImageData,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    hash: String,
    #[serde(default)]
    size: Option<u64>,
}

#[derive(Clone)]
pub struct HttpLibraryClient {
    http: reqwest::Client,
}

impl HttpLibraryClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn url(base_uri: &str, endpoint: &str, reference: &str) -> String {
        format!(
            "{}/v1/{endpoint}/{}",
            base_uri.trim_end_matches('/'),
            image_path(reference)
        )
    }
}

/// `library://user/collection/image` becomes `user/collection/image:latest`.
fn image_path(reference: &str) -> String {
    let locator = match reference::split(reference) {
        (Some(LIBRARY_PROTOCOL) | Some("") | None, locator) => locator,
        (Some(_), _) => reference,
    };
    let locator = locator.trim_start_matches('/');

    let last = locator.rsplit('/').next().unwrap_or(locator);
    if last.contains(':') || last.contains('@') {
        locator.to_string()
    } else {
        format!("{locator}:latest")
    }
}

#[async_trait]
impl LibraryClient for HttpLibraryClient {
    async fn image_info(&self, query: &LibraryQuery<'_>) -> Result<LibraryImage> {
        let url = Self::url(query.base_uri, "images", query.reference);
        let body = get(&self.http, &url, query.token).await?.bytes().await?;

        let ImageResponse { data } = serde_json::from_slice(&body)?;
        let hash = ContentHash::parse(&data.hash)?;

        debug!(%url, %hash, size = ?data.size, "Library image resolved");

        Ok(LibraryImage {
            hash,
            size: data.size,
        })
    }

    async fn download(
        &self,
        query: &LibraryQuery<'_>,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let url = Self::url(query.base_uri, "imagefile", query.reference);
        let response = get(&self.http, &url, query.token).await?;
        stream_body(response, sink, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::tests::serve;
    use crate::clients::ClientError;
    use crate::digest::HashAlgorithm;
    use axum::{Json, Router, extract::Path, http::HeaderMap, http::StatusCode, routing::get};
    use serde_json::json;

    #[test]
    fn test_image_path() {
        assert_eq!(image_path("library://alpine"), "alpine:latest");
        assert_eq!(image_path("alpine:3.18"), "alpine:3.18");
        assert_eq!(
            image_path("library://user/collection/image:v1"),
            "user/collection/image:v1"
        );
        assert_eq!(image_path("library:///user/col/img"), "user/col/img:latest");
    }

    fn app() -> Router {
        let hash = ContentHash::of_bytes(HashAlgorithm::SHA256, b"SIF image");

        Router::new()
            .route(
                "/v1/images/{*path}",
                get(move |Path(path): Path<String>, headers: HeaderMap| {
                    let hash = hash.clone();
                    async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_owned);

                        match (path.as_str(), auth.as_deref()) {
                            ("alpine:latest", Some("Bearer t0ken")) => Ok(Json(json!({
                                "data": { "hash": hash.as_str(), "size": 9 }
                            }))),
                            _ => Err(StatusCode::NOT_FOUND),
                        }
                    }
                }),
            )
            .route(
                "/v1/imagefile/{*path}",
                get(|Path(path): Path<String>| async move {
                    if path == "alpine:latest" {
                        Ok("SIF image")
                    } else {
                        Err(StatusCode::NOT_FOUND)
                    }
                }),
            )
    }

    #[tokio::test]
    async fn test_image_info_and_download() {
        let base = serve(app()).await;
        let client = HttpLibraryClient::new(reqwest::Client::new());
        let query = LibraryQuery {
            base_uri: &base,
            reference: "library://alpine",
            token: Some("t0ken"),
        };

        let image = client.image_info(&query).await.unwrap();
        assert!(image.hash.matches(&ContentHash::of_bytes(HashAlgorithm::SHA256, b"SIF image")));
        assert_eq!(image.size, Some(9));

        let mut sink = Vec::new();
        let written = client
            .download(&query, &mut sink, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(written, 9);
        assert_eq!(sink, b"SIF image");
    }

    #[tokio::test]
    async fn test_missing_image_is_a_status_error() {
        let base = serve(app()).await;
        let client = HttpLibraryClient::new(reqwest::Client::new());
        let query = LibraryQuery {
            base_uri: &base,
            reference: "library://nope",
            token: None,
        };

        let err = client.image_info(&query).await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_cancelled_download() {
        let base = serve(app()).await;
        let client = HttpLibraryClient::new(reqwest::Client::new());
        let query = LibraryQuery {
            base_uri: &base,
            reference: "library://alpine",
            token: None,
        };

        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut sink = Vec::new();
        let err = client.download(&query, &mut sink, &cancel).await.unwrap_err();
        assert!(matches!(err, ClientError::Interrupted));
    }
}
