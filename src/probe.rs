//! Remote resource probe
//!
//! A single GET yields both the change token (the `Last-Modified` header)
//! and the body stream, so a changed resource is never requested twice.

use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use reqwest::header::{HeaderMap, LAST_MODIFIED};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque marker identifying a version of the remote resource.
///
/// Only equality is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeToken(String);

impl ChangeToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChangeToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Body of the remote resource, consumed exactly once
pub type PayloadStream = BoxStream<'static, Result<Bytes>>;

/// Result of probing the remote resource
pub struct RemoteResource {
    /// Version marker reported by the server
    pub token: ChangeToken,

    /// Response body
    pub body: PayloadStream,
}

impl RemoteResource {
    /// Build a resource from in-memory chunks
    pub fn from_chunks(token: impl Into<ChangeToken>, chunks: Vec<Result<Bytes>>) -> Self {
        Self {
            token: token.into(),
            body: stream::iter(chunks).boxed(),
        }
    }
}

impl fmt::Debug for RemoteResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteResource")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

/// Source of the watched resource
#[async_trait]
pub trait ResourceProbe: Send + Sync {
    /// Issue one request against `url`.
    ///
    /// Fails with [`Error::Network`] on connection, DNS or timeout failures.
    async fn fetch(&self, url: &str) -> Result<RemoteResource>;
}

/// Read the change token from response headers.
///
/// Non-ASCII (obs-text) bytes are kept lossily rather than rejected; only a
/// missing or blank header fails.
pub fn change_token(headers: &HeaderMap) -> std::result::Result<ChangeToken, &'static str> {
    let value = headers
        .get(LAST_MODIFIED)
        .ok_or("carried no Last-Modified header")?;
    let text = String::from_utf8_lossy(value.as_bytes());
    let text = text.trim();
    if text.is_empty() {
        return Err("carried an empty Last-Modified header");
    }
    Ok(ChangeToken::from(text))
}

/// HTTP implementation of [`ResourceProbe`]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl ResourceProbe for HttpProbe {
    async fn fetch(&self, url: &str) -> Result<RemoteResource> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!("GET {} returned HTTP {}", url, status)));
        }

        let token = change_token(response.headers())
            .map_err(|reason| Error::Network(format!("GET {} {}", url, reason)))?;

        tracing::debug!("Remote change token: {}", token);

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Error::Network(format!("Body stream failed: {}", e))))
            .boxed();

        Ok(RemoteResource { token, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_change_token_equality() {
        let a = ChangeToken::from("Tue, 15 Nov 1994 12:45:26 GMT");
        let b = ChangeToken::new("Tue, 15 Nov 1994 12:45:26 GMT".to_string());
        assert_eq!(a, b);
        assert_ne!(a, ChangeToken::from("Wed, 16 Nov 1994 12:45:26 GMT"));
        assert_eq!(a.to_string(), "Tue, 15 Nov 1994 12:45:26 GMT");
    }

    #[test]
    fn test_change_token_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            change_token(&headers).unwrap_err(),
            "carried no Last-Modified header"
        );

        headers.insert(
            LAST_MODIFIED,
            HeaderValue::from_static("Tue, 15 Nov 1994 12:45:26 GMT"),
        );
        assert_eq!(
            change_token(&headers).unwrap(),
            ChangeToken::from("Tue, 15 Nov 1994 12:45:26 GMT")
        );

        headers.insert(LAST_MODIFIED, HeaderValue::from_static(""));
        assert!(change_token(&headers).is_err());
    }

    #[test]
    fn test_change_token_accepts_obs_text() {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_bytes(b"Tue, 15 Nov 1994 \xe9t\xe9").unwrap();
        headers.insert(LAST_MODIFIED, value);

        let token = change_token(&headers).unwrap();
        assert!(token.as_str().starts_with("Tue, 15 Nov 1994 "));

        // Same bytes give the same token across runs
        assert_eq!(change_token(&headers).unwrap(), token);
    }

    #[tokio::test]
    async fn test_from_chunks_streams_in_order() {
        let resource = RemoteResource::from_chunks(
            "T1",
            vec![Ok(Bytes::from_static(b"ab")), Ok(Bytes::from_static(b"cd"))],
        );
        assert_eq!(resource.token.as_str(), "T1");

        let chunks: Vec<Bytes> = resource
            .body
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.concat(), b"abcd");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let probe = HttpProbe::default();
        // Port 9 (discard) on localhost is not expected to accept connections
        let result = probe.fetch("http://127.0.0.1:9/worstwx.jpg").await;
        assert!(matches!(result, Err(Error::Network(_))));
    }
}
