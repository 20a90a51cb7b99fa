//! HTTP POST primitive.

use async_trait::async_trait;
use serde_json::Value;

use crate::protocol::error::{FilamentError, Result};

/// Maximum payload size in bytes (10 MB).
///
/// Applied to outbound bodies here and to inbound bodies at the connector
/// boundary. Requests exceeding this size are rejected before serialization
/// work is done on them.
pub const MAX_PAYLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Outcome of a POST: the HTTP status and the decoded JSON body (JSON `null`
/// when the peer returned a non-JSON or empty body).
#[derive(Debug, Clone)]
pub struct PostResponse {
    pub status: u16,
    pub body: Value,
}

impl PostResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The single cross-peer primitive: `post(url, body)`.
///
/// Everything the fabric sends over the wire goes through this seam, so tests
/// substitute a recording implementation and embedders can swap the HTTP
/// stack without touching the core.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, url: &str, body: &Value) -> Result<PostResponse>;
}

/// Production transport over a shared [`reqwest::Client`].
///
/// The client keeps its own connection pool, so one `HttpPoster` per process
/// is enough; clones share the pool.
#[derive(Clone, Default)]
pub struct HttpPoster {
    client: reqwest::Client,
}

impl HttpPoster {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for HttpPoster {
    async fn post(&self, url: &str, body: &Value) -> Result<PostResponse> {
        let encoded = serde_json::to_vec(body)?;
        if encoded.len() > MAX_PAYLOAD_SIZE {
            return Err(FilamentError::Transport(format!(
                "payload of {} bytes exceeds the {} byte limit",
                encoded.len(),
                MAX_PAYLOAD_SIZE
            )));
        }

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(encoded)
            .send()
            .await?;

        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Ok(PostResponse { status, body })
    }
}
