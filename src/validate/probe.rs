// ABOUTME: Single HTTP health request with a timeout.
// ABOUTME: HttpProbe speaks HTTP/1.1 over a fresh TCP connection via hyper.

use async_trait::async_trait;
use http_body_util::{BodyExt, Empty};
use hyper::Uri;
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid health URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Issues one GET and reports the response status code.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<u16, ProbeError>;
}

/// Plain HTTP probe. One connection per request, no redirects.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpProbe;

impl HttpProbe {
    async fn request(uri: Uri, url: &str) -> Result<u16, ProbeError> {
        let invalid = |reason: &str| ProbeError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };
        if uri.scheme_str() != Some("http") {
            return Err(invalid("only http:// is supported"));
        }
        let host = uri.host().ok_or_else(|| invalid("missing host"))?;
        let port = uri.port_u16().unwrap_or(80);
        let path = uri
            .path_and_query()
            .map(|p| p.as_str())
            .unwrap_or("/")
            .to_string();

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| ProbeError::Connect(e.to_string()))?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| ProbeError::Connect(format!("HTTP handshake failed: {}", e)))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("health probe connection error: {}", e);
            }
        });

        let req = hyper::Request::builder()
            .method("GET")
            .uri(path)
            .header("Host", format!("{}:{}", host, port))
            .header("User-Agent", "zeroshift-health")
            .body(Empty::<bytes::Bytes>::new())
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;
        let status = resp.status().as_u16();

        // Drain so the server sees a complete exchange.
        let _ = resp.into_body().collect().await;
        Ok(status)
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn get(&self, url: &str, timeout: Duration) -> Result<u16, ProbeError> {
        let uri: Uri = url.parse().map_err(|e: hyper::http::uri::InvalidUri| {
            ProbeError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        tokio::time::timeout(timeout, Self::request(uri, url))
            .await
            .map_err(|_| ProbeError::Timeout(timeout))?
    }
}
