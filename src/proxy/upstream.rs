//! Upstream exchange: one fresh connection per request.

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, Request, Response, Uri};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use crate::config::UpstreamConfig;
use crate::net::dial_address;
use crate::observability::metrics;
use crate::proxy::{CapturedRequest, CapturedResponse, ProxyError};

/// The fixed backend every request is forwarded to.
#[derive(Debug, Clone)]
pub struct Upstream {
    address: String,
    connect_timeout: Duration,
    response_timeout: Duration,
    max_body_bytes: usize,
}

impl Upstream {
    pub fn new(config: &UpstreamConfig, max_body_bytes: usize) -> Self {
        Self {
            address: dial_address(&config.address),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            response_timeout: Duration::from_secs(config.response_timeout_secs),
            max_body_bytes,
        }
    }

    /// Address requests are dialed to, also used as the rewritten `Host`.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Dial, send `request`, and read back exactly one response.
    pub async fn exchange(&self, request: CapturedRequest) -> Result<CapturedResponse, ProxyError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| ProxyError::DialTimeout {
                address: self.address.clone(),
                timeout: self.connect_timeout,
            })?
            .map_err(|source| ProxyError::Dial {
                address: self.address.clone(),
                source,
            })?;

        let started = Instant::now();
        let result = tokio::time::timeout(self.response_timeout, self.send(stream, request))
            .await
            .map_err(|_| ProxyError::ResponseTimeout {
                address: self.address.clone(),
                timeout: self.response_timeout,
            })?;
        metrics::record_upstream_duration(started);
        result
    }

    async fn send(&self, stream: TcpStream, request: CapturedRequest) -> Result<CapturedResponse, ProxyError> {
        let upstream_err = |source| ProxyError::Upstream {
            address: self.address.clone(),
            source,
        };

        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(upstream_err)?;

        let address = self.address.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(upstream = %address, error = %e, "Upstream connection closed with error");
            }
        });

        let (mut parts, body) = request.into_parts();
        // The body is already buffered; framing is recomputed on write.
        parts.headers.remove(header::TRANSFER_ENCODING);
        parts.uri = origin_form(&parts.uri);
        let outgoing = Request::from_parts(parts, Body::from(body));

        let response = sender.send_request(outgoing).await.map_err(upstream_err)?;
        let (mut parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), self.max_body_bytes)
            .await
            .map_err(ProxyError::ResponseBody)?;
        parts.headers.remove(header::TRANSFER_ENCODING);

        Ok(Response::from_parts(parts, body))
    }
}

/// Strip scheme and authority so the upstream only sees `Host`.
///
/// An absolute-form target would otherwise override the rewritten header.
pub fn origin_form(uri: &Uri) -> Uri {
    match uri.path_and_query() {
        Some(path) if path.as_str().starts_with('/') => Uri::from(path.clone()),
        Some(path) if path.as_str().starts_with('?') => {
            Uri::try_from(format!("/{path}")).unwrap_or_else(|_| Uri::from_static("/"))
        }
        _ => Uri::from_static("/"),
    }
}
