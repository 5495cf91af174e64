//! Per-connection proxy handler.
//!
//! # Responsibilities
//! - Read exactly one HTTP request off an accepted connection
//! - Rewrite its `Host` to the upstream address
//! - Route it through the interception gate, forward it, and route the
//!   response back through the gate
//! - Write the response and close the connection
//!
//! # Design Decisions
//! - hyper's HTTP/1 server drives the client side with keep-alive off, so a
//!   connection carries one exchange
//! - A failed exchange returns an error to hyper, which drops the
//!   connection without writing a response

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, Response};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use uuid::Uuid;

use crate::debugger::InterceptionGate;
use crate::net::connection::ConnectionId;
use crate::observability::metrics;
use crate::proxy::{CapturedRequest, CapturedResponse, ProxyError, Upstream};

pub struct ProxyHandler {
    upstream: Upstream,
    gate: Arc<InterceptionGate>,
    max_body_bytes: usize,
}

impl ProxyHandler {
    pub fn new(upstream: Upstream, gate: Arc<InterceptionGate>, max_body_bytes: usize) -> Self {
        Self {
            upstream,
            gate,
            max_body_bytes,
        }
    }

    /// Serve one accepted connection to completion.
    pub async fn handle(self: Arc<Self>, stream: TcpStream, peer: SocketAddr, conn: ConnectionId) {
        let handler = Arc::clone(&self);
        let service = service_fn(move |request: Request<Incoming>| {
            let handler = Arc::clone(&handler);
            async move { handler.serve(conn, request).await }
        });

        let result = http1::Builder::new()
            .keep_alive(false)
            .serve_connection(TokioIo::new(stream), service)
            .await;

        let Err(err) = result else {
            return;
        };
        // Service errors were already reported by `serve`.
        if err.is_user() {
            return;
        }
        let err = if err.is_parse() || err.is_incomplete_message() {
            ProxyError::ParseRequest(err)
        } else {
            ProxyError::WriteResponse(err)
        };
        metrics::record_exchange(err.outcome());
        tracing::warn!(connection_id = %conn, peer = %peer, error = %err, "Connection failed");
    }

    async fn serve(&self, conn: ConnectionId, request: Request<Incoming>) -> Result<Response<Body>, ProxyError> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();

        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(Body::new(body), self.max_body_bytes)
            .await
            .map_err(ProxyError::RequestBody);
        let result = match body {
            Ok(body) => self.roundtrip(conn, Request::from_parts(parts, body)).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => {
                metrics::record_exchange("forwarded");
                tracing::info!(
                    connection_id = %conn,
                    request_id = %request_id,
                    status = response.status().as_u16(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Exchange complete"
                );
                let (mut parts, body) = response.into_parts();
                parts.headers.remove(header::CONNECTION);
                Ok(Response::from_parts(parts, Body::from(body)))
            }
            Err(err) => {
                metrics::record_exchange(err.outcome());
                tracing::warn!(
                    connection_id = %conn,
                    request_id = %request_id,
                    error = %err,
                    "Exchange failed, closing connection"
                );
                Err(err)
            }
        }
    }

    /// Rewrite, intercept, forward, intercept.
    pub async fn roundtrip(&self, conn: ConnectionId, mut request: CapturedRequest) -> Result<CapturedResponse, ProxyError> {
        rewrite_host(&mut request, self.upstream.address());
        tracing::debug!(
            connection_id = %conn,
            method = %request.method(),
            uri = %request.uri(),
            "Request read"
        );

        let request = self.gate.on_request(conn, request).await;
        let response = self.upstream.exchange(request).await?;
        Ok(self.gate.on_response(conn, response).await)
    }
}

/// Point the request at the upstream.
pub fn rewrite_host(request: &mut CapturedRequest, upstream: &str) {
    match HeaderValue::from_str(upstream) {
        Ok(value) => {
            request.headers_mut().insert(header::HOST, value);
        }
        Err(e) => {
            tracing::warn!(upstream, error = %e, "Upstream address is not a valid Host header");
        }
    }
}
