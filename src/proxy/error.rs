//! Per-connection proxy errors.

use std::time::Duration;

use thiserror::Error;

/// Failure of a single proxied exchange. Never crosses connection boundaries.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The client did not send a well-formed HTTP request.
    #[error("failed to parse http request: {0}")]
    ParseRequest(#[source] hyper::Error),

    /// The request body could not be read or exceeded the size limit.
    #[error("failed to read request body: {0}")]
    RequestBody(#[source] axum::Error),

    #[error("failed to dial {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {timeout:?} dialing {address}")]
    DialTimeout { address: String, timeout: Duration },

    /// The upstream connection failed or returned an unparseable response.
    #[error("upstream exchange with {address} failed: {source}")]
    Upstream {
        address: String,
        #[source]
        source: hyper::Error,
    },

    #[error("upstream {address} did not respond within {timeout:?}")]
    ResponseTimeout { address: String, timeout: Duration },

    /// The response body could not be read or exceeded the size limit.
    #[error("failed to read response body: {0}")]
    ResponseBody(#[source] axum::Error),

    /// Writing the response back to the client failed.
    #[error("failed to write response: {0}")]
    WriteResponse(#[source] hyper::Error),
}

impl ProxyError {
    /// Short label for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            ProxyError::ParseRequest(_) => "malformed_request",
            ProxyError::RequestBody(_) => "request_body_error",
            ProxyError::Dial { .. } | ProxyError::DialTimeout { .. } => "dial_error",
            ProxyError::Upstream { .. } => "malformed_response",
            ProxyError::ResponseTimeout { .. } => "upstream_timeout",
            ProxyError::ResponseBody(_) => "response_body_error",
            ProxyError::WriteResponse(_) => "write_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dial_error_display() {
        let err = ProxyError::Dial {
            address: "127.0.0.1:1".into(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert_eq!(err.to_string(), "failed to dial 127.0.0.1:1: refused");
        assert_eq!(err.outcome(), "dial_error");
    }

    #[test]
    fn timeout_display() {
        let err = ProxyError::ResponseTimeout {
            address: "up:80".into(),
            timeout: Duration::from_secs(3),
        };
        assert_eq!(err.to_string(), "upstream up:80 did not respond within 3s");
    }
}
