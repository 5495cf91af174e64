//! Proxy connection handling subsystem.
//!
//! # Data Flow
//! ```text
//! accepted TcpStream
//!     → handler.rs (read one HTTP/1.x request, buffer body)
//!     → rewrite Host to the upstream address
//!     → debugger gate (capture, maybe pause)
//!     → upstream.rs (fresh connection, one request, one response)
//!     → debugger gate (capture, maybe pause)
//!     → write response, close connection
//! ```
//!
//! # Design Decisions
//! - One exchange per accepted connection, no keep-alive on either side
//! - Bodies are buffered so a paused message can be shown in full
//! - Failures stay local to the connection that produced them

pub mod dump;
pub mod error;
pub mod handler;
pub mod upstream;

use axum::body::Bytes;
use axum::http::{Request, Response};

/// A request read from a client, body fully buffered.
pub type CapturedRequest = Request<Bytes>;

/// A response read from the upstream, body fully buffered.
pub type CapturedResponse = Response<Bytes>;

pub use error::ProxyError;
pub use handler::ProxyHandler;
pub use upstream::Upstream;
