//! httpception: an HTTP proxy that lets an operator watch and pause live traffic.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ net::listener ──▶ proxy::handler ──▶ debugger::gate ──▶ proxy::upstream ──▶ Upstream
//!                                        │                  ▲    │
//!                                        │     park/resume  │    │ captures
//!                                        │                  │    ▼
//!                                        │        debugger::dispatcher ◀── commands ── control::session
//!                                        │                  │                               ▲
//!                                        │                  ▼                               │
//!                                        └──────────▶ control::hub ──── updates ────────────┘ Observers
//! ```
//!
//! Every proxied exchange is captured twice (request, then response) and
//! broadcast to all observers. While debugging is enabled, each capture
//! parks its handler until an operator sends `Continue`.

pub mod app;
pub mod config;
pub mod control;
pub mod debugger;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;

pub use app::{AppError, Application};
pub use config::schema::ProxyConfig;
pub use lifecycle::Shutdown;
