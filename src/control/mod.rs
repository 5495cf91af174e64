//! Control plane subsystem.
//!
//! # Data Flow
//! ```text
//! observer WebSocket (/_socket)
//!     → session.rs (decode commands → dispatcher queue)
//!     ← session.rs (hub queue → encode updates)
//!
//! gate / dispatcher
//!     → hub.rs (fan out to every registered session)
//! ```
//!
//! # Design Decisions
//! - One reader and one writer per observer; neither blocks other observers
//! - Observer failures end that session only
//! - Static UI files are optional and served from disk

pub mod hub;
pub mod protocol;
pub mod server;
pub mod session;

pub use hub::{BroadcastHub, SessionId};
pub use protocol::{Command, ProtocolError, Update};
pub use server::ControlServer;
