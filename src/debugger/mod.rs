//! Debugger subsystem.
//!
//! # Data Flow
//! ```text
//! proxy handler
//!     → gate.rs (capture → hub, park while enabled)
//!
//! observer command
//!     → dispatcher.rs (single loop, applies commands in order)
//!     → state.rs (enabled flag + queue of parked handlers)
//!     → wakes one parked handler
//! ```
//!
//! # Design Decisions
//! - One `DebugControl` per process, shared by `Arc`, one mutex inside
//! - Each parked handler owns its own one-shot wake handle; `Continue`
//!   wakes the oldest, so a wake-up is never lost or delivered twice
//! - Pauses are unbounded unless a pause timeout is configured

pub mod dispatcher;
pub mod gate;
pub mod state;

pub use dispatcher::{command_queue, CommandDispatcher, CommandSender};
pub use gate::InterceptionGate;
pub use state::{DebugControl, DebugSnapshot};
