//! Command dispatcher.
//!
//! A single loop that applies operator commands to the shared
//! `DebugControl` in arrival order and greets newly joined observers with a
//! state snapshot. It is the only writer of the enabled flag.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::sync::mpsc::error::TrySendError;

use crate::control::hub::{BroadcastHub, SessionId};
use crate::control::protocol::{Command, Update};
use crate::debugger::state::DebugControl;
use crate::observability::metrics;

/// Producer side of the dispatcher queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<Command>,
}

impl CommandSender {
    /// Enqueue without waiting. A full queue drops the command.
    pub fn submit(&self, command: Command) -> bool {
        match self.tx.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(command)) => {
                tracing::warn!(%command, "Command queue full, dropping command");
                false
            }
            Err(TrySendError::Closed(command)) => {
                tracing::warn!(%command, "Dispatcher stopped, dropping command");
                false
            }
        }
    }
}

/// Create the bounded command queue.
pub fn command_queue(depth: usize) -> (CommandSender, mpsc::Receiver<Command>) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (CommandSender { tx }, rx)
}

pub struct CommandDispatcher {
    control: Arc<DebugControl>,
    hub: Arc<BroadcastHub>,
    commands: mpsc::Receiver<Command>,
    joins: mpsc::UnboundedReceiver<SessionId>,
}

impl CommandDispatcher {
    pub fn new(
        control: Arc<DebugControl>,
        hub: Arc<BroadcastHub>,
        commands: mpsc::Receiver<Command>,
        joins: mpsc::UnboundedReceiver<SessionId>,
    ) -> Self {
        Self {
            control,
            hub,
            commands,
            joins,
        }
    }

    /// Process commands and joins until shutdown or until both queues close.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            debugging_enabled = self.control.is_enabled(),
            "Command dispatcher started"
        );

        loop {
            tokio::select! {
                Some(command) = self.commands.recv() => self.apply(command),
                Some(session) = self.joins.recv() => self.welcome(session),
                _ = shutdown.recv() => {
                    tracing::info!("Command dispatcher received shutdown signal");
                    break;
                }
                else => break,
            }
        }

        tracing::info!("Command dispatcher stopped");
    }

    /// Apply one command.
    pub fn apply(&self, command: Command) {
        metrics::record_command(command.name());

        match command {
            Command::EnableDebugging => {
                let snapshot = self.control.enable();
                tracing::info!(waiting = snapshot.waiting, "Debugging enabled");
                self.hub.broadcast(Update::DebuggingToggled { enabled: true });
            }
            Command::DisableDebugging => {
                let outcome = self.control.disable();
                tracing::info!(
                    released = outcome.released,
                    still_waiting = outcome.snapshot.waiting,
                    "Debugging disabled"
                );
                self.hub.broadcast(Update::DebuggingToggled { enabled: false });
            }
            Command::Continue => {
                if self.control.resume() {
                    tracing::debug!("Released one paused handler");
                } else {
                    tracing::debug!("Continue ignored, nothing is paused");
                }
            }
        }
    }

    /// Send the current state to an observer that just registered.
    pub fn welcome(&self, session: SessionId) {
        let enabled = self.control.is_enabled();
        if self.hub.send_initial(session, Update::InitialState { enabled }) {
            tracing::debug!(session_id = %session, enabled, "Sent initial state");
        }
    }
}
