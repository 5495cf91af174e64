//! Startup composition.
//!
//! # Responsibilities
//! - Bind the proxy and control listeners (fail fast on either)
//! - Build the shared debugger state, hub, gate and dispatcher
//! - Run every task until shutdown, then drain client connections

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

use crate::config::ProxyConfig;
use crate::control::server::ControlState;
use crate::control::{BroadcastHub, ControlServer};
use crate::debugger::{command_queue, CommandDispatcher, DebugControl, InterceptionGate};
use crate::lifecycle::Shutdown;
use crate::net::bind_address;
use crate::net::connection::ConnectionTracker;
use crate::net::{Listener, ListenerError};
use crate::proxy::{ProxyHandler, Upstream};

/// How long in-flight connections get once shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Proxy listener: {0}")]
    Listener(#[from] ListenerError),

    #[error("Failed to bind control address {address}: {source}")]
    ControlBind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A fully bound proxy, ready to run.
pub struct Application {
    listener: Listener,
    proxy_addr: SocketAddr,
    control_listener: TcpListener,
    control_addr: SocketAddr,
    handler: Arc<ProxyHandler>,
    control_server: ControlServer,
    dispatcher: CommandDispatcher,
    shutdown: Shutdown,
    acceptor_shutdown: broadcast::Receiver<()>,
    control_shutdown: broadcast::Receiver<()>,
    dispatcher_shutdown: broadcast::Receiver<()>,
}

impl Application {
    /// Bind both listeners and wire the components together.
    pub async fn bind(config: ProxyConfig) -> Result<Self, AppError> {
        let listener = Listener::bind(&config.listener).await?;
        let proxy_addr = listener.local_addr()?;

        let control_address = bind_address(&config.control.bind_address);
        let control_listener = TcpListener::bind(&control_address)
            .await
            .map_err(|source| AppError::ControlBind {
                address: control_address,
                source,
            })?;
        let control_addr = control_listener.local_addr()?;

        let control = Arc::new(DebugControl::new(config.debugger.start_enabled));
        let (joins_tx, joins_rx) = mpsc::unbounded_channel();
        let hub = Arc::new(BroadcastHub::new(config.control.session_queue, joins_tx));
        let (commands, commands_rx) = command_queue(config.control.command_queue);

        let gate = Arc::new(InterceptionGate::new(
            Arc::clone(&control),
            Arc::clone(&hub),
            config.debugger.pause_timeout_secs.map(Duration::from_secs),
        ));
        let upstream = Upstream::new(&config.upstream, config.limits.max_body_bytes);
        let handler = Arc::new(ProxyHandler::new(upstream, gate, config.limits.max_body_bytes));

        let dispatcher = CommandDispatcher::new(Arc::clone(&control), Arc::clone(&hub), commands_rx, joins_rx);
        let control_server = ControlServer::new(
            ControlState {
                hub,
                commands,
                control,
            },
            config.control.assets_dir.clone(),
        );

        let shutdown = Shutdown::new();

        tracing::info!(
            proxy = %proxy_addr,
            upstream = %config.upstream.address,
            control = %control_addr,
            debugging_enabled = config.debugger.start_enabled,
            "httpception bound"
        );

        Ok(Self {
            listener,
            proxy_addr,
            control_listener,
            control_addr,
            handler,
            control_server,
            dispatcher,
            acceptor_shutdown: shutdown.subscribe(),
            control_shutdown: shutdown.subscribe(),
            dispatcher_shutdown: shutdown.subscribe(),
            shutdown,
        })
    }

    /// Address clients connect to.
    pub fn proxy_addr(&self) -> SocketAddr {
        self.proxy_addr
    }

    /// Address observers connect to.
    pub fn control_addr(&self) -> SocketAddr {
        self.control_addr
    }

    /// Handle that stops a running application.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Run until shutdown is triggered.
    pub async fn run(self) -> Result<(), AppError> {
        let dispatcher = tokio::spawn(self.dispatcher.run(self.dispatcher_shutdown));

        let control = tokio::spawn(
            self.control_server
                .run(self.control_listener, self.control_shutdown),
        );

        let tracker = ConnectionTracker::new();
        self.listener
            .serve(self.handler, tracker.clone(), self.acceptor_shutdown)
            .await;

        if !tracker.drain(DRAIN_TIMEOUT).await {
            tracing::warn!(
                remaining = tracker.active_count(),
                "Drain timed out, abandoning connections"
            );
        }

        if let Err(e) = dispatcher.await {
            tracing::error!(error = %e, "Command dispatcher task failed");
        }
        match control.await {
            Ok(result) => result?,
            Err(e) => tracing::error!(error = %e, "Control server task failed"),
        }

        tracing::info!("Shutdown complete");
        Ok(())
    }
}
