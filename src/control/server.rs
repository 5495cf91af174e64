//! Control plane HTTP server.
//!
//! # Routes
//! - `GET /_socket`: observer WebSocket
//! - `GET /status`: debugger and observer summary as JSON
//! - everything else: static UI files, when an assets directory is configured

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::control::hub::BroadcastHub;
use crate::control::session::run_session;
use crate::debugger::{CommandSender, DebugControl};

/// State injected into control handlers.
#[derive(Clone)]
pub struct ControlState {
    pub hub: Arc<BroadcastHub>,
    pub commands: CommandSender,
    pub control: Arc<DebugControl>,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub debugging_enabled: bool,
    pub paused: bool,
    pub waiting: usize,
    pub observers: usize,
}

pub struct ControlServer {
    router: Router,
}

impl ControlServer {
    pub fn new(state: ControlState, assets_dir: Option<PathBuf>) -> Self {
        Self {
            router: Self::build_router(state, assets_dir),
        }
    }

    fn build_router(state: ControlState, assets_dir: Option<PathBuf>) -> Router {
        let router = Router::new()
            .route("/_socket", get(socket_handler))
            .route("/status", get(status_handler))
            .with_state(state);

        let router = match assets_dir {
            Some(dir) => {
                tracing::info!(assets_dir = %dir.display(), "Serving control UI");
                router.fallback_service(ServeDir::new(dir))
            }
            None => router,
        };

        router.layer(TraceLayer::new_for_http())
    }

    /// The router, for embedding or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until the shutdown signal fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Control server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Control server stopped");
        Ok(())
    }
}

async fn socket_handler(ws: WebSocketUpgrade, State(state): State<ControlState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_session(socket, state.hub, state.commands))
}

async fn status_handler(State(state): State<ControlState>) -> Json<StatusReport> {
    let snapshot = state.control.snapshot();
    Json(StatusReport {
        debugging_enabled: snapshot.enabled,
        paused: snapshot.paused,
        waiting: snapshot.waiting,
        observers: state.hub.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debugger::command_queue;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn status_reports_debugger_state() {
        let (joins, _joins_rx) = mpsc::unbounded_channel();
        let hub = Arc::new(BroadcastHub::new(4, joins));
        let (_id, _rx) = hub.register();
        let control = Arc::new(DebugControl::new(true));
        let _parked = control.park().unwrap();
        let (commands, _commands_rx) = command_queue(4);

        let server = ControlServer::new(ControlState { hub, commands, control }, None);
        let response = server
            .router()
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let report: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            report,
            serde_json::json!({
                "debugging_enabled": true,
                "paused": true,
                "waiting": 1,
                "observers": 1,
            })
        );
    }

    #[tokio::test]
    async fn unknown_path_without_assets_is_not_found() {
        let (joins, _joins_rx) = mpsc::unbounded_channel();
        let (commands, _commands_rx) = command_queue(4);
        let state = ControlState {
            hub: Arc::new(BroadcastHub::new(4, joins)),
            commands,
            control: Arc::new(DebugControl::new(false)),
        };

        let response = ControlServer::new(state, None)
            .router()
            .oneshot(Request::get("/index.html").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
