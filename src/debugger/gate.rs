//! Interception gate.
//!
//! Every request and response passes through here on its way through the
//! proxy. The gate publishes a capture to all observers and, while
//! debugging is enabled, parks the calling handler until an operator lets
//! it go.

use std::sync::Arc;
use std::time::Duration;

use crate::control::hub::BroadcastHub;
use crate::control::protocol::Update;
use crate::debugger::state::{DebugControl, Parked, Resume};
use crate::net::connection::ConnectionId;
use crate::observability::metrics;
use crate::proxy::dump;
use crate::proxy::{CapturedRequest, CapturedResponse};

/// Which half of an exchange is being held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Request,
    Response,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Request => f.write_str("request"),
            Phase::Response => f.write_str("response"),
        }
    }
}

pub struct InterceptionGate {
    control: Arc<DebugControl>,
    hub: Arc<BroadcastHub>,
    /// Upper bound on a single pause. `None` waits indefinitely.
    pause_timeout: Option<Duration>,
}

impl InterceptionGate {
    pub fn new(
        control: Arc<DebugControl>,
        hub: Arc<BroadcastHub>,
        pause_timeout: Option<Duration>,
    ) -> Self {
        Self {
            control,
            hub,
            pause_timeout,
        }
    }

    /// Capture a request and hold it while debugging is on.
    pub async fn on_request(&self, conn: ConnectionId, request: CapturedRequest) -> CapturedRequest {
        let parked = self.control.park();
        self.hub.broadcast(Update::RequestCaptured {
            dump: dump::dump_request(&request),
            host: dump::request_host(&request),
            request_uri: request.uri().to_string(),
        });
        self.hold(conn, Phase::Request, parked).await;
        request
    }

    /// Capture a response and hold it while debugging is on.
    pub async fn on_response(&self, conn: ConnectionId, response: CapturedResponse) -> CapturedResponse {
        let parked = self.control.park();
        self.hub.broadcast(Update::ResponseCaptured {
            dump: dump::dump_response(&response),
        });
        self.hold(conn, Phase::Response, parked).await;
        response
    }

    /// The handle is taken before the capture goes out, so an operator who
    /// reacts to the capture always finds this handler parked.
    async fn hold(&self, conn: ConnectionId, phase: Phase, parked: Option<Parked>) {
        let Some(mut parked) = parked else {
            return;
        };
        self.publish_paused();
        tracing::info!(connection_id = %conn, %phase, waiter = parked.id(), "Paused, waiting for operator");

        let resume = self.wait(&mut parked).await;
        self.publish_paused();

        match resume {
            Resume::TimedOut => {
                tracing::warn!(connection_id = %conn, %phase, "Pause timed out, forcing resume")
            }
            other => {
                tracing::info!(connection_id = %conn, %phase, reason = other.name(), "Resumed")
            }
        }
    }

    async fn wait(&self, parked: &mut Parked) -> Resume {
        let Some(limit) = self.pause_timeout else {
            // The sender only disappears with the state itself.
            return parked.receiver().await.unwrap_or(Resume::Continued);
        };

        match tokio::time::timeout(limit, parked.receiver()).await {
            Ok(resume) => resume.unwrap_or(Resume::Continued),
            Err(_) => {
                if !self.control.forget(parked) {
                    // Released between the deadline and the lock.
                    if let Ok(resume) = parked.receiver().try_recv() {
                        return resume;
                    }
                }
                Resume::TimedOut
            }
        }
    }

    fn publish_paused(&self) {
        metrics::set_paused_handlers(self.control.snapshot().waiting);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::hub::SessionId;
    use axum::body::Bytes;
    use axum::http::{Request, Response};
    use tokio::sync::mpsc;

    fn setup(
        enabled: bool,
        pause_timeout: Option<Duration>,
    ) -> (
        Arc<InterceptionGate>,
        Arc<DebugControl>,
        crate::control::hub::UpdateReceiver,
        mpsc::UnboundedReceiver<SessionId>,
    ) {
        let (joins_tx, joins_rx) = mpsc::unbounded_channel();
        let hub = Arc::new(BroadcastHub::new(16, joins_tx));
        let (_, updates) = hub.register();
        let control = Arc::new(DebugControl::new(enabled));
        let gate = Arc::new(InterceptionGate::new(control.clone(), hub, pause_timeout));
        (gate, control, updates, joins_rx)
    }

    fn request() -> CapturedRequest {
        Request::builder()
            .uri("/x")
            .header("host", "upstream:4444")
            .body(Bytes::new())
            .unwrap()
    }

    fn response() -> CapturedResponse {
        Response::builder().status(200).body(Bytes::from_static(b"hi")).unwrap()
    }

    #[tokio::test]
    async fn passes_through_when_disabled() {
        let (gate, control, mut updates, _joins) = setup(false, None);

        let out = gate.on_request(ConnectionId::new(), request()).await;
        assert_eq!(out.uri(), "/x");
        let out = gate.on_response(ConnectionId::new(), response()).await;
        assert_eq!(out.body().as_ref(), b"hi");

        assert!(matches!(
            *updates.recv().await.unwrap(),
            Update::RequestCaptured { ref host, ref request_uri, .. }
                if host == "upstream:4444" && request_uri == "/x"
        ));
        assert!(matches!(
            *updates.recv().await.unwrap(),
            Update::ResponseCaptured { .. }
        ));
        assert!(!control.snapshot().paused);
    }

    #[tokio::test]
    async fn blocks_until_continue() {
        let (gate, control, mut updates, _joins) = setup(true, None);

        let task = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.on_request(ConnectionId::new(), request()).await })
        };

        // Already parked by the time the capture arrives.
        updates.recv().await.unwrap();
        assert!(control.snapshot().paused);
        assert!(!task.is_finished());

        assert!(control.resume());
        let out = task.await.unwrap();
        assert_eq!(out.uri(), "/x");
        assert!(!control.snapshot().paused);
    }

    #[tokio::test]
    async fn disable_force_resumes() {
        let (gate, control, _updates, _joins) = setup(true, None);

        let task = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.on_response(ConnectionId::new(), response()).await })
        };
        while !control.snapshot().paused {
            tokio::task::yield_now().await;
        }

        assert!(control.disable().released);
        let out = task.await.unwrap();
        assert_eq!(out.status(), 200);
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_wait_forces_resume() {
        let (gate, control, _updates, _joins) = setup(true, Some(Duration::from_secs(5)));

        let out = gate.on_request(ConnectionId::new(), request()).await;
        assert_eq!(out.uri(), "/x");
        assert!(!control.snapshot().paused);
        // The abandoned handle must not swallow a later continue.
        assert!(!control.resume());
    }
}
