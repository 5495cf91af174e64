//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use httpception::control::{Command, Update};
use httpception::{Application, ProxyConfig, Shutdown};

pub const WAIT: Duration = Duration::from_secs(5);

pub type Observer = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A running proxy on ephemeral ports.
pub struct TestProxy {
    pub proxy_addr: SocketAddr,
    pub control_addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestProxy {
    pub fn status_url(&self) -> String {
        format!("http://{}/status", self.control_addr)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a mock upstream that answers every request with `200 OK` / `hi`.
///
/// Each raw request it receives is forwarded on the returned channel.
pub async fn start_mock_upstream() -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let seen_tx = seen_tx.clone();
            tokio::spawn(async move {
                let raw = read_request(&mut socket).await;
                let _ = seen_tx.send(raw);
                let response = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nhi";
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, seen_rx)
}

/// Read one request head plus a `Content-Length` body.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let wanted = content_length(&text[..head_end]);
            if buf.len() >= head_end + 4 + wanted {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

pub fn test_config(upstream: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.upstream.address = upstream.to_string();
    config.upstream.connect_timeout_secs = 2;
    config.upstream.response_timeout_secs = 2;
    config.control.bind_address = "127.0.0.1:0".to_string();
    config
}

/// Bind and run an application in the background.
pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let app = Application::bind(config).await.unwrap();
    let proxy = TestProxy {
        proxy_addr: app.proxy_addr(),
        control_addr: app.control_addr(),
        shutdown: app.shutdown_handle(),
    };
    tokio::spawn(app.run());
    proxy
}

/// Connect an observer and consume its initial-state update.
pub async fn connect_observer(proxy: &TestProxy) -> (Observer, bool) {
    let url = format!("ws://{}/_socket", proxy.control_addr);
    let (mut observer, _) = connect_async(url.as_str()).await.unwrap();
    match next_update(&mut observer).await {
        Update::InitialState { enabled } => (observer, enabled),
        other => panic!("expected initial state, got {other:?}"),
    }
}

/// Next update frame, skipping pings.
pub async fn next_update(observer: &mut Observer) -> Update {
    tokio::time::timeout(WAIT, async {
        loop {
            match observer.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str::<Update>(text.as_str()).unwrap();
                }
                Some(Ok(Message::Close(_))) | None => panic!("observer socket closed"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("observer socket failed: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for update")
}

/// Assert that no update arrives within `within`.
pub async fn expect_silence(observer: &mut Observer, within: Duration) {
    if let Ok(update) = tokio::time::timeout(within, next_update(observer)).await {
        panic!("unexpected update {update:?}");
    }
}

pub async fn send_command(observer: &mut Observer, command: Command) {
    let frame = command.encode().unwrap();
    observer.send(Message::text(frame)).await.unwrap();
}

/// Send raw bytes to the proxy and read until it closes the connection.
pub async fn raw_exchange(proxy_addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(proxy_addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    read_to_close(stream).await
}

pub async fn read_to_close(mut stream: TcpStream) -> String {
    let mut buf = Vec::new();
    tokio::time::timeout(WAIT, stream.read_to_end(&mut buf))
        .await
        .expect("timed out waiting for proxy to close")
        .unwrap_or_default();
    String::from_utf8_lossy(&buf).into_owned()
}

/// Poll `/status` until `waiting` handlers are parked.
pub async fn wait_for_waiting(proxy: &TestProxy, waiting: u64) {
    let client = reqwest::Client::new();
    tokio::time::timeout(WAIT, async {
        loop {
            let status: serde_json::Value = client
                .get(proxy.status_url())
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if status["waiting"].as_u64() == Some(waiting) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for parked handlers");
}
