//! Scripted backend for exercising the client without the real service.
//!
//! Serves `GET /health` and `GET /ws/{session}`. Every WebSocket connection
//! replays the same script: one frame per non-empty line, with `{session}`
//! replaced by the requested session id. Pings from the client are answered
//! while the script plays; the server closes once the script is done.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{
        Path as UrlPath, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::channel::connector::SESSION_PLACEHOLDER;

/// Frames replayed to every connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockScript {
    frames: Vec<String>,
}

impl MockScript {
    pub fn new(frames: Vec<String>) -> Self {
        Self { frames }
    }

    /// Parse a JSON-lines script. Blank lines and lines starting with `//`
    /// are skipped; every other line is sent verbatim, so malformed frames
    /// can be scripted on purpose.
    pub fn parse(content: &str) -> Self {
        let frames = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("//"))
            .map(str::to_string)
            .collect();
        Self { frames }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script: {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames with `{session}` substituted.
    pub fn frames_for(&self, session: &str) -> Vec<String> {
        self.frames
            .iter()
            .map(|f| f.replace(SESSION_PLACEHOLDER, session))
            .collect()
    }
}

struct MockState {
    script: MockScript,
    delay: Duration,
    connections: AtomicU64,
}

/// Build the mock backend router.
pub fn build_router(script: MockScript, delay: Duration) -> Router {
    let state = Arc::new(MockState {
        script,
        delay,
        connections: AtomicU64::new(0),
    });
    Router::new()
        .route("/health", get(health))
        .route("/ws/{session}", get(ws_handler))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    UrlPath(session): UrlPath<String>,
    State(state): State<Arc<MockState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| replay(socket, session, state))
}

/// Replay the script over one socket, answering pings in between frames.
async fn replay(socket: WebSocket, session: String, state: Arc<MockState>) {
    let connection = state.connections.fetch_add(1, Ordering::SeqCst) + 1;
    info!(session = %session, connection, frames = state.script.len(), "mock client connected");

    let (mut sender, mut receiver) = socket.split();
    let mut frames = state.script.frames_for(&session).into_iter();
    let mut next_send = tokio::time::Instant::now();

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(next_send) => {
                let Some(frame) = frames.next() else { break };
                if sender.send(Message::Text(frame.into())).await.is_err() {
                    debug!(session = %session, connection, "client went away mid-script");
                    return;
                }
                next_send = tokio::time::Instant::now() + state.delay;
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(payload))) => {
                        if sender.send(Message::Pong(payload)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(session = %session, connection, "client closed");
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(session = %session, connection, error = %e, "socket error");
                        return;
                    }
                }
            }
        }
    }

    // Best-effort close frame
    let _ = sender.send(Message::Close(None)).await;
    debug!(session = %session, connection, "script finished");
}

/// Scripted backend bound to a local port.
pub struct MockBackend {
    script: MockScript,
    delay: Duration,
    shutdown_tx: Option<oneshot::Sender<()>>,
    addr: Option<SocketAddr>,
}

impl MockBackend {
    pub fn new(script: MockScript, delay: Duration) -> Self {
        Self {
            script,
            delay,
            shutdown_tx: None,
            addr: None,
        }
    }

    /// Start serving on `127.0.0.1:port` (0 picks a free port).
    ///
    /// Returns the endpoint template clients should use.
    pub async fn start(&mut self, port: u16) -> Result<String> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .context("Failed to bind mock backend")?;
        let addr = listener
            .local_addr()
            .context("Failed to get server address")?;
        self.addr = Some(addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.shutdown_tx = Some(shutdown_tx);

        let app = build_router(self.script.clone(), self.delay);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                warn!(error = %e, "mock backend server error");
            }
        });

        Ok(Self::template_for(addr))
    }

    /// Stop the server gracefully.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.addr = None;
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    fn template_for(addr: SocketAddr) -> String {
        format!("ws://{}/ws/{}", addr, SESSION_PLACEHOLDER)
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const SCRIPT: &str = r#"
// proj-42 happy path
{"type":"progress","percent":10,"status":"executing","message":"starting {session}"}
{"type":"log","message":"Installing deps","level":"info"}

{"type":"completion","success":true,"data":{"files":12}}
"#;

    fn is_sandbox_error(e: &anyhow::Error) -> bool {
        let err_chain = format!("{:?}", e);
        err_chain.contains("Operation not permitted")
            || err_chain.contains("Permission denied")
            || err_chain.contains("os error 1")
            || err_chain.contains("bind")
    }

    #[test]
    fn test_script_parse_skips_blank_and_comment_lines() {
        let script = MockScript::parse(SCRIPT);
        assert_eq!(script.len(), 3);
        assert!(script.frames()[0].contains("starting {session}"));
    }

    #[test]
    fn test_script_substitutes_session() {
        let script = MockScript::parse(SCRIPT);
        let frames = script.frames_for("proj-42");
        assert!(frames[0].contains("starting proj-42"));
        assert_eq!(frames[2], script.frames()[2]);
    }

    #[test]
    fn test_script_load_missing_file() {
        let err = MockScript::load(Path::new("/nonexistent/script.jsonl")).unwrap_err();
        assert!(err.to_string().contains("Failed to read script"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = build_router(MockScript::default(), Duration::ZERO);
        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_ws_route_requires_upgrade() {
        let app = build_router(MockScript::default(), Duration::ZERO);
        let request = Request::builder()
            .method("GET")
            .uri("/ws/proj-42")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_replays_script_over_websocket() {
        let mut backend = MockBackend::new(MockScript::parse(SCRIPT), Duration::ZERO);
        let template = match backend.start(0).await {
            Ok(template) => template,
            Err(e) if is_sandbox_error(&e) => {
                eprintln!("Skipping test_replays_script_over_websocket (sandbox): {:?}", e);
                return;
            }
            Err(e) => panic!("Unexpected error: {:?}", e),
        };
        assert!(template.starts_with("ws://127.0.0.1:"));
        assert!(template.ends_with("/ws/{session}"));

        let url = template.replace(SESSION_PLACEHOLDER, "proj-42");
        let (mut stream, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

        let mut texts = Vec::new();
        while let Some(msg) = stream.next().await {
            match msg.unwrap() {
                tokio_tungstenite::tungstenite::Message::Text(text) => {
                    texts.push(text.as_str().to_string())
                }
                tokio_tungstenite::tungstenite::Message::Close(_) => break,
                _ => {}
            }
        }
        assert_eq!(texts.len(), 3);
        assert!(texts[0].contains("starting proj-42"));

        backend.stop();
        assert!(backend.addr().is_none());
    }
}
