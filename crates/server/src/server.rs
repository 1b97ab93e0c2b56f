use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;

use facemood_core::pipeline::payload_encoder::StreamPayload;
use facemood_core::streaming::session::{SessionError, SessionState, StreamSession};
use facemood_core::streaming::viewer_registry::{ViewerGone, ViewerRegistry, ViewerSink};

const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Text command a viewer sends to begin streaming.
pub const START_COMMAND: &str = "start_processing";

#[derive(Clone)]
pub struct AppState {
    session: Arc<Mutex<StreamSession>>,
    registry: Arc<ViewerRegistry>,
}

impl AppState {
    pub fn new(session: Arc<Mutex<StreamSession>>, registry: Arc<ViewerRegistry>) -> Self {
        Self { session, registry }
    }

    // Session calls open devices and join threads, so they stay off the
    // async workers.
    async fn with_session<T, F>(&self, f: F) -> Result<T, SessionError>
    where
        T: Send + 'static,
        F: FnOnce(&mut StreamSession) -> Result<T, SessionError> + Send + 'static,
    {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&session);
            f(&mut *guard)
        })
        .await
        .unwrap_or_else(|e| {
            log::error!("Session task failed: {e}");
            Err(SessionError::WorkerPanicked)
        })
    }
}

fn lock(session: &Mutex<StreamSession>) -> MutexGuard<'_, StreamSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/status", get(status))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// Serves until Ctrl-C, then stops the streaming session.
pub async fn serve(bind: &str, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    log::info!("Viewer page at http://{}", listener.local_addr()?);

    let app = router(state.clone());
    let server = async move { axum::serve(listener, app).await };
    tokio::select! {
        result = server => result?,
        _ = tokio::signal::ctrl_c() => log::info!("Shutdown requested"),
    }

    state.with_session(|session| session.stop()).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Serialize)]
struct StatusBody {
    state: SessionState,
    viewers: usize,
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let session_state = state
        .with_session(|session| Ok(session.state()))
        .await
        .unwrap_or(SessionState::Stopped);
    Json(StatusBody {
        state: session_state,
        viewers: state.registry.len(),
    })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| viewer_connection(socket, state))
}

enum Outgoing {
    Frame(Arc<StreamPayload>),
    Reply(String),
}

/// Forwards payloads to one socket's writer task. Never blocks.
struct SocketViewer {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl ViewerSink for SocketViewer {
    fn deliver(&self, payload: Arc<StreamPayload>) -> Result<(), ViewerGone> {
        self.tx
            .send(Outgoing::Frame(payload))
            .map_err(|_| ViewerGone)
    }
}

async fn viewer_connection(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outgoing>();
    let viewer_id = state
        .registry
        .register(Box::new(SocketViewer { tx: tx.clone() }));

    let writer = tokio::spawn(async move {
        while let Some(outgoing) = rx.recv().await {
            let text = match outgoing {
                Outgoing::Frame(payload) => match payload.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        log::warn!("Dropping payload: {e}");
                        continue;
                    }
                },
                Outgoing::Reply(text) => text,
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) if text.trim() == START_COMMAND => {
                let result = state.with_session(|session| session.start()).await;
                if tx.send(Outgoing::Reply(start_reply(&result))).is_err() {
                    break;
                }
            }
            Message::Text(text) => log::debug!("Ignoring viewer message: {text}"),
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.registry.unregister(viewer_id);
    writer.abort();
}

/// JSON acknowledgement for a start command.
pub fn start_reply(result: &Result<(), SessionError>) -> String {
    let reply = match result {
        Ok(()) => serde_json::json!({ "status": "started" }),
        Err(SessionError::AlreadyRunning) => serde_json::json!({ "status": "already_running" }),
        Err(e) => {
            log::error!("Could not start streaming: {e}");
            serde_json::json!({ "status": "error", "message": e.to_string() })
        }
    };
    reply.to_string()
}
