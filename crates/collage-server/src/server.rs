//! Development server implementation.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use collage_static::{BuildConfig, StaticBuilder};
use tower_http::services::ServeDir;

use crate::watcher::{FileWatcher, WatchEvent};
use crate::websocket::{reload_client_script, ReloadHub, ReloadMessage};

const RELOAD_SOCKET_PATH: &str = "/__livereload";
const RELOAD_SCRIPT_PATH: &str = "/__livereload.js";

/// Quiet period after a change before rebuilding, so bursts of editor
/// writes trigger one build.
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Resolved build configuration
    pub build: BuildConfig,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,
}

impl DevServerConfig {
    /// Default server settings for a build configuration.
    pub fn new(build: BuildConfig) -> Self {
        Self {
            build,
            port: 7777,
            host: "127.0.0.1".to_string(),
            open: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),
}

/// Shared server state.
struct ServerState {
    config: DevServerConfig,
    hub: ReloadHub,
    builder: StaticBuilder,
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
}

impl DevServer {
    /// Create a new development server.
    pub fn new(config: DevServerConfig) -> Self {
        Self { config }
    }

    /// Build once, then serve the output and rebuild on every source change.
    pub async fn start(self) -> Result<(), ServerError> {
        let host_port = format!("{}:{}", self.config.host, self.config.port);
        let addr: SocketAddr = host_port
            .parse()
            .map_err(|_| ServerError::InvalidAddress(host_port))?;

        let state = Arc::new(ServerState {
            builder: StaticBuilder::new(self.config.build.clone()),
            config: self.config.clone(),
            hub: ReloadHub::new(),
        });

        rebuild(&state).await;

        let (watcher, mut rx) = FileWatcher::new(&self.config.build)
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let state_clone = Arc::clone(&state);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                handle_watch_event(&state_clone, event, &mut rx).await;
            }
            // Keep watcher alive
            drop(watcher);
        });

        let app = Router::new()
            .route("/", get(index_handler))
            .route(RELOAD_SOCKET_PATH, get(ws_handler))
            .route(RELOAD_SCRIPT_PATH, get(reload_script_handler))
            .fallback_service(ServeDir::new(&self.config.build.output_dir))
            .with_state(state);

        tracing::info!("Starting dev server at http://{}", addr);

        if self.config.open {
            let url = format!("http://{}", addr);
            let _ = open::that(&url);
        }

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

/// Handle a file watch event, folding any events that arrive within the
/// debounce window into one rebuild.
async fn handle_watch_event(
    state: &ServerState,
    event: WatchEvent,
    rx: &mut tokio::sync::mpsc::Receiver<WatchEvent>,
) {
    match &event {
        WatchEvent::TemplateModified(path) => tracing::info!("Template modified: {}", path.display()),
        WatchEvent::FragmentModified(path) => tracing::info!("Fragment modified: {}", path.display()),
        WatchEvent::StyleModified(path) => tracing::info!("Stylesheet modified: {}", path.display()),
        other => tracing::debug!("Source changed: {}", other.path().display()),
    }

    tokio::time::sleep(DEBOUNCE).await;
    while rx.try_recv().is_ok() {}

    rebuild(state).await;
}

/// Run a full build and notify clients of the outcome.
async fn rebuild(state: &ServerState) {
    match state.builder.build().await {
        Ok(_) => state.hub.send(ReloadMessage::Reload),
        Err(e) => {
            tracing::error!("{}", e);
            state.hub.send(ReloadMessage::BuildFailed {
                stage: e.stage().to_string(),
                message: e.to_string(),
            });
        }
    }
}

/// Handler for the built page, with the reload script injected.
async fn index_handler(State(state): State<Arc<ServerState>>) -> Response {
    let path = &state.config.build.output_html;

    match tokio::fs::read_to_string(path).await {
        Ok(html) => Html(inject_reload_script(&html)).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(inject_reload_script(&format!(
                "<!DOCTYPE html><html><body><h1>No page yet</h1><p>{}: {}</p></body></html>",
                path.display(),
                e
            ))),
        )
            .into_response(),
    }
}

/// Insert the reload script tag before the closing body tag.
fn inject_reload_script(html: &str) -> String {
    let tag = format!(r#"<script src="{}"></script>"#, RELOAD_SCRIPT_PATH);
    match html.rfind("</body>") {
        Some(index) => format!("{}{}{}", &html[..index], tag, &html[index..]),
        None => format!("{}{}", html, tag),
    }
}

/// Handler for the live reload WebSocket endpoint.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_ws(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut rx = state.hub.subscribe();

    if send_message(&mut socket, &ReloadMessage::Connected).await.is_err() {
        return;
    }

    while let Ok(msg) = rx.recv().await {
        if send_message(&mut socket, &msg).await.is_err() {
            break;
        }
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    socket.send(Message::Text(json.into())).await
}

/// Handler for the live reload client script.
async fn reload_script_handler() -> impl IntoResponse {
    let script = reload_client_script(RELOAD_SOCKET_PATH);
    ([("content-type", "application/javascript")], script)
}
