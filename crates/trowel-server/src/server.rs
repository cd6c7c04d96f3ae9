//! Development server implementation.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::{header, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::sync::{broadcast, mpsc};
use tower_http::services::ServeDir;

use trowel_pipeline::{Pipeline, Stage, StageReport};

use crate::watcher::{FileWatcher, WatchEvent};
use crate::websocket::{inject_script, livereload_client_script, ReloadHub, ReloadMessage};

const LIVERELOAD_PATH: &str = "/__livereload";
const LIVERELOAD_SCRIPT_PATH: &str = "/__livereload.js";
const LIVERELOAD_TAG: &str = r#"<script src="/__livereload.js"></script>"#;

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Pause between a finished rebuild and the reload broadcast
    pub reload_delay: Duration,

    /// Send banner notifications to browsers
    pub notify: bool,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            reload_delay: Duration::from_millis(50),
            notify: true,
            open: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind to {0}: {1}")]
    Bind(String, String),

    #[error("File watch error: {0}")]
    Watch(String),

    #[error("Server error: {0}")]
    Serve(String),
}

/// Shared server state.
struct ServerState {
    hub: ReloadHub,
    script: String,
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
    pipeline: Arc<Pipeline>,
    hub: ReloadHub,
}

impl DevServer {
    /// Create a server for the pipelines' output tree.
    pub fn new(config: DevServerConfig, pipeline: Arc<Pipeline>) -> Self {
        Self {
            config,
            pipeline,
            hub: ReloadHub::new(),
        }
    }

    /// Start watching and serving. Runs until the process is stopped.
    pub async fn start(self) -> Result<(), ServerError> {
        let bind = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .map_err(|e| ServerError::Bind(bind.clone(), e.to_string()))?;
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::Bind(bind, e.to_string()))?;

        let paths = self.pipeline.paths();
        let watch_paths = vec![
            paths.src.css.clone(),
            paths.src.js.clone(),
            paths.src.html.clone(),
        ];
        let (watcher, rx) =
            FileWatcher::new(&watch_paths).map_err(|e| ServerError::Watch(e.to_string()))?;

        let rebuilder = Rebuilder {
            pipeline: Arc::clone(&self.pipeline),
            hub: self.hub.clone(),
            reload_delay: self.config.reload_delay,
            notify: self.config.notify,
        };
        tokio::spawn(async move {
            rebuilder.run(rx).await;
            // Keep watcher alive
            drop(watcher);
        });

        let app = router(&self.pipeline.paths().dist_root, self.hub.clone());

        tracing::info!("Serving {} at http://{}", paths.dist_root.display(), addr);

        if self.config.open {
            let url = format!("http://{}", addr);
            if let Err(e) = open::that(&url) {
                tracing::warn!("Failed to open browser: {}", e);
            }
        }

        serve(listener, app).await
    }
}

/// Routes for the live reload endpoints, with everything else served from
/// `root`.
fn router(root: &Path, hub: ReloadHub) -> Router {
    let state = Arc::new(ServerState {
        hub,
        script: livereload_client_script(LIVERELOAD_PATH),
    });

    Router::new()
        .route(LIVERELOAD_PATH, get(ws_handler))
        .route(LIVERELOAD_SCRIPT_PATH, get(script_handler))
        .fallback_service(ServeDir::new(root))
        .layer(middleware::from_fn(inject_livereload))
        .with_state(state)
}

async fn serve(listener: tokio::net::TcpListener, app: Router) -> Result<(), ServerError> {
    axum::serve(listener, app)
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))
}

/// Add the live reload script tag to full HTML responses.
async fn inject_livereload(request: Request, next: Next) -> Response {
    let is_head = request.method() == Method::HEAD;
    let response = next.run(request).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));

    if is_head || !is_html || response.status() != StatusCode::OK {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to read response body: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_script(&String::from_utf8_lossy(&bytes), LIVERELOAD_TAG);
    parts.headers.remove(header::CONTENT_LENGTH);

    Response::from_parts(parts, Body::from(html))
}

/// Handler for the live reload WebSocket endpoint.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    let rx = state.hub.subscribe();
    ws.on_upgrade(move |socket| handle_ws(socket, rx))
}

/// Forward reload messages to one browser until it hangs up.
async fn handle_ws(mut socket: WebSocket, mut rx: broadcast::Receiver<ReloadMessage>) {
    if !send_message(&mut socket, &ReloadMessage::Connected).await {
        return;
    }

    loop {
        let msg = match rx.recv().await {
            Ok(msg) => msg,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!("Browser lagged {} messages, reloading", skipped);
                ReloadMessage::Reload
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        if !send_message(&mut socket, &msg).await {
            break;
        }
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ReloadMessage) -> bool {
    let Some(json) = msg.to_json() else {
        return false;
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

/// Handler for the live reload client script.
async fn script_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        state.script.clone(),
    )
}

/// Re-runs stages for watch events, one batch at a time.
struct Rebuilder {
    pipeline: Arc<Pipeline>,
    hub: ReloadHub,
    reload_delay: Duration,
    notify: bool,
}

impl Rebuilder {
    async fn run(&self, mut rx: mpsc::Receiver<WatchEvent>) {
        while let Some(event) = rx.recv().await {
            let mut stages = Vec::new();
            self.queue(&event, &mut stages);

            // Coalesce whatever piled up while the last batch ran
            while let Ok(event) = rx.try_recv() {
                self.queue(&event, &mut stages);
            }

            for stage in stages {
                self.rebuild(stage).await;
            }
        }
    }

    fn queue(&self, event: &WatchEvent, stages: &mut Vec<Stage>) {
        let Some(stage) = self.pipeline.stage_for(event.path()) else {
            return;
        };

        tracing::debug!("{:?} -> {}", event, stage);
        if !stages.contains(&stage) {
            stages.push(stage);
        }
    }

    async fn rebuild(&self, stage: Stage) {
        let pipeline = Arc::clone(&self.pipeline);
        let result = tokio::task::spawn_blocking(move || pipeline.run_stage(stage)).await;

        let report = match result {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                tracing::error!("{} rebuild failed: {}", stage, e);
                self.notify(format!("{} rebuild failed", stage));
                return;
            }
            Err(e) => {
                tracing::error!("{} rebuild panicked: {}", stage, e);
                return;
            }
        };

        if report.failed > 0 {
            self.notify(format!("{}: {} failed, see terminal", stage, report.failed));
        }

        let messages = reload_messages(&report, &self.pipeline.paths().dist_root);
        if messages.is_empty() {
            return;
        }

        tokio::time::sleep(self.reload_delay).await;
        for msg in messages {
            self.hub.send(msg);
        }
    }

    fn notify(&self, message: String) {
        if self.notify {
            self.hub.send(ReloadMessage::Notify { message });
        }
    }
}

/// What browsers should do after a stage run.
///
/// Styles swap each rewritten sheet in place; any other stage reloads the
/// page, but only when it wrote something.
fn reload_messages(report: &StageReport, dist_root: &Path) -> Vec<ReloadMessage> {
    if !report.changed() {
        return Vec::new();
    }

    match report.stage {
        Stage::Styles => report
            .written
            .iter()
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("css"))
            .map(|p| ReloadMessage::Css {
                path: url_path(p, dist_root),
            })
            .collect(),
        _ => vec![ReloadMessage::Reload],
    }
}

/// URL path of an output file.
fn url_path(path: &Path, dist_root: &Path) -> String {
    let relative = path.strip_prefix(dist_root).unwrap_or(path);
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    format!("/{}", parts.join("/"))
}
