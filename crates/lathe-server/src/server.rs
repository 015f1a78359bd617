//! Development server implementation.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use lathe_pipeline::{AssetTasks, BrowserSelection, ReloadKind, WatchTable};

use crate::browser::launch_browsers;
use crate::livereload::{
    client_script, inject_client, ReloadHub, ReloadMessage, SCRIPT_PATH, SOCKET_PATH,
};
use crate::watcher::{FileWatcher, WatchEvent};

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Open browser(s) once listening
    pub open: bool,

    /// Which browser(s) to open
    pub browser: BrowserSelection,

    /// Pause between a rebuild finishing and the reload broadcast
    pub reload_delay: Duration,

    /// Show an in-page banner on connect and reload
    pub notify: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
            open: true,
            browser: BrowserSelection::Default,
            reload_delay: Duration::from_millis(50),
            notify: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    AddressError(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),

    #[error("Server stopped: {0}")]
    ServeError(String),
}

/// Shared server state.
struct ServerState {
    config: DevServerConfig,
    roots: Vec<PathBuf>,
    hub: ReloadHub,
    tasks: Arc<AssetTasks>,
    watch: WatchTable,
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
    tasks: Arc<AssetTasks>,
}

impl DevServer {
    /// Create a server for the layout `tasks` was built with.
    pub fn new(config: DevServerConfig, tasks: Arc<AssetTasks>) -> Self {
        Self { config, tasks }
    }

    /// Start the server. Runs until the process is stopped.
    pub async fn start(self) -> Result<(), ServerError> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|_| {
                ServerError::AddressError(format!("{}:{}", self.config.host, self.config.port))
            })?;

        let layout = self.tasks.layout();
        let watch =
            WatchTable::for_layout(layout).map_err(|e| ServerError::WatchError(e.to_string()))?;
        let (watcher, mut rx) = FileWatcher::new(&layout.watch_roots)
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let state = Arc::new(ServerState {
            roots: layout.serve_roots.clone(),
            config: self.config.clone(),
            hub: ReloadHub::new(),
            tasks: Arc::clone(&self.tasks),
            watch,
        });

        // Spawn file watch handler
        let state_clone = Arc::clone(&state);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                handle_watch_event(&state_clone, event).await;
            }
            // Keep watcher alive
            drop(watcher);
        });

        let app = router(state);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        let url = format!("http://{}", addr);
        tracing::info!("Serving {} at {}", self.tasks.layout().variant, url);
        for root in &self.tasks.layout().serve_roots {
            tracing::debug!("Static root: {}", root.display());
        }

        if self.config.open {
            launch_browsers(&url, &self.config.browser);
        }

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::ServeError(e.to_string()))?;

        Ok(())
    }
}

fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route(SOCKET_PATH, get(ws_handler))
        .route(SCRIPT_PATH, get(script_handler))
        .fallback(static_handler)
        .with_state(state)
}

/// Rerun the task registered for a changed file, then refresh browsers.
async fn handle_watch_event(state: &ServerState, event: WatchEvent) {
    let path = event.path();

    let Some(rule) = state.watch.lookup(path) else {
        tracing::debug!("Ignoring change to {}", path.display());
        return;
    };

    tracing::info!("{} changed, running '{}'", path.display(), rule.task);

    match state.tasks.run_blocking(rule.task).await {
        Ok(outcome) => {
            tracing::debug!(
                "'{}' wrote {} files",
                rule.task,
                outcome.files_written
            );
        }
        Err(e) => {
            tracing::warn!("'{}' failed: {}", rule.task, e);
        }
    }

    tokio::time::sleep(state.config.reload_delay).await;

    let msg = match rule.reload {
        ReloadKind::Full => ReloadMessage::Reload,
        ReloadKind::Css => ReloadMessage::InjectCss {
            path: state.tasks.layout().stylesheet_url(),
        },
    };
    state.hub.send(msg);
}

/// Serve files from the static roots, first root with a match wins.
///
/// `ServeDir` decodes the path, refuses `..` and maps directories to their
/// `index.html`. HTML responses get the live reload client injected.
async fn static_handler(State(state): State<Arc<ServerState>>, request: Request) -> Response {
    let (parts, _) = request.into_parts();

    for root in &state.roots {
        let response = match ServeDir::new(root).oneshot(replay(&parts)).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        if response.status() != StatusCode::NOT_FOUND {
            return with_client(response.map(Body::new)).await;
        }
    }

    (StatusCode::NOT_FOUND, "Not found").into_response()
}

/// A body-less copy of a request, so it can be offered to each root.
fn replay(parts: &Parts) -> Request {
    let mut request = Request::new(Body::empty());
    *request.method_mut() = parts.method.clone();
    *request.uri_mut() = parts.uri.clone();
    *request.headers_mut() = parts.headers.clone();
    request
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/html"))
}

async fn with_client(response: Response) -> Response {
    if response.status() != StatusCode::OK || !is_html(&response) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let html = inject_client(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

/// Handler for the live reload WebSocket endpoint.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Forward hub messages to one connected browser.
async fn handle_ws(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut rx = state.hub.subscribe();

    if send_json(&mut socket, &ReloadMessage::Connected).await.is_err() {
        return;
    }

    while let Ok(msg) = rx.recv().await {
        if send_json(&mut socket, &msg).await.is_err() {
            break;
        }
    }
}

async fn send_json(socket: &mut WebSocket, msg: &ReloadMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    socket.send(Message::Text(json.into())).await
}

/// Handler for the live reload client script.
async fn script_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    (
        [("content-type", "application/javascript")],
        client_script(state.config.notify),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lathe_pipeline::{Layout, LayoutVariant};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn state(root: &Path, variant: LayoutVariant) -> Arc<ServerState> {
        let layout = Layout::new(variant, root);
        Arc::new(ServerState {
            config: DevServerConfig {
                reload_delay: Duration::from_millis(1),
                ..Default::default()
            },
            roots: layout.serve_roots.clone(),
            hub: ReloadHub::new(),
            watch: WatchTable::for_layout(&layout).unwrap(),
            tasks: Arc::new(AssetTasks::new(layout, "es2018")),
        })
    }

    async fn get_body(state: Arc<ServerState>, uri: &str) -> (StatusCode, String) {
        let response = router(state)
            .oneshot(
                axum::http::Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn default_config_matches_serve_defaults() {
        let config = DevServerConfig::default();

        assert_eq!(config.port, 9000);
        assert_eq!(config.reload_delay, Duration::from_millis(50));
        assert_eq!(config.browser, BrowserSelection::Default);
        assert!(config.notify);
    }

    #[tokio::test]
    async fn earlier_roots_win() {
        let temp = tempdir().unwrap();
        write(temp.path(), "css/style.css", "a{}");
        write(temp.path(), "style.css", "b{}");
        write(temp.path(), "js/app.js", "go();");

        let state = state(temp.path(), LayoutVariant::Root);

        let (status, body) = get_body(state.clone(), "/style.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "a{}");

        let (_, body) = get_body(state, "/app.js").await;
        assert_eq!(body, "go();");
    }

    #[tokio::test]
    async fn decodes_encoded_file_names() {
        let temp = tempdir().unwrap();
        write(temp.path(), "my page.html", "<body>spaced</body>");

        let (status, body) =
            get_body(state(temp.path(), LayoutVariant::Root), "/my%20page.html").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("<body>spaced<script"));
    }

    #[tokio::test]
    async fn refuses_parent_segments() {
        let temp = tempdir().unwrap();
        write(temp.path(), "secret.txt", "x");
        write(temp.path(), "app/dev/html/index.html", "<p>home</p>");

        let (status, _) =
            get_body(state(temp.path(), LayoutVariant::App), "/../../../secret.txt").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serves_html_with_client_injected() {
        let temp = tempdir().unwrap();
        write(temp.path(), "index.html", "<html><body><p>home</p></body></html>");
        write(temp.path(), "css/style.css", "a{color:red}");

        let (status, body) = get_body(state(temp.path(), LayoutVariant::Root), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"<script src="/__livereload.js"></script></body>"#));

        let (status, body) =
            get_body(state(temp.path(), LayoutVariant::Root), "/style.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "a{color:red}");

        let (status, _) = get_body(state(temp.path(), LayoutVariant::Root), "/nope.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serves_client_script() {
        let temp = tempdir().unwrap();
        let (status, body) =
            get_body(state(temp.path(), LayoutVariant::Root), SCRIPT_PATH).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("inject_css"));
    }

    #[tokio::test]
    async fn scss_change_recompiles_then_injects_css() {
        let temp = tempdir().unwrap();
        write(temp.path(), "app/dev/sass/style.scss", ".a { b: c; }");
        let state = state(temp.path(), LayoutVariant::App);
        let mut rx = state.hub.subscribe();

        let changed = temp.path().join("app/dev/sass/style.scss");
        handle_watch_event(&state, WatchEvent::Modified(changed)).await;

        assert!(temp.path().join("app/temp/css/style.css").exists());
        assert_eq!(
            rx.try_recv().unwrap(),
            ReloadMessage::InjectCss {
                path: "/style.css".to_string()
            }
        );
    }

    #[tokio::test]
    async fn failed_rebuild_still_reloads() {
        let temp = tempdir().unwrap();
        write(temp.path(), "js/app.js", "function (");
        let state = state(temp.path(), LayoutVariant::Root);
        let mut rx = state.hub.subscribe();

        handle_watch_event(&state, WatchEvent::Modified(temp.path().join("js/app.js"))).await;

        assert_eq!(rx.try_recv().unwrap(), ReloadMessage::Reload);
    }

    #[tokio::test]
    async fn unrelated_change_is_ignored() {
        let temp = tempdir().unwrap();
        let state = state(temp.path(), LayoutVariant::Root);
        let mut rx = state.hub.subscribe();

        handle_watch_event(&state, WatchEvent::Modified(temp.path().join("notes.txt"))).await;

        assert!(rx.try_recv().is_err());
    }
}
