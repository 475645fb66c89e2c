//! In-process mock of the panel backend.
//!
//! Serves the upload, generate, result, health, image-proxy and push
//! endpoints on an ephemeral local port and records what it receives.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

/// How the mock answers uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadBehaviour {
    #[default]
    Accept,
    /// 500 with `{"status":"error","message":"disk full"}`.
    DiskFull,
    /// 502 with an HTML error page.
    Html,
}

/// One multipart upload as received.
#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// One job submission as received.
#[derive(Debug, Clone)]
pub struct RecordedSubmission {
    pub client_id_header: Option<String>,
    pub body: Value,
}

#[derive(Debug, Default)]
pub struct MockPanel {
    pub upload_behaviour: UploadBehaviour,
    /// Result queries answered "running" before the image appears.
    pub pending_polls: u32,
    /// Frames sent to every push client right after the handshake.
    pub push_frames: Vec<String>,
    pub uploads: Mutex<Vec<RecordedUpload>>,
    pub submissions: Mutex<Vec<RecordedSubmission>>,
    pub result_polls: AtomicU32,
    pub push_client_ids: Mutex<Vec<String>>,
}

impl MockPanel {
    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn result_polls(&self) -> u32 {
        self.result_polls.load(Ordering::SeqCst)
    }
}

/// Bind the mock on `127.0.0.1:0` and return its base URL.
pub async fn spawn_panel(panel: MockPanel) -> (String, Arc<MockPanel>) {
    let panel = Arc::new(panel);
    let app = Router::new()
        .route("/health", get(health))
        .route("/api/upload", post(upload))
        .route("/api/generate", post(generate))
        .route("/api/result", get(result))
        .route("/api/proxy/view", get(proxy_view))
        .route("/ws", get(push))
        .with_state(Arc::clone(&panel));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), panel)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "server": true }))
}

async fn upload(State(panel): State<Arc<MockPanel>>, mut multipart: Multipart) -> Response {
    match panel.upload_behaviour {
        UploadBehaviour::DiskFull => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": "disk full" })),
            )
                .into_response();
        }
        UploadBehaviour::Html => {
            return (StatusCode::BAD_GATEWAY, "<html><body>Bad Gateway</body></html>")
                .into_response();
        }
        UploadBehaviour::Accept => {}
    }

    let mut path = None;
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.unwrap().to_vec();
        path = Some(format!("/srv/uploads/{file_name}"));
        panel.uploads.lock().unwrap().push(RecordedUpload {
            field: name,
            file_name,
            bytes,
        });
    }

    Json(json!({ "status": "success", "path": path })).into_response()
}

async fn generate(
    State(panel): State<Arc<MockPanel>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let mut submissions = panel.submissions.lock().unwrap();
    submissions.push(RecordedSubmission {
        client_id_header: headers
            .get("x-client-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });
    Json(json!({ "status": "success", "prompt_id": format!("job-{}", submissions.len()) }))
}

async fn result(
    State(panel): State<Arc<MockPanel>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let polls = panel.result_polls.fetch_add(1, Ordering::SeqCst) + 1;
    let Some(prompt_id) = query.get("prompt_id") else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "missing prompt_id" })))
            .into_response();
    };
    if polls <= panel.pending_polls {
        return Json(json!({ "status": "running" })).into_response();
    }
    Json(json!({
        "status": "success",
        "images": [{ "url": format!("/api/proxy/view?filename={prompt_id}.png&type=output") }],
    }))
    .into_response()
}

async fn proxy_view(Query(query): Query<HashMap<String, String>>) -> Response {
    match query.get("filename") {
        Some(name) => (StatusCode::OK, format!("PNG:{name}")).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn push(
    State(panel): State<Arc<MockPanel>>,
    Query(query): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    if let Some(client_id) = query.get("clientId") {
        panel.push_client_ids.lock().unwrap().push(client_id.clone());
    }
    ws.on_upgrade(move |socket| send_frames(socket, panel))
}

async fn send_frames(mut socket: WebSocket, panel: Arc<MockPanel>) {
    for frame in &panel.push_frames {
        if socket.send(Message::Text(frame.clone().into())).await.is_err() {
            return;
        }
    }
    // Keep the connection open until the client goes away.
    while let Some(Ok(_)) = socket.recv().await {}
}
