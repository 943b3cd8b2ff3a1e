//! 整合測試用的假 REST 後端。
//!
//! 在隨機埠上以記憶體提供 `/api/v1` 底下的各資源家族，並記錄收到的每個請求。

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use agent_console::{Backend, ConsoleSettings, HttpBackend};
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};

const PREFIX: &str = "/api/v1/";
pub const TOKEN_HEADER: &str = "x-console-token";

#[derive(Debug, Clone)]
pub struct ReceivedUpload {
    pub file_name: Option<String>,
    pub file: Vec<u8>,
    pub name: String,
    pub metadata: String,
}

#[derive(Default)]
pub struct FakeState {
    collections: HashMap<String, Vec<Value>>,
    next_id: i64,
    requests: Vec<String>,
    tokens: Vec<String>,
    uploads: Vec<ReceivedUpload>,
}

type Shared = Arc<Mutex<FakeState>>;

pub struct FakeServer {
    pub base_url: String,
    state: Shared,
}

impl FakeServer {
    /// 綁定 0 號埠，一直服務到測試的 runtime 結束。
    pub async fn start() -> Self {
        let state = Shared::default();
        let app = router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn settings(&self) -> ConsoleSettings {
        ConsoleSettings {
            base_url: self.base_url.clone(),
            base_url_env: Some(String::from("AGENT_CONSOLE_TEST_URL_UNSET")),
            ..ConsoleSettings::default()
        }
    }

    pub fn backend(&self) -> Arc<dyn Backend> {
        Arc::new(HttpBackend::new(self.settings()).unwrap())
    }

    pub fn seed(&self, collection: &str, records: Vec<Value>) {
        let mut state = self.lock();
        for record in &records {
            if let Some(id) = record["id"].as_i64() {
                state.next_id = state.next_id.max(id);
            }
        }
        state.collections.insert(collection.to_string(), records);
    }

    pub fn collection(&self, collection: &str) -> Vec<Value> {
        self.lock()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// 目前收到的請求，格式為 `"METHOD path"`，路徑相對於 API 前綴。
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.lock().tokens.clone()
    }

    pub fn uploads(&self) -> Vec<ReceivedUpload> {
        self.lock().uploads.clone()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/v1/agents", get(list))
        .route("/api/v1/agents/:id/activate", post(activate))
        .route("/api/v1/tools", get(list).post(create))
        .route("/api/v1/tools/:id", put(update).delete(remove))
        .route("/api/v1/file-context", get(list).post(create))
        .route("/api/v1/file-context/upload", post(upload))
        .route("/api/v1/group-chats", get(list).post(create))
        .route("/api/v1/group-chats/:id", put(update).delete(refuse_delete))
        .route("/api/v1/group-chats/:id/start", post(toggle))
        .route("/api/v1/group-chats/:id/stop", post(toggle))
        .route("/api/v1/model-providers", get(list).post(reject_provider))
        .route("/api/v1/model-providers/predefined", get(predefined))
        .route("/api/v1/chat/sessions/:session/messages", get(list).post(create))
        .route("/api/v1/code/execute", post(execute))
        .route("/api/v1/code/files/:id", put(save_file))
        .route("/api/v1/broken", get(broken))
        .with_state(state)
}

fn relative(uri: &Uri) -> String {
    uri.path().trim_start_matches(PREFIX).to_string()
}

/// 記錄請求並回傳已上鎖的狀態。
fn enter<'a>(
    state: &'a Shared,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
) -> MutexGuard<'a, FakeState> {
    let mut guard = state.lock().unwrap();
    guard.requests.push(format!("{method} {}", relative(uri)));
    if let Some(token) = headers.get(TOKEN_HEADER).and_then(|value| value.to_str().ok()) {
        guard.tokens.push(token.to_string());
    }
    guard
}

fn detail(status: StatusCode, detail: Value) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

/// 將 `collection/id`（或 `collection/id/action`）拆成集合與識別碼。
fn member(uri: &Uri) -> (String, String) {
    let path = relative(uri);
    let path = path
        .strip_suffix("/start")
        .or_else(|| path.strip_suffix("/stop"))
        .or_else(|| path.strip_suffix("/activate"))
        .unwrap_or(&path);
    match path.rsplit_once('/') {
        Some((collection, id)) => (collection.to_string(), id.to_string()),
        None => (path.to_string(), String::new()),
    }
}

fn id_matches(record: &Value, id: &str) -> bool {
    match &record["id"] {
        Value::Number(number) => number.to_string() == id,
        Value::String(text) => text == id,
        _ => false,
    }
}

async fn list(State(state): State<Shared>, method: Method, uri: Uri, headers: HeaderMap) -> Response {
    let guard = enter(&state, &method, &uri, &headers);
    let records = guard
        .collections
        .get(&relative(&uri))
        .cloned()
        .unwrap_or_default();
    Json(Value::Array(records)).into_response()
}

async fn create(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut guard = enter(&state, &method, &uri, &headers);
    let Value::Object(mut fields) = body else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, json!("body must be an object"));
    };
    guard.next_id += 1;
    fields.insert("id".into(), json!(guard.next_id));
    let created = Value::Object(fields);
    guard
        .collections
        .entry(relative(&uri))
        .or_default()
        .push(created.clone());
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn update(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut guard = enter(&state, &method, &uri, &headers);
    let (collection, id) = member(&uri);
    let found = guard
        .collections
        .get_mut(&collection)
        .and_then(|records| records.iter_mut().find(|record| id_matches(record, &id)));
    let Some(existing) = found else {
        return detail(StatusCode::NOT_FOUND, json!("Record not found"));
    };
    if let (Value::Object(existing), Value::Object(fields)) = (&mut *existing, body) {
        for (key, value) in fields {
            if key != "id" {
                existing.insert(key, value);
            }
        }
    }
    Json(existing.clone()).into_response()
}

async fn remove(State(state): State<Shared>, method: Method, uri: Uri, headers: HeaderMap) -> Response {
    let mut guard = enter(&state, &method, &uri, &headers);
    let (collection, id) = member(&uri);
    match guard.collections.get_mut(&collection) {
        Some(records) if records.iter().any(|record| id_matches(record, &id)) => {
            records.retain(|record| !id_matches(record, &id));
            StatusCode::NO_CONTENT.into_response()
        }
        _ => detail(StatusCode::NOT_FOUND, json!("Tool not found")),
    }
}

async fn refuse_delete(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let _guard = enter(&state, &method, &uri, &headers);
    detail(StatusCode::CONFLICT, json!("Group chat is running"))
}

async fn activate(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let mut guard = enter(&state, &method, &uri, &headers);
    let (collection, id) = member(&uri);
    let found = guard
        .collections
        .get_mut(&collection)
        .and_then(|records| records.iter_mut().find(|record| id_matches(record, &id)));
    match found {
        Some(agent) => {
            agent["status"] = json!("active");
            Json(agent.clone()).into_response()
        }
        None => detail(StatusCode::NOT_FOUND, json!("Agent not found")),
    }
}

async fn toggle(State(state): State<Shared>, method: Method, uri: Uri, headers: HeaderMap) -> Response {
    let _guard = enter(&state, &method, &uri, &headers);
    let (_, id) = member(&uri);
    let status = if uri.path().ends_with("/start") {
        "running"
    } else {
        "stopped"
    };
    let id = id.parse::<i64>().map(|id| json!(id)).unwrap_or(json!(id));
    Json(json!({ "id": id, "status": status })).into_response()
}

async fn upload(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut received = ReceivedUpload {
        file_name: None,
        file: Vec::new(),
        name: String::new(),
        metadata: String::new(),
    };
    while let Some(field) = multipart.next_field().await.unwrap() {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                received.file_name = field.file_name().map(str::to_string);
                received.file = field.bytes().await.unwrap().to_vec();
            }
            "name" => received.name = field.text().await.unwrap(),
            "metadata" => received.metadata = field.text().await.unwrap(),
            _ => {}
        }
    }

    let mut guard = enter(&state, &method, &uri, &headers);
    guard.next_id += 1;
    let created = json!({
        "id": guard.next_id,
        "name": received.name,
        "content": String::from_utf8_lossy(&received.file),
        "metadata": serde_json::from_str::<Value>(&received.metadata).unwrap_or(Value::Null),
        "status": "active",
    });
    guard
        .collections
        .entry(String::from("file-context"))
        .or_default()
        .push(created.clone());
    guard.uploads.push(received);
    Json(created).into_response()
}

async fn reject_provider(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let _guard = enter(&state, &method, &uri, &headers);
    detail(
        StatusCode::UNPROCESSABLE_ENTITY,
        json!([
            { "loc": ["body", "name"], "msg": "field required", "type": "value_error.missing" },
            { "loc": ["body", "base_url"], "msg": "invalid url", "type": "value_error.url" }
        ]),
    )
}

async fn predefined(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let _guard = enter(&state, &method, &uri, &headers);
    Json(json!({
        "openai": {
            "name": "OpenAI",
            "base_url": "https://api.openai.com/v1",
            "models": [{ "id": "gpt-4o", "name": "GPT-4o" }]
        },
        "local": { "name": "Local" }
    }))
    .into_response()
}

async fn execute(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let _guard = enter(&state, &method, &uri, &headers);
    let language = body["language"].as_str().unwrap_or("unknown");
    let lines = body["content"].as_str().unwrap_or_default().lines().count();
    Json(json!({ "result": format!("{language}: {lines} line(s) ok") })).into_response()
}

async fn save_file(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut guard = enter(&state, &method, &uri, &headers);
    let (_, id) = member(&uri);
    let saved = json!({ "id": id, "content": body["content"] });
    guard
        .collections
        .entry(String::from("code/files"))
        .or_default()
        .push(saved.clone());
    Json(saved).into_response()
}

async fn broken(State(state): State<Shared>, method: Method, uri: Uri, headers: HeaderMap) -> Response {
    let _guard = enter(&state, &method, &uri, &headers);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        "{\"id\": 1,",
    )
        .into_response()
}
