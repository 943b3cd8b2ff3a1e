use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;
use serde_json::{Map, Value, json};

use crate::error::{ConsoleError, Result};

use super::{Backend, FileUpload};

/// 可以對單一紀錄觸發的動作端點。
const ACTIONS: &[&str] = &["activate", "start", "stop"];

/// 在行程內模擬 REST 後端的 `Backend` 實作。
///
/// 用於離線模式與測試：識別碼由這裡遞增指派，就像真正的伺服器一樣。
/// 每個請求都會被記錄下來，方便檢查實際送出了哪些呼叫。
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<MemoryState>,
    latency: Option<Duration>,
}

#[derive(Default)]
struct MemoryState {
    collections: BTreeMap<String, Vec<Value>>,
    next_id: i64,
    requests: Vec<String>,
    failures: VecDeque<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每個請求在回應前先等待一段時間。
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// 預先放入一個集合的紀錄。紀錄必須自帶 `id`。
    pub fn seed(&self, path: &str, records: Vec<Value>) {
        let mut state = self.lock();
        for record in &records {
            if let Some(id) = record.get("id").and_then(Value::as_i64) {
                state.next_id = state.next_id.max(id);
            }
        }
        state.collections.insert(normalize(path), records);
    }

    /// 讓下一個請求以指定訊息失敗。
    pub fn fail_next(&self, message: impl Into<String>) {
        self.lock().failures.push_back(message.into());
    }

    /// 目前為止收到的請求，格式為 `"METHOD path"`。
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// 某個集合目前在「伺服器端」的內容。
    pub fn collection(&self, path: &str) -> Vec<Value> {
        self.lock()
            .collections
            .get(&normalize(path))
            .cloned()
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // 鎖內不會 panic，被污染時沿用內部資料即可。
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 記錄請求、套用延遲並處理注入的失敗。
    async fn enter(&self, method: &str, path: &str) -> Result<()> {
        let path = normalize(path);
        debug!("memory backend: {method} {path}");
        let failure = {
            let mut state = self.lock();
            state.requests.push(format!("{method} {path}"));
            state.failures.pop_front()
        };
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(message) => Err(ConsoleError::Backend(message)),
            None => Ok(()),
        }
    }
}

impl MemoryState {
    fn insert(&mut self, collection: &str, fields: Map<String, Value>) -> Value {
        self.next_id += 1;
        let mut record = fields;
        record.insert("id".into(), json!(self.next_id));
        let record = Value::Object(record);
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        record
    }

    fn find_mut(&mut self, collection: &str, id: &str) -> Option<&mut Value> {
        self.collections
            .get_mut(collection)?
            .iter_mut()
            .find(|record| id_matches(record, id))
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, path: &str) -> Result<Value> {
        self.enter("GET", path).await?;
        let path = normalize(path);
        if path == "model-providers/predefined" {
            return Ok(predefined_catalog());
        }
        let state = self.lock();
        if let Some(records) = state.collections.get(&path) {
            return Ok(Value::Array(records.clone()));
        }
        if let Some((collection, id)) = path.rsplit_once('/')
            && let Some(records) = state.collections.get(collection)
        {
            return records
                .iter()
                .find(|record| id_matches(record, id))
                .cloned()
                .ok_or_else(|| not_found(&path));
        }
        Ok(Value::Array(Vec::new()))
    }

    async fn post(&self, path: &str, body: Option<Value>) -> Result<Value> {
        self.enter("POST", path).await?;
        let path = normalize(path);
        if path.starts_with("code/") {
            return Err(ConsoleError::Backend(format!(
                "{path} is not available offline"
            )));
        }
        let mut state = self.lock();

        let segments: Vec<&str> = path.rsplitn(3, '/').collect();
        if let [action, id, collection] = segments.as_slice()
            && ACTIONS.contains(action)
        {
            let record = state
                .find_mut(collection, id)
                .ok_or_else(|| not_found(&path))?;
            return Ok(match *action {
                "activate" => {
                    record["status"] = json!("active");
                    record.clone()
                }
                "start" => json!({ "id": record["id"], "status": "running" }),
                _ => json!({ "id": record["id"], "status": "stopped" }),
            });
        }

        match body {
            Some(Value::Object(fields)) => Ok(state.insert(&path, fields)),
            Some(_) => Err(ConsoleError::Status {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                body: String::from("body must be a JSON object"),
            }),
            None => Err(ConsoleError::Backend(format!(
                "{path} is not available offline"
            ))),
        }
    }

    async fn put(&self, path: &str, body: Value) -> Result<Value> {
        self.enter("PUT", path).await?;
        let path = normalize(path);
        let Some((collection, id)) = path.rsplit_once('/') else {
            return Err(not_found(&path));
        };
        let Value::Object(fields) = body else {
            return Err(ConsoleError::Status {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                body: String::from("body must be a JSON object"),
            });
        };
        let mut state = self.lock();
        let record = state.find_mut(collection, id).ok_or_else(|| not_found(&path))?;
        if let Value::Object(existing) = record {
            for (key, value) in fields {
                if key != "id" {
                    existing.insert(key, value);
                }
            }
        }
        Ok(record.clone())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.enter("DELETE", path).await?;
        let path = normalize(path);
        let Some((collection, id)) = path.rsplit_once('/') else {
            return Err(not_found(&path));
        };
        let mut state = self.lock();
        let records = state.collections.get_mut(collection);
        match records {
            Some(records) if records.iter().any(|record| id_matches(record, id)) => {
                records.retain(|record| !id_matches(record, id));
                Ok(())
            }
            _ => Err(not_found(&path)),
        }
    }

    async fn upload(&self, path: &str, upload: FileUpload) -> Result<Value> {
        self.enter("UPLOAD", path).await?;
        let path = normalize(path);
        let collection = path.strip_suffix("/upload").unwrap_or(&path).to_string();
        let mut fields = Map::new();
        fields.insert("name".into(), json!(upload.name));
        fields.insert(
            "content".into(),
            json!(String::from_utf8_lossy(&upload.bytes)),
        );
        fields.insert("metadata".into(), upload.metadata);
        fields.insert("status".into(), json!("active"));
        Ok(self.lock().insert(&collection, fields))
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

fn id_matches(record: &Value, id: &str) -> bool {
    match record.get("id") {
        Some(Value::Number(number)) => number.to_string() == id,
        Some(Value::String(text)) => text == id,
        _ => false,
    }
}

fn not_found(path: &str) -> ConsoleError {
    ConsoleError::Status {
        status: StatusCode::NOT_FOUND,
        body: format!("{path} not found"),
    }
}

/// 離線時提供的預設供應商目錄。
fn predefined_catalog() -> Value {
    json!({
        "openai": {
            "name": "OpenAI",
            "base_url": "https://api.openai.com/v1",
            "models": [
                { "id": "gpt-4-turbo-preview", "name": "GPT-4 Turbo" },
                { "id": "gpt-3.5-turbo", "name": "GPT-3.5 Turbo" }
            ]
        },
        "anthropic": {
            "name": "Anthropic",
            "base_url": "https://api.anthropic.com/v1",
            "models": [
                { "id": "claude-3-opus", "name": "Claude 3 Opus" },
                { "id": "claude-3-haiku", "name": "Claude 3 Haiku" }
            ]
        }
    })
}
