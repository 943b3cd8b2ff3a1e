//! `backend` 模組負責與遠端資源服務通訊的具體實作。
//!
//! 每個子模組都實作了 `Backend` trait，store 只依賴這個抽象，
//! 因此可以在 HTTP 與記憶體後端之間切換。

/// `http` 模組：透過 REST API 與後端通訊。
pub mod http;
/// `memory` 模組：在行程內模擬後端，用於離線模式與測試。
pub mod memory;

use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{ConsoleError, Result};

pub use http::HttpBackend;
pub use memory::MemoryBackend;

/// 所有後端都必須遵守的通用行為介面。
///
/// 路徑都是相對於 API 前綴的資源路徑（例如 `tools/3`），
/// 成功時回傳解碼前的 JSON 值，由呼叫端決定如何解讀。
#[async_trait]
pub trait Backend: Send + Sync {
    /// 回傳此後端的名稱，用於日誌記錄。
    fn name(&self) -> &str;

    async fn get(&self, path: &str) -> Result<Value>;

    /// `body` 為 `None` 時送出沒有主體的 POST（動作型端點）。
    async fn post(&self, path: &str, body: Option<Value>) -> Result<Value>;

    async fn put(&self, path: &str, body: Value) -> Result<Value>;

    /// DELETE 不需要回應主體。
    async fn delete(&self, path: &str) -> Result<()>;

    /// 以 multipart 上傳單一檔案。
    async fn upload(&self, path: &str, upload: FileUpload) -> Result<Value>;
}

/// 一個待上傳的檔案與其描述資料。
#[derive(Debug, Clone)]
pub struct FileUpload {
    /// 檔名，同時作為 `name` 欄位送出。
    pub name: String,
    pub bytes: Vec<u8>,
    pub mime: String,
    /// 以 JSON 文字形式放進 `metadata` 欄位。
    pub metadata: Value,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime = guess_mime(&name).to_string();
        let metadata = json!({ "type": mime, "size": bytes.len() });
        Self {
            name,
            bytes,
            mime,
            metadata,
        }
    }

    /// 從磁碟讀取檔案，並填入 `type`、`size`、`lastModified` 描述資料。
    pub fn from_path(path: &Path) -> Result<Self> {
        let io_err = |source| ConsoleError::Io {
            path: path.display().to_string(),
            source,
        };
        let bytes = fs::read(path).map_err(io_err)?;
        let modified = fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|elapsed| elapsed.as_millis() as u64);
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let mut upload = Self::new(name, bytes);
        if let Some(modified) = modified {
            upload.metadata["lastModified"] = json!(modified);
        }
        Ok(upload)
    }
}

/// 依副檔名推測 MIME 類型，未知時使用 `application/octet-stream`。
fn guess_mime(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("txt" | "log") => "text/plain",
        Some("md") => "text/markdown",
        Some("json") => "application/json",
        Some("toml") => "application/toml",
        Some("yaml" | "yml") => "application/yaml",
        Some("csv") => "text/csv",
        Some("html" | "htm") => "text/html",
        Some("py") => "text/x-python",
        Some("rs") => "text/x-rust",
        Some("js") => "text/javascript",
        Some("ts" | "tsx") => "text/typescript",
        _ => "application/octet-stream",
    }
}
