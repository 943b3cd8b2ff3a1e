use std::sync::Arc;

use log::warn;
use serde_json::Value;

use crate::backend::Backend;
use crate::error::Result;

#[derive(serde::Serialize)]
struct ExecutePayload<'a> {
    content: &'a str,
    language: &'a str,
}

#[derive(serde::Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    result: Value,
}

#[derive(serde::Serialize)]
struct SavePayload<'a> {
    content: &'a str,
}

/// 程式碼執行與存檔。不是集合，只保留最後一次執行結果。
pub struct CodeWorkspace {
    backend: Arc<dyn Backend>,
    execution_result: Option<String>,
    loading: bool,
    error: Option<String>,
}

impl CodeWorkspace {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            execution_result: None,
            loading: false,
            error: None,
        }
    }

    pub fn execution_result(&self) -> Option<&str> {
        self.execution_result.as_deref()
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// 送出程式碼執行，成功時保存回應中的 `result`。
    pub async fn execute(&mut self, content: &str, language: &str) -> Result<String> {
        self.loading = true;
        self.error = None;
        let payload = serde_json::to_value(ExecutePayload { content, language })?;
        let outcome = self
            .backend
            .post("code/execute", Some(payload))
            .await
            .and_then(|value| Ok(serde_json::from_value::<ExecuteResponse>(value)?));
        self.loading = false;
        match outcome {
            Ok(response) => {
                let text = match response.result {
                    Value::String(text) => text,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                self.execution_result = Some(text.clone());
                Ok(text)
            }
            Err(err) => {
                warn!("code execution failed: {err}");
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// 儲存檔案內容。失敗只記錄錯誤，不影響 `loading`。
    pub async fn save(&mut self, file_id: &str, content: &str) -> Result<()> {
        let payload = serde_json::to_value(SavePayload { content })?;
        let path = format!("code/files/{file_id}");
        match self.backend.put(&path, payload).await {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!("saving {file_id} failed: {err}");
                self.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub fn clear_execution_result(&mut self) {
        self.execution_result = None;
        self.error = None;
    }
}
