//! HTTP 後端使用的線路格式結構。

use serde_json::Value;

/// FastAPI 風格的錯誤主體：`{"detail": ...}`。
#[derive(serde::Deserialize)]
pub struct ErrorBody {
    pub detail: Value,
}

impl ErrorBody {
    /// 將 `detail` 轉成單行文字；驗證錯誤是陣列，取每一項的 `msg`。
    pub fn message(&self) -> String {
        match &self.detail {
            Value::String(text) => text.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.get("msg")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| item.to_string())
                })
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        }
    }
}
