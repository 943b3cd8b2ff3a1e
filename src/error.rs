//! 資料層共用的錯誤型別。
//!
//! 所有錯誤最終都會以人類可讀的字串寫入 `CollectionState::error`，
//! 因此每個變體的 `Display` 都必須能直接呈現給使用者。

use reqwest::StatusCode;

/// 後端、store 與表單共用的錯誤。
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    /// 網路層失敗（連線拒絕、逾時等）。
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    /// 後端回應了非 2xx 狀態碼。
    #[error("request failed ({status}): {body}")]
    Status { status: StatusCode, body: String },
    /// 回應內容無法解析成預期的資料結構。
    #[error("unexpected response: {0}")]
    Decode(String),
    /// 使用者輸入的 JSON 設定無法解析，請求不會送出。
    #[error("invalid JSON in {field}: {reason}")]
    InvalidJson { field: &'static str, reason: String },
    /// 空白訊息不會送出。
    #[error("message is empty")]
    EmptyMessage,
    /// 讀取上傳檔案失敗。
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 後端拒絕了請求（例如離線後端的注入失敗）。
    #[error("{0}")]
    Backend(String),
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        ConsoleError::Decode(err.to_string())
    }
}

pub type Result<T, E = ConsoleError> = std::result::Result<T, E>;
