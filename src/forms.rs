//! 使用者輸入的表單，以及送出前的 JSON 驗證。
//!
//! 表單只負責把文字輸入轉成請求主體；任何驗證失敗都會在送出前攔下，
//! 不會產生網路呼叫。

use serde_json::Value;

use crate::error::{ConsoleError, Result};
use crate::store::{CollectionStore, Fields, Record, RecordId};

/// 所有可送出的表單都實作這個介面。
pub trait Form {
    /// 轉成請求主體；驗證失敗時回傳錯誤。
    fn to_fields(&self) -> Result<Fields>;

    /// 對應介面上「儲存」按鈕是否可用。
    fn can_submit(&self) -> bool {
        self.to_fields().is_ok()
    }
}

/// 一段尚未驗證的 JSON 文字，例如工具設定或供應商設定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonDraft {
    field: &'static str,
    text: String,
}

impl JsonDraft {
    pub fn new(field: &'static str, text: impl Into<String>) -> Self {
        Self {
            field,
            text: text.into(),
        }
    }

    /// 新表單的預設內容：空物件。
    pub fn empty(field: &'static str) -> Self {
        Self::new(field, "{}")
    }

    /// 編輯既有紀錄時，以縮排兩格的格式預先填入。
    pub fn from_value(field: &'static str, value: &Value) -> Self {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self::new(field, text)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn is_valid(&self) -> bool {
        self.parse().is_ok()
    }

    pub fn parse(&self) -> Result<Value> {
        serde_json::from_str(&self.text).map_err(|err| ConsoleError::InvalidJson {
            field: self.field,
            reason: err.to_string(),
        })
    }
}

/// 送出表單：編輯既有紀錄時更新，否則建立新紀錄。
///
/// 驗證失敗時直接回傳錯誤，既不送出請求，也不改動 store 的狀態。
pub async fn submit(
    store: &mut CollectionStore,
    form: &impl Form,
    editing: Option<&RecordId>,
) -> Result<Record> {
    let fields = form.to_fields()?;
    match editing {
        Some(id) => store.update(id.clone(), fields).await,
        None => store.create(fields).await,
    }
}

/// 取出紀錄中的字串欄位，缺少時為空字串。
pub(crate) fn text_of(fields: &Fields, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
