use std::sync::Arc;

use serde_json::json;

use crate::backend::Backend;
use crate::error::Result;
use crate::forms::{Form, JsonDraft, text_of};
use crate::store::{CollectionStore, Fields, Record};

use super::TOOLS;

/// 工具集合只需要通用的 CRUD。
pub fn store(backend: Arc<dyn Backend>) -> CollectionStore {
    CollectionStore::new(backend, TOOLS)
}

/// 新增或編輯工具的表單。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolForm {
    pub name: String,
    pub description: String,
    pub tool_type: String,
    pub config: JsonDraft,
}

impl Default for ToolForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            tool_type: String::new(),
            config: JsonDraft::empty("config"),
        }
    }
}

impl ToolForm {
    /// 以既有工具預先填入表單。
    pub fn from_record(record: &Record) -> Self {
        let empty = json!({});
        Self {
            name: text_of(&record.fields, "name"),
            description: text_of(&record.fields, "description"),
            tool_type: text_of(&record.fields, "tool_type"),
            config: JsonDraft::from_value("config", record.get("config").unwrap_or(&empty)),
        }
    }
}

impl Form for ToolForm {
    fn to_fields(&self) -> Result<Fields> {
        let config = self.config.parse()?;
        let body = json!({
            "name": self.name,
            "description": self.description,
            "tool_type": self.tool_type,
            "config": config,
        });
        Ok(body.as_object().cloned().unwrap_or_default())
    }
}
