use std::collections::HashMap;
use std::sync::Arc;

use log::{info, warn};
use serde_json::{Value, json};

use crate::backend::Backend;
use crate::error::{ConsoleError, Result};
use crate::forms::{Form, text_of};
use crate::store::{CollectionStore, Fields, Record, RecordId};

use super::{AGENTS, GROUP_CHATS};

/// 群組聊天集合、可加入的代理清單，以及每個聊天是否正在執行。
pub struct GroupChatStore {
    chats: CollectionStore,
    available_agents: CollectionStore,
    active: HashMap<RecordId, bool>,
}

#[derive(serde::Deserialize)]
struct ToggleResponse {
    id: RecordId,
}

impl GroupChatStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            chats: CollectionStore::new(Arc::clone(&backend), GROUP_CHATS),
            available_agents: CollectionStore::new(backend, AGENTS),
            active: HashMap::new(),
        }
    }

    pub fn collection(&self) -> &CollectionStore {
        &self.chats
    }

    pub fn collection_mut(&mut self) -> &mut CollectionStore {
        &mut self.chats
    }

    pub fn available_agents(&self) -> &CollectionStore {
        &self.available_agents
    }

    pub async fn fetch_available_agents(&mut self) -> Result<()> {
        self.available_agents.list().await
    }

    /// 從未啟動或停止過的聊天視為未執行。
    pub fn is_active(&self, id: &RecordId) -> bool {
        self.active.get(id).copied().unwrap_or(false)
    }

    pub async fn start(&mut self, id: RecordId) -> Result<()> {
        self.toggle(id, "start", true).await
    }

    pub async fn stop(&mut self, id: RecordId) -> Result<()> {
        self.toggle(id, "stop", false).await
    }

    /// 旗標以回應中的 `id` 為準，而不是請求的識別碼。
    async fn toggle(&mut self, id: RecordId, action: &str, running: bool) -> Result<()> {
        let path = format!("{}/{action}", self.chats.member_path(&id));
        let backend = Arc::clone(self.chats.backend());
        self.chats.state_mut().begin();
        let outcome = backend.post(&path, None).await.and_then(|value| {
            serde_json::from_value::<ToggleResponse>(value).map_err(ConsoleError::from)
        });
        self.chats.state_mut().settle();
        match outcome {
            Ok(response) => {
                info!("group chat {} {action}", response.id);
                self.active.insert(response.id, running);
                Ok(())
            }
            Err(err) => {
                warn!("group chat {id} {action} failed: {err}");
                self.chats.state_mut().apply_failed(err.to_string());
                Err(err)
            }
        }
    }
}

/// 建立或編輯群組聊天的表單。
#[derive(Debug, Clone, PartialEq)]
pub struct GroupChatForm {
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub max_iterations: u32,
    pub agents: Vec<RecordId>,
}

impl Default for GroupChatForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            system_prompt: String::new(),
            max_iterations: 10,
            agents: Vec::new(),
        }
    }
}

impl GroupChatForm {
    pub fn from_record(record: &Record) -> Self {
        let agents = record
            .get("agents")
            .and_then(Value::as_array)
            .map(|agents| {
                agents
                    .iter()
                    .filter_map(|agent| serde_json::from_value(agent.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            name: text_of(&record.fields, "name"),
            description: text_of(&record.fields, "description"),
            system_prompt: text_of(&record.fields, "system_prompt"),
            max_iterations: record
                .get("max_iterations")
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(10),
            agents,
        }
    }
}

impl Form for GroupChatForm {
    fn to_fields(&self) -> Result<Fields> {
        let body = json!({
            "name": self.name,
            "description": self.description,
            "system_prompt": self.system_prompt,
            "max_iterations": self.max_iterations,
            "agents": self.agents,
        });
        Ok(body.as_object().cloned().unwrap_or_default())
    }
}
