use std::sync::Arc;

use log::{info, warn};
use serde_json::json;

use crate::backend::Backend;
use crate::error::Result;
use crate::store::{CollectionStore, RecordId};

use super::AGENTS;

/// 代理清單，外加啟用代理的動作端點。
pub struct AgentStore {
    agents: CollectionStore,
}

impl AgentStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            agents: CollectionStore::new(backend, AGENTS),
        }
    }

    pub fn collection(&self) -> &CollectionStore {
        &self.agents
    }

    pub fn collection_mut(&mut self) -> &mut CollectionStore {
        &mut self.agents
    }

    pub async fn list(&mut self) -> Result<()> {
        self.agents.list().await
    }

    /// 呼叫 `agents/{id}/activate`，成功後將本地紀錄標記為 `active`。
    ///
    /// 本地沒有該代理時只送出請求，不新增紀錄。
    pub async fn activate(&mut self, id: RecordId) -> Result<()> {
        let path = format!("{}/activate", self.agents.member_path(&id));
        let backend = Arc::clone(self.agents.backend());
        self.agents.state_mut().begin();
        match backend.post(&path, None).await {
            Ok(_) => {
                let state = self.agents.state_mut();
                state.settle();
                if state.patch(&id, "status", json!("active")) {
                    info!("agent {id} activated");
                }
                Ok(())
            }
            Err(err) => {
                warn!("activating agent {id} failed: {err}");
                self.agents.state_mut().apply_failed(err.to_string());
                Err(err)
            }
        }
    }
}
