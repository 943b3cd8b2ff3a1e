use std::sync::Arc;

use anyhow::Result;
use log::{debug, info, warn};

use crate::backend::{Backend, HttpBackend, MemoryBackend};
use crate::config::ConsoleSettings;
use crate::resources::agents::AgentStore;
use crate::resources::chat::ChatSession;
use crate::resources::code::CodeWorkspace;
use crate::resources::file_context::FileContextStore;
use crate::resources::group_chat::GroupChatStore;
use crate::resources::model_providers::ModelProviderStore;
use crate::resources::{ResourceKind, tools};
use crate::store::{CollectionStore, RecordId};

/// 主控台的全部客戶端狀態。
///
/// 啟動時建立、所有集合皆為空，存活到程式結束為止。
pub struct Console {
    settings: ConsoleSettings,
    backend: Arc<dyn Backend>,
    pub agents: AgentStore,
    pub tools: CollectionStore,
    pub file_contexts: FileContextStore,
    pub group_chats: GroupChatStore,
    pub model_providers: ModelProviderStore,
    pub code: CodeWorkspace,
}

impl Console {
    /// 依設定選擇後端：`offline` 時使用記憶體後端，否則連線到 HTTP 後端。
    pub fn new(settings: ConsoleSettings) -> Result<Self> {
        let backend: Arc<dyn Backend> = if settings.offline {
            info!("running offline with the in-memory backend");
            Arc::new(MemoryBackend::new())
        } else {
            let backend = HttpBackend::new(settings.clone())?;
            info!("using backend at {}", backend.base_url());
            Arc::new(backend)
        };
        Ok(Self::with_backend(settings, backend))
    }

    pub fn with_backend(settings: ConsoleSettings, backend: Arc<dyn Backend>) -> Self {
        debug!("initializing console with {} backend", backend.name());
        Self {
            agents: AgentStore::new(Arc::clone(&backend)),
            tools: tools::store(Arc::clone(&backend)),
            file_contexts: FileContextStore::new(Arc::clone(&backend)),
            group_chats: GroupChatStore::new(Arc::clone(&backend)),
            model_providers: ModelProviderStore::new(Arc::clone(&backend)),
            code: CodeWorkspace::new(Arc::clone(&backend)),
            settings,
            backend,
        }
    }

    pub fn settings(&self) -> &ConsoleSettings {
        &self.settings
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// 取得某種資源的通用集合。
    pub fn store(&mut self, kind: ResourceKind) -> &mut CollectionStore {
        match kind {
            ResourceKind::Agents => self.agents.collection_mut(),
            ResourceKind::Tools => &mut self.tools,
            ResourceKind::FileContexts => self.file_contexts.collection_mut(),
            ResourceKind::GroupChats => self.group_chats.collection_mut(),
            ResourceKind::ModelProviders => self.model_providers.collection_mut(),
        }
    }

    /// 開啟一個聊天工作階段；呼叫端持有它，關閉時丟棄即可。
    pub fn open_chat(&self, session_id: RecordId, agent_id: RecordId) -> ChatSession {
        ChatSession::new(Arc::clone(&self.backend), session_id, agent_id)
    }

    /// 同時重新列出所有集合，回傳失敗的數量。錯誤已寫入各自的 store。
    pub async fn refresh_all(&mut self) -> usize {
        let results = tokio::join!(
            self.agents.list(),
            self.tools.list(),
            self.file_contexts.collection_mut().list(),
            self.group_chats.collection_mut().list(),
            self.model_providers.collection_mut().list(),
        );
        let failures = [results.0, results.1, results.2, results.3, results.4]
            .into_iter()
            .filter(|result| result.is_err())
            .count();
        if failures > 0 {
            warn!("{failures} collection(s) failed to refresh");
        }
        failures
    }

    /// 套用所有背景派送已完成的結果，回傳處理的事件數。
    pub fn tick(&mut self) -> usize {
        self.agents.collection_mut().poll_events()
            + self.tools.poll_events()
            + self.file_contexts.collection_mut().poll_events()
            + self.group_chats.collection_mut().poll_events()
            + self.model_providers.collection_mut().poll_events()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::Intent;

    fn offline_console() -> (Arc<MemoryBackend>, Console) {
        let backend = Arc::new(MemoryBackend::new());
        let console = Console::with_backend(ConsoleSettings::default(), backend.clone());
        (backend, console)
    }

    #[test]
    fn starts_with_empty_collections() {
        let (_, mut console) = offline_console();
        for kind in [
            ResourceKind::Agents,
            ResourceKind::Tools,
            ResourceKind::FileContexts,
            ResourceKind::GroupChats,
            ResourceKind::ModelProviders,
        ] {
            let store = console.store(kind);
            assert!(store.records().is_empty());
            assert_eq!(store.path(), kind.path());
        }
    }

    #[tokio::test]
    async fn refresh_all_lists_every_collection() {
        let (backend, mut console) = offline_console();
        backend.seed("tools", vec![json!({ "id": 1, "name": "fs" })]);

        assert_eq!(console.refresh_all().await, 0);
        assert_eq!(console.tools.records().len(), 1);
        assert_eq!(backend.request_count(), 5);
    }

    #[tokio::test]
    async fn tick_applies_dispatched_results() {
        let (_, mut console) = offline_console();
        console
            .store(ResourceKind::Tools)
            .dispatch(Intent::Create(json!({ "name": "x" }).as_object().cloned().unwrap()));
        assert!(console.tools.state().loading());

        tokio::task::yield_now().await;
        while console.tick() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(console.tools.records().len(), 1);
        assert!(!console.tools.state().loading());
    }

    #[test]
    fn offline_setting_selects_memory_backend() {
        let settings = ConsoleSettings {
            offline: true,
            ..ConsoleSettings::default()
        };
        let console = Console::new(settings).unwrap();
        assert_eq!(console.backend().name(), "memory");
    }
}
