use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::backend::Backend;
use crate::error::{ConsoleError, Result};
use crate::store::{CollectionStore, PollHandle, Record, RecordId, spawn_poller};

/// 一個聊天工作階段的訊息列表。
///
/// 介面開著的時候以 `start_polling` 定期刷新，關閉時丟棄 `PollHandle`。
pub struct ChatSession {
    session_id: RecordId,
    agent_id: RecordId,
    messages: CollectionStore,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn Backend>, session_id: RecordId, agent_id: RecordId) -> Self {
        let path = format!("chat/sessions/{session_id}/messages");
        Self {
            session_id,
            agent_id,
            messages: CollectionStore::new(backend, path),
        }
    }

    pub fn session_id(&self) -> &RecordId {
        &self.session_id
    }

    pub fn collection(&self) -> &CollectionStore {
        &self.messages
    }

    pub fn collection_mut(&mut self) -> &mut CollectionStore {
        &mut self.messages
    }

    pub fn messages(&self) -> &[Record] {
        self.messages.records()
    }

    pub async fn refresh(&mut self) -> Result<()> {
        self.messages.list().await
    }

    /// 送出一則使用者訊息；只有空白的內容會被直接拒絕。
    pub async fn send(&mut self, content: &str) -> Result<Record> {
        if content.trim().is_empty() {
            return Err(ConsoleError::EmptyMessage);
        }
        let body = json!({
            "sessionId": self.session_id,
            "agentId": self.agent_id,
            "content": content,
            "messageType": "user",
        });
        let fields = body.as_object().cloned().unwrap_or_default();
        self.messages.create(fields).await
    }

    /// 立即刷新一次，之後每隔 `every` 刷新；結果以 `poll_events` 套用。
    pub fn start_polling(&self, every: Duration) -> PollHandle {
        spawn_poller(self.messages.dispatcher(), every)
    }

    /// 套用背景輪詢已完成的結果。
    pub fn poll_events(&mut self) -> usize {
        self.messages.poll_events()
    }
}
