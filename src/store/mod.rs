//! 通用的集合同步層。
//!
//! 每種資源都使用同一個 `CollectionStore`：列出、建立、更新、刪除與上傳，
//! 網路結果一律經過 `CollectionState` 的轉換函式寫回本地快取。

pub mod poll;
pub mod state;

use std::sync::Arc;

use log::{debug, warn};
use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::backend::{Backend, FileUpload};
use crate::error::{ConsoleError, Result};

pub use poll::{PollHandle, spawn_poller};
pub use state::{CollectionState, Fields, Record, RecordId};

/// 由介面觸發、送往某個集合的一次操作。
#[derive(Debug, Clone)]
pub enum Intent {
    List,
    Create(Fields),
    Update(RecordId, Fields),
    Delete(RecordId),
    Upload(FileUpload),
}

impl Intent {
    fn verb(&self) -> &'static str {
        match self {
            Intent::List => "list",
            Intent::Create(_) => "create",
            Intent::Update(..) => "update",
            Intent::Delete(_) => "delete",
            Intent::Upload(_) => "upload",
        }
    }
}

/// 一次成功的往返對集合造成的變化。
#[derive(Debug)]
enum Change {
    Listed(Vec<Record>),
    Created(Record),
    Updated(Record),
    Deleted(RecordId),
}

/// 背景任務回報給 store 的事件。
#[derive(Debug)]
enum StoreEvent {
    /// 由 `Dispatcher` 發出的請求已開始。
    Started,
    Settled(&'static str, Result<Change>),
}

/// 單一資源種類的客戶端快取，搭配與後端同步的四個動詞。
///
/// 操作可以直接 `await`（完成後才返回），也可以用 `dispatch` 丟到背景執行，
/// 再由擁有者透過 `poll_events` 套用結果。
pub struct CollectionStore {
    path: String,
    backend: Arc<dyn Backend>,
    state: CollectionState,
    events_tx: UnboundedSender<StoreEvent>,
    events_rx: UnboundedReceiver<StoreEvent>,
}

impl CollectionStore {
    /// 建立一個空集合，`path` 為相對於 API 前綴的資源路徑。
    pub fn new(backend: Arc<dyn Backend>, path: impl Into<String>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            path: path.into(),
            backend,
            state: CollectionState::default(),
            events_tx,
            events_rx,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> &CollectionState {
        &self.state
    }

    pub fn records(&self) -> &[Record] {
        self.state.records()
    }

    pub(crate) fn state_mut(&mut self) -> &mut CollectionState {
        &mut self.state
    }

    pub(crate) fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// 單一紀錄的路徑，例如 `tools/3`。
    pub fn member_path(&self, id: &RecordId) -> String {
        format!("{}/{}", self.path, id)
    }

    pub async fn list(&mut self) -> Result<()> {
        self.run(Intent::List).await.map(|_| ())
    }

    pub async fn create(&mut self, fields: Fields) -> Result<Record> {
        self.run_for_record(Intent::Create(fields)).await
    }

    pub async fn update(&mut self, id: RecordId, fields: Fields) -> Result<Record> {
        self.run_for_record(Intent::Update(id, fields)).await
    }

    pub async fn delete(&mut self, id: RecordId) -> Result<()> {
        self.run(Intent::Delete(id)).await.map(|_| ())
    }

    pub async fn upload(&mut self, upload: FileUpload) -> Result<Record> {
        self.run_for_record(Intent::Upload(upload)).await
    }

    /// 執行一次完整往返並立即套用結果，回傳後端帶回的紀錄（如果有）。
    async fn run(&mut self, intent: Intent) -> Result<Option<Record>> {
        let verb = intent.verb();
        self.state.begin();
        let outcome = perform(self.backend.as_ref(), &self.path, intent).await;
        self.apply(verb, outcome)
    }

    async fn run_for_record(&mut self, intent: Intent) -> Result<Record> {
        let verb = intent.verb();
        self.run(intent).await?.ok_or_else(|| {
            ConsoleError::Decode(format!("{} {verb} returned no record", self.path))
        })
    }

    /// 在背景執行操作；`loading` 立即生效，結果由 `poll_events` 套用。
    pub fn dispatch(&mut self, intent: Intent) {
        self.state.begin();
        self.dispatcher().spawn(intent);
    }

    /// 取得一個可複製、可跨任務使用的派送端。
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            path: self.path.clone(),
            backend: Arc::clone(&self.backend),
            events_tx: self.events_tx.clone(),
        }
    }

    /// 非阻塞地套用所有已完成的背景結果，回傳處理的事件數。
    pub fn poll_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// 等待下一個背景事件並套用它。
    ///
    /// store 本身持有一個發送端，因此在沒有待處理請求時呼叫會一直等待。
    pub async fn next_event(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    fn handle_event(&mut self, event: StoreEvent) {
        match event {
            StoreEvent::Started => self.state.begin(),
            StoreEvent::Settled(verb, outcome) => {
                let _ = self.apply(verb, outcome);
            }
        }
    }

    fn apply(&mut self, verb: &str, outcome: Result<Change>) -> Result<Option<Record>> {
        match outcome {
            Ok(change) => {
                debug!("{} {verb} settled", self.path);
                Ok(match change {
                    Change::Listed(records) => {
                        self.state.apply_list(records);
                        None
                    }
                    Change::Created(record) => {
                        self.state.apply_created(record.clone());
                        Some(record)
                    }
                    Change::Updated(record) => {
                        self.state.apply_updated(record.clone());
                        Some(record)
                    }
                    Change::Deleted(id) => {
                        self.state.apply_deleted(&id);
                        None
                    }
                })
            }
            Err(err) => {
                warn!("{} {verb} failed: {err}", self.path);
                self.state.apply_failed(err.to_string());
                Err(err)
            }
        }
    }
}

/// `CollectionStore` 的背景派送端。
///
/// 每次 `dispatch` 都會先送出 `Started`，再在往返完成後送出結果；
/// store 被丟棄之後，結果會被靜默捨棄。
#[derive(Clone)]
pub struct Dispatcher {
    path: String,
    backend: Arc<dyn Backend>,
    events_tx: UnboundedSender<StoreEvent>,
}

impl Dispatcher {
    pub fn dispatch(&self, intent: Intent) {
        let _ = self.events_tx.send(StoreEvent::Started);
        self.spawn(intent);
    }

    /// 對應的 store 是否已被丟棄。
    pub fn is_closed(&self) -> bool {
        self.events_tx.is_closed()
    }

    fn spawn(&self, intent: Intent) {
        let backend = Arc::clone(&self.backend);
        let path = self.path.clone();
        let tx = self.events_tx.clone();
        let verb = intent.verb();
        debug!("{path} {verb} dispatched");
        tokio::spawn(async move {
            let outcome = perform(backend.as_ref(), &path, intent).await;
            let _ = tx.send(StoreEvent::Settled(verb, outcome));
        });
    }
}

/// 將一個操作對應到唯一一次網路呼叫。
async fn perform(backend: &dyn Backend, path: &str, intent: Intent) -> Result<Change> {
    match intent {
        Intent::List => {
            let value = backend.get(path).await?;
            Ok(Change::Listed(serde_json::from_value(value)?))
        }
        Intent::Create(fields) => {
            let value = backend.post(path, Some(Value::Object(fields))).await?;
            Ok(Change::Created(serde_json::from_value(value)?))
        }
        Intent::Update(id, fields) => {
            let member = format!("{path}/{id}");
            let value = backend.put(&member, Value::Object(fields)).await?;
            Ok(Change::Updated(serde_json::from_value(value)?))
        }
        Intent::Delete(id) => {
            match backend.delete(&format!("{path}/{id}")).await {
                Ok(()) => {}
                // 後端對不存在的識別碼回 404；本地照樣移除，不算失敗。
                Err(ConsoleError::Status { status, .. }) if status == StatusCode::NOT_FOUND => {
                    debug!("{path}/{id} already gone");
                }
                Err(err) => return Err(err),
            }
            Ok(Change::Deleted(id))
        }
        Intent::Upload(upload) => {
            let value = backend.upload(&format!("{path}/upload"), upload).await?;
            Ok(Change::Created(serde_json::from_value(value)?))
        }
    }
}
