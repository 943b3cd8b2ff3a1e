//! 代理管理主控台的客戶端資料同步層。
//!
//! 每種由後端擁有的資源（代理、工具、檔案上下文、群組聊天、模型供應商、
//! 聊天訊息）都由同一個 `CollectionStore` 快取，並透過 `Backend` 與伺服器同步。

pub mod backend;
pub mod config;
pub mod console;
pub mod error;
pub mod forms;
pub mod logging;
pub mod resources;
pub mod store;

pub use backend::{Backend, FileUpload, HttpBackend, MemoryBackend};
pub use config::ConsoleSettings;
pub use console::Console;
pub use error::ConsoleError;
pub use store::{CollectionState, CollectionStore, Fields, Intent, Record, RecordId};
