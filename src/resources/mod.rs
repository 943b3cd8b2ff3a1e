//! 各資源家族在通用 store 之上的薄包裝。
//!
//! CRUD 一律交給 `CollectionStore`；這裡只補上各家族特有的動作端點與表單。

pub mod agents;
pub mod chat;
pub mod code;
pub mod file_context;
pub mod group_chat;
pub mod model_providers;
pub mod tools;

use std::fmt;

pub const AGENTS: &str = "agents";
pub const TOOLS: &str = "tools";
pub const FILE_CONTEXT: &str = "file-context";
pub const GROUP_CHATS: &str = "group-chats";
pub const MODEL_PROVIDERS: &str = "model-providers";

/// 擁有通用 CRUD 端點的資源種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ResourceKind {
    Agents,
    Tools,
    FileContexts,
    GroupChats,
    ModelProviders,
}

impl ResourceKind {
    /// 相對於 API 前綴的集合路徑。
    pub fn path(self) -> &'static str {
        match self {
            ResourceKind::Agents => AGENTS,
            ResourceKind::Tools => TOOLS,
            ResourceKind::FileContexts => FILE_CONTEXT,
            ResourceKind::GroupChats => GROUP_CHATS,
            ResourceKind::ModelProviders => MODEL_PROVIDERS,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
