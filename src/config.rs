use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 未指定 `base_url_env` 時讀取的環境變數。
pub const DEFAULT_BASE_URL_ENV: &str = "AGENT_CONSOLE_URL";

/// 主控台設定，通常從 `config/console.toml` 載入。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleSettings {
    /// 後端服務的基礎 URL。
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 用於覆寫 `base_url` 的環境變數名稱。
    #[serde(default)]
    pub base_url_env: Option<String>,
    /// 所有資源路徑共用的 API 前綴。
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// 聊天訊息輪詢間隔（毫秒）。
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 單一請求的逾時秒數；未設定時不限制。
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// 使用行程內的記憶體後端，不連線到任何伺服器。
    #[serde(default)]
    pub offline: bool,
    /// 附加到每個請求的額外 HTTP 標頭。
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
}

fn default_base_url() -> String {
    String::from("http://localhost:8000")
}

fn default_api_prefix() -> String {
    String::from("/api/v1")
}

fn default_poll_interval_ms() -> u64 {
    3000
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            base_url_env: None,
            api_prefix: default_api_prefix(),
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: None,
            offline: false,
            extra_headers: BTreeMap::new(),
        }
    }
}

impl ConsoleSettings {
    /// 從指定的工作區目錄讀取設定。
    /// 如果 `config/console.toml` 不存在，則使用預設值。
    pub fn load(workspace_root: &Path) -> Result<Self> {
        let config_path = workspace_root.join("config/console.toml");
        if !config_path.exists() {
            log::debug!("{} not found, using defaults", config_path.display());
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&config_path)
            .with_context(|| format!("讀取主控台設定失敗: {}", config_path.display()))?;
        let parsed: ConsoleSettings = toml::from_str(&raw)
            .with_context(|| format!("解析主控台設定失敗: {}", config_path.display()))?;
        Ok(parsed)
    }

    /// 將當前設定儲存到 `config/console.toml`。
    pub fn save_to_file(&self, workspace_root: &Path) -> Result<()> {
        let config_dir = workspace_root.join("config");
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("建立設定目錄失敗: {}", config_dir.display()))?;
        }
        let config_path = config_dir.join("console.toml");
        let serialized = toml::to_string_pretty(self).context("序列化主控台設定失敗")?;
        fs::write(&config_path, serialized)
            .with_context(|| format!("寫入主控台設定失敗: {}", config_path.display()))?;
        Ok(())
    }

    /// 解析最終的基礎 URL。
    /// 優先順序：環境變數 > `base_url` 欄位。
    pub fn resolved_base_url(&self) -> String {
        self.resolve_base_url(|var| env::var(var).ok())
    }

    fn resolve_base_url(&self, lookup: impl Fn(&str) -> Option<String>) -> String {
        let var = self.base_url_env.as_deref().unwrap_or(DEFAULT_BASE_URL_ENV);
        match lookup(var) {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => self.base_url.clone(),
        }
    }

    /// 將資源路徑組合成完整 URL。
    pub fn endpoint(&self, base_url: &str, path: &str) -> String {
        let prefix = self.api_prefix.trim_matches('/');
        let path = path.trim_start_matches('/');
        if prefix.is_empty() {
            format!("{}/{}", base_url.trim_end_matches('/'), path)
        } else {
            format!("{}/{}/{}", base_url.trim_end_matches('/'), prefix, path)
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
