use std::path::Path;

use anyhow::{Context, Result};

/// 初始化日誌。
///
/// 工作區內有 `config/log4rs.yaml` 時交給 log4rs（可輸出到檔案並輪替），
/// 否則使用 env_logger，預設等級為 `info`，可用 `RUST_LOG` 覆寫。
pub fn init(workspace_root: &Path) -> Result<()> {
    let log_config = workspace_root.join("config/log4rs.yaml");
    if log_config.is_file() {
        log4rs::init_file(&log_config, Default::default())
            .with_context(|| format!("載入日誌設定失敗: {}", log_config.display()))?;
        log::debug!("logging configured from {}", log_config.display());
        return Ok(());
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init()
        .context("初始化 env_logger 失敗")?;
    Ok(())
}
