use std::collections::BTreeMap;
use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::Backend;
use crate::error::Result;
use crate::forms::{Form, JsonDraft, text_of};
use crate::store::{CollectionStore, Fields, Record};

use super::MODEL_PROVIDERS;

/// 後端內建的供應商範本中的一個模型。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredefinedModel {
    pub id: String,
    pub name: String,
}

/// 後端內建的供應商範本。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredefinedProvider {
    pub name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub models: Vec<PredefinedModel>,
}

/// 模型供應商憑證集合，以及預先定義的供應商目錄。
pub struct ModelProviderStore {
    providers: CollectionStore,
    predefined: BTreeMap<String, PredefinedProvider>,
}

impl ModelProviderStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            providers: CollectionStore::new(backend, MODEL_PROVIDERS),
            predefined: BTreeMap::new(),
        }
    }

    pub fn collection(&self) -> &CollectionStore {
        &self.providers
    }

    pub fn collection_mut(&mut self) -> &mut CollectionStore {
        &mut self.providers
    }

    pub fn predefined(&self) -> &BTreeMap<String, PredefinedProvider> {
        &self.predefined
    }

    /// 讀取 `model-providers/predefined`。
    ///
    /// 目錄不屬於集合狀態：失敗時保留舊目錄，也不寫入 `error`。
    pub async fn fetch_predefined(&mut self) -> Result<&BTreeMap<String, PredefinedProvider>> {
        let path = format!("{MODEL_PROVIDERS}/predefined");
        let value = self.providers.backend().get(&path).await.inspect_err(|err| {
            warn!("fetching predefined providers failed: {err}");
        })?;
        self.predefined = serde_json::from_value(value)?;
        Ok(&self.predefined)
    }
}

/// 新增或編輯模型供應商的表單。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelProviderForm {
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub config: JsonDraft,
}

impl Default for ModelProviderForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_url: String::new(),
            api_key: String::new(),
            config: JsonDraft::empty("config"),
        }
    }
}

impl ModelProviderForm {
    pub fn from_record(record: &Record) -> Self {
        let empty = json!({});
        Self {
            name: text_of(&record.fields, "name"),
            base_url: text_of(&record.fields, "base_url"),
            api_key: text_of(&record.fields, "api_key"),
            config: JsonDraft::from_value("config", record.get("config").unwrap_or(&empty)),
        }
    }

    /// 以目錄中的範本預先填入名稱與基礎 URL，金鑰留給使用者輸入。
    pub fn from_predefined(provider: &PredefinedProvider) -> Self {
        Self {
            name: provider.name.clone(),
            base_url: provider.base_url.clone().unwrap_or_default(),
            ..Self::default()
        }
    }
}

impl Form for ModelProviderForm {
    fn to_fields(&self) -> Result<Fields> {
        let config = self.config.parse()?;
        let body = json!({
            "name": self.name,
            "base_url": self.base_url,
            "api_key": self.api_key,
            "config": config,
        });
        Ok(body.as_object().cloned().unwrap_or_default())
    }
}
