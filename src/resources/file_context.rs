use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{info, warn};
use serde_json::json;
use walkdir::WalkDir;

use crate::backend::{Backend, FileUpload};
use crate::error::Result;
use crate::forms::{Form, JsonDraft, text_of};
use crate::store::{CollectionStore, Fields, Record};

use super::FILE_CONTEXT;

/// 檔案上下文集合：通用 CRUD，加上單檔與整個目錄的上傳。
pub struct FileContextStore {
    contexts: CollectionStore,
}

/// 目錄上傳的結果，每個檔案各自成功或失敗。
#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: Vec<Record>,
    pub failed: Vec<(PathBuf, String)>,
}

impl FileContextStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            contexts: CollectionStore::new(backend, FILE_CONTEXT),
        }
    }

    pub fn collection(&self) -> &CollectionStore {
        &self.contexts
    }

    pub fn collection_mut(&mut self) -> &mut CollectionStore {
        &mut self.contexts
    }

    /// 讀取檔案並以 multipart 上傳到 `file-context/upload`。
    pub async fn upload_file(&mut self, path: &Path) -> Result<Record> {
        let upload = match FileUpload::from_path(path) {
            Ok(upload) => upload,
            Err(err) => {
                self.contexts.state_mut().apply_failed(err.to_string());
                return Err(err);
            }
        };
        self.contexts.upload(upload).await
    }

    /// 走訪目錄並逐一上傳每個一般檔案，一個檔案一個請求。
    ///
    /// 單一檔案失敗不會中斷其他檔案；`path` 本身是檔案時只上傳它。
    pub async fn upload_dir(&mut self, path: &Path) -> UploadReport {
        let mut report = UploadReport::default();
        let walker = WalkDir::new(path).sort_by_file_name().into_iter();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let failed = err.path().map(Path::to_path_buf).unwrap_or_default();
                    warn!("skipping {}: {err}", failed.display());
                    report.failed.push((failed, err.to_string()));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match self.upload_file(entry.path()).await {
                Ok(record) => report.uploaded.push(record),
                Err(err) => report.failed.push((entry.path().to_path_buf(), err.to_string())),
            }
        }
        info!(
            "uploaded {} file(s) from {}, {} failed",
            report.uploaded.len(),
            path.display(),
            report.failed.len()
        );
        report
    }
}

/// 手動建立或編輯檔案上下文的表單。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContextForm {
    pub name: String,
    pub content: String,
    pub metadata: JsonDraft,
}

impl Default for FileContextForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            content: String::new(),
            metadata: JsonDraft::empty("metadata"),
        }
    }
}

impl FileContextForm {
    pub fn from_record(record: &Record) -> Self {
        let empty = json!({});
        Self {
            name: text_of(&record.fields, "name"),
            content: text_of(&record.fields, "content"),
            metadata: JsonDraft::from_value("metadata", record.get("metadata").unwrap_or(&empty)),
        }
    }
}

impl Form for FileContextForm {
    fn to_fields(&self) -> Result<Fields> {
        let metadata = self.metadata.parse()?;
        let body = json!({
            "name": self.name,
            "content": self.content,
            "metadata": metadata,
        });
        Ok(body.as_object().cloned().unwrap_or_default())
    }
}
