use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 欄位名稱到 JSON 值的對應，即請求主體與紀錄內容的通用形狀。
pub type Fields = Map<String, Value>;

/// 後端指派的紀錄識別碼。
///
/// 後端目前使用整數，但客戶端不對其格式做任何假設，只比較相等性。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(id) => write!(f, "{id}"),
            RecordId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        RecordId::Number(id)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        match id.parse::<i64>() {
            Ok(number) => RecordId::Number(number),
            Err(_) => RecordId::Text(id.to_string()),
        }
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        RecordId::from(id.as_str())
    }
}

/// 由後端擁有的不透明資源紀錄：一個識別碼加上任意欄位。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// 讀取單一欄位。
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// 讀取字串欄位，方便顯示名稱等資訊。
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// 單一資源種類在客戶端的快取：有序的紀錄、`loading` 與 `error`。
///
/// 所有狀態轉換都集中在這裡，`CollectionStore` 只負責把網路結果餵進來。
#[derive(Debug, Clone, Default)]
pub struct CollectionState {
    records: Vec<Record>,
    loading: bool,
    error: Option<String>,
}

impl CollectionState {
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, id: &RecordId) -> Option<&Record> {
        self.records.iter().find(|record| &record.id == id)
    }

    /// 請求開始：進入載入狀態並清除上一次的錯誤。
    pub fn begin(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// 以後端回傳的序列整個取代本地集合。
    pub fn apply_list(&mut self, records: Vec<Record>) {
        self.loading = false;
        self.records = records;
    }

    /// 建立或上傳成功：附加到集合尾端。
    pub fn apply_created(&mut self, record: Record) {
        self.loading = false;
        self.records.push(record);
    }

    /// 依回傳紀錄的識別碼原地取代；找不到時不做任何事。
    pub fn apply_updated(&mut self, record: Record) {
        self.loading = false;
        if let Some(slot) = self.records.iter_mut().find(|slot| slot.id == record.id) {
            *slot = record;
        }
    }

    /// 依識別碼移除，識別碼不存在時同樣視為成功。
    pub fn apply_deleted(&mut self, id: &RecordId) {
        self.loading = false;
        self.records.retain(|record| &record.id != id);
    }

    /// 請求失敗：保留既有集合，只記錄錯誤訊息。
    pub fn apply_failed(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.error = Some(message.into());
    }

    /// 修改單一紀錄的一個欄位，用於動作型端點（例如啟用代理）。
    pub fn patch(&mut self, id: &RecordId, key: &str, value: Value) -> bool {
        match self.records.iter_mut().find(|record| &record.id == id) {
            Some(record) => {
                record.fields.insert(key.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// 結束一個不影響集合的請求。
    pub fn settle(&mut self) {
        self.loading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: i64, name: &str) -> Record {
        let fields = json!({ "name": name }).as_object().cloned().unwrap();
        Record::new(id, fields)
    }

    fn seeded() -> CollectionState {
        let mut state = CollectionState::default();
        state.begin();
        state.apply_list(vec![record(1, "a"), record(2, "b"), record(3, "c")]);
        state
    }

    #[test]
    fn list_replaces_the_whole_collection() {
        let mut state = seeded();
        state.begin();
        state.apply_list(vec![record(9, "z")]);
        assert_eq!(state.records(), &[record(9, "z")]);
        assert!(!state.loading());
    }

    #[test]
    fn update_replaces_in_place_and_keeps_order() {
        let mut state = seeded();
        state.begin();
        state.apply_updated(record(2, "B"));
        let names: Vec<_> = state
            .records()
            .iter()
            .filter_map(|r| r.str_field("name"))
            .collect();
        assert_eq!(names, ["a", "B", "c"]);
    }

    #[test]
    fn update_of_unknown_id_is_dropped() {
        let mut state = seeded();
        let before = state.records().to_vec();
        state.begin();
        state.apply_updated(record(42, "ghost"));
        assert_eq!(state.records(), before.as_slice());
        assert_eq!(state.len(), 3);
        assert!(state.error().is_none());
    }

    #[test]
    fn delete_of_unknown_id_is_a_silent_no_op() {
        let mut state = seeded();
        state.begin();
        state.apply_deleted(&RecordId::Number(42));
        assert_eq!(state.len(), 3);
        assert!(state.error().is_none());
        assert!(!state.loading());
    }

    #[test]
    fn delete_removes_every_match() {
        let mut state = seeded();
        state.apply_created(record(2, "dup"));
        state.apply_deleted(&RecordId::Number(2));
        assert!(state.find(&RecordId::Number(2)).is_none());
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn failure_keeps_last_good_collection() {
        let mut state = seeded();
        state.begin();
        state.apply_failed("boom");
        assert_eq!(state.len(), 3);
        assert_eq!(state.error(), Some("boom"));
        assert!(!state.loading());

        state.begin();
        assert!(state.error().is_none());
        assert!(state.loading());
    }

    #[test]
    fn record_ids_accept_numbers_and_strings() {
        let numeric: Record = serde_json::from_value(json!({ "id": 7, "name": "x" })).unwrap();
        assert_eq!(numeric.id, RecordId::Number(7));
        assert_eq!(numeric.str_field("name"), Some("x"));

        let text: Record = serde_json::from_value(json!({ "id": "abc" })).unwrap();
        assert_eq!(text.id.to_string(), "abc");
        assert_eq!(RecordId::from("12"), RecordId::Number(12));
    }
}
