//! `json_file` store — a single JSON object persisted on every write.
//!
//! The whole document is read, updated and written back under a mutex, so
//! the file is always a complete object. Writes go to a sibling `.tmp` file
//! which is then renamed over the original.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::KvStore;
use crate::error::AppError;

pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// The file and its parent directory are created on first write.
    pub fn new(path: PathBuf) -> Self {
        Self { path, lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_doc(&self) -> Result<BTreeMap<String, String>, AppError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(AppError::Store(format!("cannot read {}: {e}", self.path.display())));
            }
        };
        if data.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&data)
            .map_err(|e| AppError::Store(format!("malformed {}: {e}", self.path.display())))
    }

    fn write_doc(&self, doc: &BTreeMap<String, String>) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::Store(format!("cannot create {}: {e}", parent.display())))?;
        }
        let data = serde_json::to_string_pretty(doc)
            .map_err(|e| AppError::Store(format!("serialise store: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data)
            .map_err(|e| AppError::Store(format!("cannot write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| AppError::Store(format!("cannot replace {}: {e}", self.path.display())))
    }
}

impl KvStore for JsonFileStore {
    fn store_type(&self) -> &str {
        "json_file"
    }

    fn kv_get(&self, key: &str) -> Result<Option<String>, AppError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| AppError::Store("json_file store lock poisoned".into()))?;
        Ok(self.read_doc()?.remove(key))
    }

    fn kv_set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| AppError::Store("json_file store lock poisoned".into()))?;
        let mut doc = self.read_doc()?;
        doc.insert(key.to_string(), value.to_string());
        self.write_doc(&doc)
    }

    fn kv_set_many(&self, entries: &[(String, String)]) -> Result<(), AppError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| AppError::Store("json_file store lock poisoned".into()))?;
        let mut doc = self.read_doc()?;
        doc.extend(entries.iter().cloned());
        self.write_doc(&doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, JsonFileStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("tasks.json"));
        (dir, store)
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let (_dir, store) = setup();
        assert_eq!(store.kv_get("anything").unwrap(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn values_survive_reopen() {
        let (dir, store) = setup();
        store.kv_set("video_task:t1", r#"{"task_id":"t1"}"#).unwrap();
        store.kv_set("video_last_task:pty0:local", "t1").unwrap();
        store.kv_set("video_last_task:pty0:local", "t2").unwrap();

        let reopened = JsonFileStore::new(dir.path().join("nested").join("tasks.json"));
        assert_eq!(reopened.kv_get("video_task:t1").unwrap(), Some(r#"{"task_id":"t1"}"#.into()));
        assert_eq!(reopened.kv_get("video_last_task:pty0:local").unwrap(), Some("t2".into()));
        assert!(!dir.path().join("nested").join("tasks.json.tmp").exists());
    }

    #[test]
    fn set_many_writes_all_keys() {
        let (_dir, store) = setup();
        store.kv_set("keep", "1").unwrap();
        store
            .kv_set_many(&[
                ("video_task:t1".to_string(), "{}".to_string()),
                ("video_last_task:s".to_string(), "t1".to_string()),
            ])
            .unwrap();
        assert_eq!(store.kv_get("keep").unwrap(), Some("1".into()));
        assert_eq!(store.kv_get("video_task:t1").unwrap(), Some("{}".into()));
        assert_eq!(store.kv_get("video_last_task:s").unwrap(), Some("t1".into()));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let (_dir, store) = setup();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "not json").unwrap();
        let err = store.kv_get("k").unwrap_err();
        assert!(err.to_string().contains("malformed"));
        assert!(store.kv_set("k", "v").is_err());
    }
}
