//! Key-value persistence for task records.
//!
//! Two backends, chosen by `[video.store] kind`:
//!
//! - **tmp** — process memory only ([`TmpStore`])
//! - **json_file** — one pretty-printed JSON object on disk ([`JsonFileStore`])
//!
//! Stores are synchronous and small; callers treat every error as
//! non-fatal and carry on with their in-memory state.

mod json_file;
mod tmp;

pub use json_file::JsonFileStore;
pub use tmp::TmpStore;

use std::sync::Arc;

use crate::config::{TaskStoreConfig, TaskStoreKind};
use crate::error::AppError;

/// A flat string → string map.
pub trait KvStore: Send + Sync {
    /// Backend name for logs (`"tmp"`, `"json_file"`).
    fn store_type(&self) -> &str;

    fn kv_get(&self, key: &str) -> Result<Option<String>, AppError>;

    /// Insert or replace `key`.
    fn kv_set(&self, key: &str, value: &str) -> Result<(), AppError>;

    /// Insert or replace several keys; backends that persist override this
    /// to write once.
    fn kv_set_many(&self, entries: &[(String, String)]) -> Result<(), AppError> {
        for (key, value) in entries {
            self.kv_set(key, value)?;
        }
        Ok(())
    }
}

/// Build the configured backend.
pub fn open(cfg: &TaskStoreConfig) -> Arc<dyn KvStore> {
    match cfg.kind {
        TaskStoreKind::Tmp => Arc::new(TmpStore::new()),
        TaskStoreKind::JsonFile => Arc::new(JsonFileStore::new(cfg.path.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_selects_backend() {
        let dir = tempfile::TempDir::new().unwrap();
        let tmp = open(&TaskStoreConfig {
            kind: TaskStoreKind::Tmp,
            path: dir.path().join("unused.json"),
        });
        assert_eq!(tmp.store_type(), "tmp");

        let file = open(&TaskStoreConfig {
            kind: TaskStoreKind::JsonFile,
            path: dir.path().join("tasks.json"),
        });
        assert_eq!(file.store_type(), "json_file");
        file.kv_set("k", "v").unwrap();
        assert!(dir.path().join("tasks.json").exists());
    }
}
