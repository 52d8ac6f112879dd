//! `tmp` store — ephemeral in-memory key-value store.
//!
//! Everything is discarded when the process exits. Used by tests and by
//! deployments that do not need `/video status` to survive a restart.

use std::collections::HashMap;
use std::sync::Mutex;

use super::KvStore;
use crate::error::AppError;

#[derive(Default)]
pub struct TmpStore {
    data: Mutex<HashMap<String, String>>,
}

impl TmpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for TmpStore {
    fn store_type(&self) -> &str {
        "tmp"
    }

    fn kv_get(&self, key: &str) -> Result<Option<String>, AppError> {
        let data = self
            .data
            .lock()
            .map_err(|_| AppError::Store("tmp store lock poisoned".into()))?;
        Ok(data.get(key).cloned())
    }

    fn kv_set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| AppError::Store("tmp store lock poisoned".into()))?;
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
