//! Task records: a bounded in-memory cache written through to a [`KvStore`].
//!
//! Keys in the store:
//!
//! - `video_task:<task_id>` — JSON-encoded [`TaskRecord`]
//! - `video_last_task:<session>` — the session's most recently saved task id
//!
//! Store failures are logged and otherwise ignored: the cache keeps working.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::subsystems::store::KvStore;
use crate::video::TaskSnapshot;

/// Persisted form of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(flatten)]
    pub snapshot: TaskSnapshot,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model: String,
    /// Unix seconds of the last save.
    #[serde(default)]
    pub updated_at: i64,
}

fn task_key(task_id: &str) -> String {
    format!("video_task:{task_id}")
}

fn last_task_key(session: &str) -> String {
    format!("video_last_task:{session}")
}

/// Insertion-ordered map with a size bound. Re-inserting an existing id
/// updates it in place without refreshing its position.
struct TaskCache {
    cap: usize,
    order: VecDeque<String>,
    records: HashMap<String, TaskRecord>,
}

impl TaskCache {
    fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            order: VecDeque::new(),
            records: HashMap::new(),
        }
    }

    fn get(&self, task_id: &str) -> Option<&TaskRecord> {
        self.records.get(task_id)
    }

    fn insert(&mut self, record: TaskRecord) {
        let id = record.snapshot.task_id.clone();
        if self.records.insert(id.clone(), record).is_none() {
            self.order.push_back(id);
        }
        while self.records.len() > self.cap {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.records.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

pub struct TaskRegistry {
    cache: Mutex<TaskCache>,
    store: Arc<dyn KvStore>,
}

impl TaskRegistry {
    pub fn new(store: Arc<dyn KvStore>, cap: usize) -> Self {
        Self {
            cache: Mutex::new(TaskCache::new(cap)),
            store,
        }
    }

    fn cache(&self) -> MutexGuard<'_, TaskCache> {
        // A poisoned cache is still a valid map.
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record `snapshot` for `session`. Snapshots without a task id are not
    /// saved. A blank `prompt` or `model` keeps the value already on record.
    pub fn save(&self, session: &str, snapshot: &TaskSnapshot, prompt: &str, model: &str) {
        if snapshot.task_id.is_empty() {
            return;
        }

        let previous = self.load(&snapshot.task_id);
        let keep = |new: &str, old: Option<&String>| -> String {
            if new.is_empty() {
                old.cloned().unwrap_or_default()
            } else {
                new.to_string()
            }
        };
        let record = TaskRecord {
            snapshot: snapshot.clone(),
            prompt: keep(prompt, previous.as_ref().map(|r| &r.prompt)),
            model: keep(model, previous.as_ref().map(|r| &r.model)),
            updated_at: chrono::Utc::now().timestamp(),
        };

        let mut entries = Vec::with_capacity(2);
        match serde_json::to_string(&record) {
            Ok(json) => entries.push((task_key(&snapshot.task_id), json)),
            Err(e) => warn!(task_id = %snapshot.task_id, "cannot encode task record: {e}"),
        }
        entries.push((last_task_key(session), snapshot.task_id.clone()));
        self.cache().insert(record);

        if let Err(e) = self.store.kv_set_many(&entries) {
            warn!(task_id = %snapshot.task_id, store = self.store.store_type(), "kv write failed: {e}");
        }
        debug!(%session, task_id = %snapshot.task_id, status = %snapshot.status, "task saved");
    }

    /// Cache first, then the store (a store hit is cached).
    pub fn load(&self, task_id: &str) -> Option<TaskRecord> {
        if let Some(record) = self.cache().get(task_id) {
            return Some(record.clone());
        }

        let stored = self.get(&task_key(task_id))?;
        match serde_json::from_str::<TaskRecord>(&stored) {
            Ok(record) => {
                self.cache().insert(record.clone());
                Some(record)
            }
            Err(e) => {
                warn!(%task_id, "ignoring malformed task record: {e}");
                None
            }
        }
    }

    pub fn last_task_id(&self, session: &str) -> Option<String> {
        self.get(&last_task_key(session)).filter(|id| !id.is_empty())
    }

    fn get(&self, key: &str) -> Option<String> {
        match self.store.kv_get(key) {
            Ok(v) => v,
            Err(e) => {
                warn!(%key, store = self.store.store_type(), "kv read failed: {e}");
                None
            }
        }
    }
}
