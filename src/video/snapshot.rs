//! Provider-independent view of a video task at one point in time.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Latest known state of one task, as mapped from a provider response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSnapshot {
    pub provider_id: String,
    pub task_id: String,
    pub status: String,
    pub video_url: String,
    pub error_message: String,
    /// The response object the snapshot was mapped from.
    #[serde(deserialize_with = "object_or_empty")]
    pub raw: Map<String, Value>,
}

impl TaskSnapshot {
    pub fn has_video(&self) -> bool {
        !self.video_url.is_empty()
    }
}

/// Accepts any JSON value; non-objects collapse to an empty map.
fn object_or_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        _ => Map::new(),
    })
}
