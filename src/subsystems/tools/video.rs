//! `video_generate` and `video_query_status` — the video plugin as callable
//! tools. Results are single lines meant to be read by a model.

use serde::Deserialize;
use serde_json::{Map, Number, Value, json};

use crate::subsystems::video::VideoPlugin;
use crate::video::{TaskOutcome, classify};

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateArgs {
    pub prompt: String,
    /// Blank = default provider.
    #[serde(default)]
    pub provider_id: String,
    /// Blank = provider default model.
    #[serde(default)]
    pub model: String,
    /// Seconds, forwarded exactly as given. Absent or `<= 0` leaves the field out.
    #[serde(default)]
    pub duration: Option<Number>,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default = "default_wait")]
    pub wait: bool,
}

fn default_aspect_ratio() -> String {
    "16:9".to_string()
}

fn default_wait() -> bool {
    true
}

impl GenerateArgs {
    /// Reject a prompt that is present but blank.
    pub fn validated(self) -> Result<Self, String> {
        if self.prompt.trim().is_empty() {
            return Err("prompt must not be empty".to_string());
        }
        Ok(self)
    }

    fn positive_duration(&self) -> Option<&Number> {
        self.duration.as_ref().filter(|n| n.as_f64().is_some_and(|d| d > 0.0))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryArgs {
    pub task_id: String,
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

pub async fn generate(plugin: &VideoPlugin, session: &str, args: GenerateArgs) -> String {
    let Some(provider) = plugin.providers().resolve(&args.provider_id) else {
        return "video_generate failed: provider_id is unknown or not configured.".to_string();
    };

    let mut options = Map::new();
    if let Some(duration) = args.positive_duration() {
        options.insert(provider.duration_field.clone(), Value::Number(duration.clone()));
    }
    let aspect_ratio = args.aspect_ratio.trim();
    if !aspect_ratio.is_empty() {
        options.insert(provider.aspect_ratio_field.clone(), Value::String(aspect_ratio.to_string()));
    }

    let submitted = match plugin
        .submit(session, provider, &args.prompt, &args.model, Some(&options))
        .await
    {
        Ok(s) => s,
        Err(e) => return format!("video_generate failed: {e}"),
    };

    if !args.wait {
        return format!(
            "video_generate submitted: provider={}, task_id={}, status={}",
            provider.provider_id, submitted.task_id, submitted.status
        );
    }

    let done = plugin.wait(session, provider, submitted, &args.prompt, "").await;
    match classify(provider, &done) {
        TaskOutcome::Failed { .. } => format!(
            "video_generate task failed: task_id={}, status={}, error={}",
            done.task_id,
            done.status,
            or_dash(&done.error_message)
        ),
        TaskOutcome::Completed { url } => {
            format!("video_generate task completed: task_id={}, url={url}", done.task_id)
        }
        TaskOutcome::Pending => format!(
            "video_generate timed out or still running: task_id={}, status={}",
            done.task_id, done.status
        ),
    }
}

pub async fn query_status(plugin: &VideoPlugin, session: &str, args: QueryArgs) -> String {
    let task_id = args.task_id.trim();
    let Some(record) = plugin.tasks().load(task_id) else {
        return format!("video_query_status: no local record for task_id={task_id}.");
    };
    let Some(provider) = plugin.providers().get(&record.snapshot.provider_id) else {
        return format!(
            "video_query_status: provider `{}` is not configured.",
            record.snapshot.provider_id
        );
    };

    let latest = match plugin.refresh(session, provider, task_id).await {
        Ok(s) => s,
        Err(e) => return format!("video_query_status failed: {e}"),
    };

    if latest.has_video() {
        return format!("video_query_status: completed, task_id={task_id}, url={}", latest.video_url);
    }
    format!(
        "video_query_status: task_id={task_id}, status={}, error={}",
        latest.status,
        or_dash(&latest.error_message)
    )
}

/// OpenAI-style function definitions for both tools.
pub fn definitions() -> Value {
    json!([
        {
            "type": "function",
            "function": {
                "name": "video_generate",
                "description": "Generate a video from a text prompt with a configured video provider.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "prompt": { "type": "string", "description": "What the video should show." },
                        "provider_id": { "type": "string", "description": "Provider id; empty for the default provider." },
                        "model": { "type": "string", "description": "Model name; empty for the provider's default model." },
                        "duration": { "type": "number", "description": "Desired length in seconds; 0 or less to omit." },
                        "aspect_ratio": { "type": "string", "description": "Aspect ratio such as 16:9.", "default": "16:9" },
                        "wait": { "type": "boolean", "description": "Wait for the task to finish before returning.", "default": true }
                    },
                    "required": ["prompt"]
                }
            }
        },
        {
            "type": "function",
            "function": {
                "name": "video_query_status",
                "description": "Refresh the status of a previously submitted video task.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "task_id": { "type": "string", "description": "Task id returned by video_generate." }
                    },
                    "required": ["task_id"]
                }
            }
        }
    ])
}
