//! Public configuration types.
//!
//! These are the resolved, ready-to-use structs that subsystems consume.
//! Raw TOML deserialization types live in `raw.rs`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde_json::{Map, Value};

// ── Comms ───────────────────────────────────────────────────────────────────

/// PTY (console) channel configuration.
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Whether the PTY channel is explicitly enabled.
    pub enabled: bool,
}

/// Comms subsystem configuration.
#[derive(Debug, Clone)]
pub struct CommsConfig {
    pub pty: PtyConfig,
}

// ── Video providers ─────────────────────────────────────────────────────────

/// HTTP verbs accepted for provider submit / status calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn is_get(&self) -> bool {
        matches!(self, HttpMethod::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(format!("unsupported HTTP method '{other}'")),
        }
    }
}

/// One video-generation provider, populated from a `[[video.providers]]` table.
///
/// Every `*_field` value is a JSON path (`a.b[0].c`) into the provider's
/// response, except `prompt_field`, `model_field`, `duration_field`,
/// `aspect_ratio_field` and `status_request_id_field`, which are plain keys
/// of the request body.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider_id: String,
    pub base_url: String,
    /// Bearer token; empty means no `Authorization` header.
    pub api_key: String,
    /// Default model; empty means the field is omitted from the submit body.
    pub model: String,
    pub submit_path: String,
    /// Status endpoint path; `{task_id}` is replaced by the encoded task id.
    pub status_path_template: String,
    pub submit_method: HttpMethod,
    pub status_method: HttpMethod,
    pub prompt_field: String,
    pub model_field: String,
    pub task_id_field: String,
    pub status_field: String,
    pub output_url_field: String,
    pub error_field: String,
    pub done_values: Vec<String>,
    pub failed_values: Vec<String>,
    pub extra_headers: Vec<(String, String)>,
    /// Merged into every submit body before the prompt and model keys.
    pub extra_body: Map<String, Value>,
    /// Body key for the task id on non-GET status queries. Empty = derive
    /// from the leaf of `task_id_field`.
    pub status_request_id_field: String,
    pub duration_field: String,
    pub aspect_ratio_field: String,
}

pub const DEFAULT_DONE_VALUES: &[&str] = &["succeeded", "completed", "success", "done", "finished"];
pub const DEFAULT_FAILED_VALUES: &[&str] = &["failed", "error", "cancelled", "canceled", "rejected"];

impl ProviderConfig {
    /// A provider with every optional field at its default.
    pub fn new(provider_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            base_url: base_url.into(),
            api_key: String::new(),
            model: String::new(),
            submit_path: "/v1/videos".into(),
            status_path_template: "/v1/videos/{task_id}".into(),
            submit_method: HttpMethod::Post,
            status_method: HttpMethod::Get,
            prompt_field: "prompt".into(),
            model_field: "model".into(),
            task_id_field: "id".into(),
            status_field: "status".into(),
            output_url_field: "output[0].url".into(),
            error_field: "error.message".into(),
            done_values: DEFAULT_DONE_VALUES.iter().map(|s| s.to_string()).collect(),
            failed_values: DEFAULT_FAILED_VALUES.iter().map(|s| s.to_string()).collect(),
            extra_headers: Vec::new(),
            extra_body: Map::new(),
            status_request_id_field: String::new(),
            duration_field: "duration".into(),
            aspect_ratio_field: "aspect_ratio".into(),
        }
    }
}

// ── Task store ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStoreKind {
    /// In-process only; records vanish on restart.
    Tmp,
    /// A single JSON document on disk.
    JsonFile,
}

#[derive(Debug, Clone)]
pub struct TaskStoreConfig {
    pub kind: TaskStoreKind,
    /// Location of the JSON document for [`TaskStoreKind::JsonFile`].
    pub path: PathBuf,
}

// ── Video plugin ────────────────────────────────────────────────────────────

/// Settings from `[video]`.
#[derive(Debug, Clone)]
pub struct VideoConfig {
    /// Provider used when a request names none. Empty = first provider.
    pub default_provider_id: String,
    /// Per-request HTTP timeout, never below five seconds.
    pub request_timeout: Duration,
    /// Sleep between status polls, never below one second.
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    /// Consecutive failed polls tolerated before giving up.
    pub max_transient_errors: u32,
    pub debug_mode: bool,
    /// In-memory task record bound.
    pub task_cache_cap: usize,
    pub store: TaskStoreConfig,
    /// Valid providers in configuration order.
    pub providers: Vec<ProviderConfig>,
    /// Problems found while resolving providers (skipped entries, ignored
    /// JSON). Logged once the subscriber is up.
    pub diagnostics: Vec<String>,
}

// ── Top-level ───────────────────────────────────────────────────────────────

/// Fully-resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_name: String,
    /// Working directory for all persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    /// Optional log file; stderr when `None`.
    pub log_file: Option<PathBuf>,
    pub comms: CommsConfig,
    pub video: VideoConfig,
}

impl Config {
    /// Returns `true` if the PTY channel should be loaded.
    pub fn comms_pty_should_load(&self) -> bool {
        self.comms.pty.enabled
    }
}
