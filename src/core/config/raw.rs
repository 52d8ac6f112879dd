//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults.
//! The `load` module converts them into the public `types` structs.

use serde::Deserialize;

// ── Top-level ────────────────────────────────────────────────────────────────

/// Raw TOML shape — serde target before resolution.
#[derive(Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub supervisor: RawSupervisor,
    #[serde(default)]
    pub comms: RawComms,
    #[serde(default)]
    pub video: RawVideo,
}

#[derive(Deserialize)]
pub(super) struct RawSupervisor {
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for RawSupervisor {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            work_dir: default_work_dir(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

// ── Comms ───────────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
pub(super) struct RawComms {
    #[serde(default)]
    pub pty: RawPty,
}

#[derive(Deserialize)]
pub(super) struct RawPty {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for RawPty {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// ── Video ───────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawVideo {
    #[serde(default)]
    pub default_provider_id: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: f64,
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    #[serde(default = "default_max_transient_errors")]
    pub max_transient_errors: u32,
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(default = "default_task_cache_cap")]
    pub task_cache_cap: usize,
    #[serde(default)]
    pub store: RawTaskStore,
    #[serde(default)]
    pub providers: Vec<RawProvider>,
}

impl Default for RawVideo {
    fn default() -> Self {
        Self {
            default_provider_id: String::new(),
            request_timeout_seconds: default_request_timeout_seconds(),
            poll_interval_seconds: default_poll_interval_seconds(),
            max_poll_attempts: default_max_poll_attempts(),
            max_transient_errors: default_max_transient_errors(),
            debug_mode: false,
            task_cache_cap: default_task_cache_cap(),
            store: RawTaskStore::default(),
            providers: Vec::new(),
        }
    }
}

#[derive(Deserialize, Default)]
pub(super) struct RawTaskStore {
    /// `"tmp"` or `"json_file"`; defaults to `json_file`.
    #[serde(default)]
    pub kind: Option<String>,
    /// Relative paths resolve against `work_dir`.
    #[serde(default)]
    pub path: Option<String>,
}

/// One `[[video.providers]]` entry. Every field is optional here so a bad
/// entry can be skipped with a warning instead of failing the whole file.
#[derive(Deserialize, Default)]
pub(super) struct RawProvider {
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Env var holding the key, consulted when `api_key` is empty.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub submit_path: Option<String>,
    #[serde(default)]
    pub status_path_template: Option<String>,
    #[serde(default)]
    pub submit_method: Option<String>,
    #[serde(default)]
    pub status_method: Option<String>,
    #[serde(default)]
    pub prompt_field: Option<String>,
    #[serde(default)]
    pub model_field: Option<String>,
    #[serde(default)]
    pub task_id_field: Option<String>,
    #[serde(default)]
    pub status_field: Option<String>,
    #[serde(default)]
    pub output_url_field: Option<String>,
    #[serde(default)]
    pub error_field: Option<String>,
    #[serde(default)]
    pub done_values: Option<RawValueList>,
    #[serde(default)]
    pub failed_values: Option<RawValueList>,
    #[serde(default, alias = "extra_headers_json")]
    pub extra_headers: Option<RawJsonObject>,
    #[serde(default, alias = "extra_body_json")]
    pub extra_body: Option<RawJsonObject>,
    #[serde(default)]
    pub status_request_id_field: Option<String>,
    #[serde(default)]
    pub duration_field: Option<String>,
    #[serde(default)]
    pub aspect_ratio_field: Option<String>,
}

/// Either `["a", "b"]` or `"a,b"`.
#[derive(Deserialize)]
#[serde(untagged)]
pub(super) enum RawValueList {
    List(Vec<String>),
    Csv(String),
}

/// Either a TOML table or a string holding a JSON object.
#[derive(Deserialize)]
#[serde(untagged)]
pub(super) enum RawJsonObject {
    Table(toml::Table),
    Json(String),
}

// ── Default functions (used by serde) ────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_bot_name() -> String {
    "vidgen".to_string()
}

fn default_work_dir() -> String {
    "~/.vidgen".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout_seconds() -> f64 {
    45.0
}

fn default_poll_interval_seconds() -> u64 {
    6
}

fn default_max_poll_attempts() -> u32 {
    20
}

fn default_max_transient_errors() -> u32 {
    3
}

pub(super) fn default_task_cache_cap() -> usize {
    200
}
