//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `VIDGEN_WORK_DIR` and `VIDGEN_LOG_LEVEL` env overrides.
//!
//! # Module layout
//!
//! - **types** — Public configuration structs consumed by subsystems
//!   (`Config`, `VideoConfig`, `ProviderConfig`, etc.).
//! - **raw** — Raw TOML deserialization types (`RawConfig`, `RawProvider`, …).
//!   These mirror the file shape and use serde defaults; kept private.
//! - **load** — Loading logic: `merge_toml`, `load_raw_merged`, `load`,
//!   `load_from`, `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{expand_home, load, load_from};
pub use types::*;

impl Config {
    /// Safe `Config` for tests — tmp task store, no providers, no external calls.
    pub fn test_default(work_dir: &std::path::Path) -> Self {
        Self {
            bot_name: "test".into(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            log_file: None,
            comms: CommsConfig {
                pty: PtyConfig { enabled: false },
            },
            video: VideoConfig {
                default_provider_id: String::new(),
                request_timeout: std::time::Duration::from_secs(5),
                poll_interval: std::time::Duration::from_millis(10),
                max_poll_attempts: 5,
                max_transient_errors: 3,
                debug_mode: false,
                task_cache_cap: raw::default_task_cache_cap(),
                store: TaskStoreConfig {
                    kind: TaskStoreKind::Tmp,
                    path: work_dir.join("video_tasks.json"),
                },
                providers: Vec::new(),
                diagnostics: Vec::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::{NamedTempFile, TempDir};

    const MINIMAL_TOML: &str = r#"
[supervisor]
bot_name = "test-bot"
work_dir = "~/.vidgen"
log_level = "info"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_basic_config() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.bot_name, "test-bot");
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.video.providers.is_empty());
        assert_eq!(cfg.video.request_timeout, Duration::from_secs(45));
        assert_eq!(cfg.video.poll_interval, Duration::from_secs(6));
        assert_eq!(cfg.video.max_poll_attempts, 20);
        assert_eq!(cfg.video.max_transient_errors, 3);
        assert_eq!(cfg.video.task_cache_cap, 200);
        assert_eq!(cfg.video.store.kind, TaskStoreKind::JsonFile);
        assert!(cfg.video.store.path.ends_with("video_tasks.json"));
    }

    #[test]
    fn empty_file_uses_defaults() {
        let f = write_toml("");
        let cfg = load_from(f.path(), Some("/tmp/vidgen"), None).unwrap();
        assert_eq!(cfg.bot_name, "vidgen");
        assert_eq!(cfg.work_dir, std::path::PathBuf::from("/tmp/vidgen"));
        assert!(cfg.comms_pty_should_load());
    }

    #[test]
    fn provider_defaults_applied() {
        let f = write_toml(
            r#"
[[video.providers]]
provider_id = "sora"
base_url = "https://api.example.com"
"#,
        );
        let cfg = load_from(f.path(), None, None).unwrap();
        let p = &cfg.video.providers[0];
        assert_eq!(p.provider_id, "sora");
        assert_eq!(p.submit_path, "/v1/videos");
        assert_eq!(p.status_path_template, "/v1/videos/{task_id}");
        assert_eq!(p.submit_method, HttpMethod::Post);
        assert_eq!(p.status_method, HttpMethod::Get);
        assert_eq!(p.output_url_field, "output[0].url");
        assert_eq!(p.error_field, "error.message");
        assert_eq!(p.done_values.len(), 5);
        assert!(p.failed_values.contains(&"canceled".to_string()));
        assert!(p.extra_body.is_empty());
        assert_eq!(p.duration_field, "duration");
    }

    #[test]
    fn provider_fields_trimmed_and_methods_case_insensitive() {
        let f = write_toml(
            r#"
[[video.providers]]
provider_id = "  grok "
base_url = " https://x.example "
model = " grok-video "
submit_method = "put"
status_method = "post"
status_request_id_field = "request_id"
duration_field = ""
"#,
        );
        let cfg = load_from(f.path(), None, None).unwrap();
        let p = &cfg.video.providers[0];
        assert_eq!(p.provider_id, "grok");
        assert_eq!(p.base_url, "https://x.example");
        assert_eq!(p.model, "grok-video");
        assert_eq!(p.submit_method, HttpMethod::Put);
        assert_eq!(p.status_method, HttpMethod::Post);
        assert_eq!(p.status_request_id_field, "request_id");
        assert_eq!(p.duration_field, "duration");
    }

    #[test]
    fn invalid_providers_are_skipped() {
        let f = write_toml(
            r#"
[[video.providers]]
provider_id = "no-url"

[[video.providers]]
provider_id = "bad-method"
base_url = "https://a.example"
submit_method = "FETCH"

[[video.providers]]
provider_id = "ok"
base_url = "https://b.example"
"#,
        );
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.video.providers.len(), 1);
        assert_eq!(cfg.video.providers[0].provider_id, "ok");
        assert_eq!(cfg.video.diagnostics.len(), 2);
        assert!(cfg.video.diagnostics[1].contains("submit_method"));
    }

    #[test]
    fn duplicate_provider_replaces_in_place() {
        let f = write_toml(
            r#"
[[video.providers]]
provider_id = "a"
base_url = "https://first.example"

[[video.providers]]
provider_id = "b"
base_url = "https://b.example"

[[video.providers]]
provider_id = "a"
base_url = "https://second.example"
"#,
        );
        let cfg = load_from(f.path(), None, None).unwrap();
        let ids: Vec<_> = cfg.video.providers.iter().map(|p| p.provider_id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(cfg.video.providers[0].base_url, "https://second.example");
    }

    #[test]
    fn value_lists_accept_csv_and_arrays() {
        let f = write_toml(
            r#"
[[video.providers]]
provider_id = "csv"
base_url = "https://a.example"
done_values = " SUCCEED , ok ,,"
failed_values = ["FAIL", " "]

[[video.providers]]
provider_id = "blank"
base_url = "https://b.example"
done_values = " , "
"#,
        );
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.video.providers[0].done_values, ["SUCCEED", "ok"]);
        assert_eq!(cfg.video.providers[0].failed_values, ["FAIL"]);
        assert_eq!(cfg.video.providers[1].done_values.len(), 5);
    }

    #[test]
    fn extra_objects_accept_tables_and_json_strings() {
        let f = write_toml(
            r#"
[[video.providers]]
provider_id = "t"
base_url = "https://a.example"
extra_headers_json = '{"X-Region": "us", "X-Retry": 2}'

[video.providers.extra_body]
resolution = "1080p"
seed = 7

[[video.providers]]
provider_id = "bad"
base_url = "https://b.example"
extra_body_json = "[1, 2]"
extra_headers_json = "{not json"
"#,
        );
        let cfg = load_from(f.path(), None, None).unwrap();
        let t = &cfg.video.providers[0];
        assert!(t.extra_headers.contains(&("X-Region".to_string(), "us".to_string())));
        assert!(t.extra_headers.contains(&("X-Retry".to_string(), "2".to_string())));
        assert_eq!(t.extra_body["resolution"], "1080p");
        assert_eq!(t.extra_body["seed"], 7);

        let bad = &cfg.video.providers[1];
        assert!(bad.extra_body.is_empty());
        assert!(bad.extra_headers.is_empty());
        assert_eq!(cfg.video.diagnostics.len(), 2);
    }

    #[test]
    fn numeric_settings_have_floors() {
        let f = write_toml(
            r#"
[video]
request_timeout_seconds = 1
poll_interval_seconds = 0
max_poll_attempts = 0
"#,
        );
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.video.request_timeout, Duration::from_secs(5));
        assert_eq!(cfg.video.poll_interval, Duration::from_secs(1));
        assert_eq!(cfg.video.max_poll_attempts, 1);
    }

    #[test]
    fn oversized_request_timeout_is_a_config_error() {
        let f = write_toml("[video]\nrequest_timeout_seconds = 1e30\n");
        let err = load_from(f.path(), None, None).unwrap_err();
        assert!(matches!(err, crate::error::AppError::Config(_)));
        assert!(err.to_string().contains("request_timeout_seconds"));
    }

    #[test]
    fn api_key_read_from_env_unless_set_inline() {
        const VAR: &str = "VIDGEN_TEST_API_KEY_ENV_7F3A";
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var(VAR, "  sk-from-env  ") };

        let f = write_toml(&format!(
            r#"
[[video.providers]]
provider_id = "from_env"
base_url = "https://a.example"
api_key_env = "{VAR}"

[[video.providers]]
provider_id = "inline"
base_url = "https://b.example"
api_key = "sk-inline"
api_key_env = "{VAR}"

[[video.providers]]
provider_id = "unset"
base_url = "https://c.example"
api_key_env = "VIDGEN_TEST_API_KEY_UNSET_7F3A"
"#
        ));
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.video.providers[0].api_key, "sk-from-env");
        assert_eq!(cfg.video.providers[1].api_key, "sk-inline");
        assert_eq!(cfg.video.providers[2].api_key, "");
    }

    #[test]
    fn store_kind_and_relative_path() {
        let f = write_toml(
            r#"
[video.store]
kind = "tmp"
path = "state/tasks.json"
"#,
        );
        let cfg = load_from(f.path(), Some("/srv/vidgen"), None).unwrap();
        assert_eq!(cfg.video.store.kind, TaskStoreKind::Tmp);
        assert_eq!(cfg.video.store.path, std::path::PathBuf::from("/srv/vidgen/state/tasks.json"));
    }

    #[test]
    fn unknown_store_kind_errors() {
        let f = write_toml("[video.store]\nkind = \"redis\"\n");
        let msg = load_from(f.path(), None, None).unwrap_err().to_string();
        assert!(msg.contains("redis"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.vidgen");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with(".vidgen"));
    }

    #[test]
    fn absolute_path_unchanged() {
        let p = expand_home("/absolute/path");
        assert_eq!(p, std::path::PathBuf::from("/absolute/path"));
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(std::path::Path::new("/nonexistent/config.toml"), None, None);
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn env_overrides_apply() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), Some("/tmp/test-override"), Some("debug")).unwrap();
        assert_eq!(cfg.work_dir, std::path::PathBuf::from("/tmp/test-override"));
        assert_eq!(cfg.log_level, "debug");
    }

    const BASE_TOML: &str = r#"
[supervisor]
bot_name = "base-bot"
work_dir = "~/.vidgen"
log_level = "info"

[video]
default_provider_id = "veo"
poll_interval_seconds = 4
"#;

    fn write_named(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let p = dir.path().join(name);
        std::fs::write(&p, content).unwrap();
        p
    }

    #[test]
    fn overlay_keeps_base_fields() {
        let dir = TempDir::new().unwrap();
        write_named(&dir, "base.toml", BASE_TOML);
        let overlay = r#"
[meta]
base = "base.toml"

[video]
poll_interval_seconds = 9
"#;
        let overlay_path = write_named(&dir, "overlay.toml", overlay);
        let cfg = load_from(&overlay_path, None, None).unwrap();
        assert_eq!(cfg.bot_name, "base-bot");
        assert_eq!(cfg.video.default_provider_id, "veo");
        assert_eq!(cfg.video.poll_interval, Duration::from_secs(9));
    }

    #[test]
    fn cycle_detection() {
        let dir = TempDir::new().unwrap();
        let self_path = dir.path().join("self.toml");
        let content = format!("[meta]\nbase = \"{}\"\n\n{BASE_TOML}", self_path.display());
        std::fs::write(&self_path, content).unwrap();
        let msg = load_from(&self_path, None, None).unwrap_err().to_string();
        assert!(msg.contains("circular"));
    }
}
