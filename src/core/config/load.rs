//! Configuration loading with env-var overrides.
//!
//! Reads TOML files, supports `[meta] base = "..."` inheritance chains,
//! and applies `VIDGEN_WORK_DIR` and `VIDGEN_LOG_LEVEL` env overrides.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::AppError;

use super::raw::{RawConfig, RawJsonObject, RawProvider, RawTaskStore, RawValueList};
use super::types::*;

const MIN_REQUEST_TIMEOUT_SECS: f64 = 5.0;
const TASK_STORE_FILENAME: &str = "video_tasks.json";

/// Deep-merge two TOML values.
/// Tables are merged recursively — the overlay only needs to specify keys that
/// differ from the base. For every other type (string, integer, array, …)
/// the overlay value replaces the base value wholesale.
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_tbl), toml::Value::Table(overlay_tbl)) => {
            for (key, ov_val) in overlay_tbl {
                let merged = match base_tbl.remove(&key) {
                    Some(base_val) => merge_toml(base_val, ov_val),
                    None => ov_val,
                };
                base_tbl.insert(key, merged);
            }
            toml::Value::Table(base_tbl)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file, follow any `[meta] base = "..."` chain, and return the
/// fully merged `toml::Value`. `visited` carries canonicalized paths already
/// seen in this chain so circular references are caught early.
fn load_raw_merged(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<toml::Value, AppError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(AppError::Config(format!(
            "circular base reference detected at: {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let overlay_val: toml::Value = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if let Some(base_str) = overlay_val
        .get("meta")
        .and_then(|m| m.get("base"))
        .and_then(|b| b.as_str())
    {
        let base_path = if Path::new(base_str).is_absolute() {
            PathBuf::from(base_str)
        } else {
            path.parent().unwrap_or(Path::new(".")).join(base_str)
        };
        let base_val = load_raw_merged(&base_path, visited)?;
        Ok(merge_toml(base_val, overlay_val))
    } else {
        Ok(overlay_val)
    }
}

/// Load config from the given path, `VIDGEN_CONFIG`, or `config/default.toml`,
/// then apply env-var overrides.
///
/// With no explicit path and no default file present, built-in defaults are
/// used (no providers configured).
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let work_dir_override = env::var("VIDGEN_WORK_DIR").ok();
    let log_level_override = env::var("VIDGEN_LOG_LEVEL").ok();

    let explicit = config_path
        .map(str::to_string)
        .or_else(|| env::var("VIDGEN_CONFIG").ok());

    if let Some(path) = explicit {
        return load_from(
            Path::new(&path),
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        );
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_from(
            default_path,
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        )
    } else {
        resolve(
            RawConfig::default(),
            work_dir_override.as_deref(),
            log_level_override.as_deref(),
        )
    }
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
/// Follows `[meta] base = "..."` inheritance chains before resolving.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let merged_val = load_raw_merged(path, &mut HashSet::new())?;

    let parsed: RawConfig = Deserialize::deserialize(merged_val).map_err(|e: toml::de::Error| {
        AppError::Config(format!("config error in {}: {e}", path.display()))
    })?;

    resolve(parsed, work_dir_override, log_level_override)
}

fn resolve(
    parsed: RawConfig,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let s = parsed.supervisor;

    let work_dir_str = work_dir_override.unwrap_or(&s.work_dir).to_string();
    let work_dir = expand_home(&work_dir_str);
    let log_level = log_level_override.unwrap_or(&s.log_level).to_string();
    let log_file = s.log_file.map(|p| relative_to(&work_dir, &p));

    let v = parsed.video;
    let store = resolve_store(v.store, &work_dir)?;

    let mut diagnostics = Vec::new();
    let mut providers: Vec<ProviderConfig> = Vec::new();
    for (index, raw) in v.providers.into_iter().enumerate() {
        match resolve_provider(raw, &mut diagnostics) {
            Ok(provider) => {
                // A repeated id replaces the earlier entry in place.
                match providers.iter_mut().find(|p| p.provider_id == provider.provider_id) {
                    Some(existing) => *existing = provider,
                    None => providers.push(provider),
                }
            }
            Err(reason) => diagnostics.push(format!("video.providers[{index}] skipped: {reason}")),
        }
    }

    Ok(Config {
        bot_name: s.bot_name,
        work_dir,
        log_level,
        log_file,
        comms: CommsConfig {
            pty: PtyConfig {
                enabled: parsed.comms.pty.enabled,
            },
        },
        video: VideoConfig {
            default_provider_id: v.default_provider_id.trim().to_string(),
            request_timeout: request_timeout(v.request_timeout_seconds)?,
            poll_interval: Duration::from_secs(v.poll_interval_seconds.max(1)),
            max_poll_attempts: v.max_poll_attempts.max(1),
            max_transient_errors: v.max_transient_errors.max(1),
            debug_mode: v.debug_mode,
            task_cache_cap: v.task_cache_cap.max(1),
            store,
            providers,
            diagnostics,
        },
    })
}

/// Floors at five seconds; a value `Duration` cannot hold is a config error.
fn request_timeout(seconds: f64) -> Result<Duration, AppError> {
    let seconds = if seconds.is_finite() {
        seconds.max(MIN_REQUEST_TIMEOUT_SECS)
    } else {
        MIN_REQUEST_TIMEOUT_SECS
    };
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| AppError::Config(format!("video.request_timeout_seconds = {seconds}: {e}")))
}

fn resolve_store(raw: RawTaskStore, work_dir: &Path) -> Result<TaskStoreConfig, AppError> {
    let kind = match raw.kind.as_deref().map(str::trim) {
        None | Some("") | Some("json_file") => TaskStoreKind::JsonFile,
        Some("tmp") => TaskStoreKind::Tmp,
        Some(other) => {
            return Err(AppError::Config(format!(
                "unknown video.store.kind '{other}' (expected \"tmp\" or \"json_file\")"
            )));
        }
    };
    let path = raw
        .path
        .map(|p| relative_to(work_dir, &p))
        .unwrap_or_else(|| work_dir.join(TASK_STORE_FILENAME));
    Ok(TaskStoreConfig { kind, path })
}

fn relative_to(work_dir: &Path, path: &str) -> PathBuf {
    let p = expand_home(path);
    if p.is_absolute() { p } else { work_dir.join(p) }
}

/// Trimmed value, or `default` when missing.
fn text_or(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| default.to_string())
}

/// Trimmed value, or `default` when missing or blank.
fn non_empty_or(value: Option<String>, default: &str) -> String {
    let v = text_or(value, default);
    if v.is_empty() { default.to_string() } else { v }
}

fn resolve_provider(raw: RawProvider, diagnostics: &mut Vec<String>) -> Result<ProviderConfig, String> {
    let provider_id = text_or(raw.provider_id, "");
    let base_url = text_or(raw.base_url, "");
    if provider_id.is_empty() || base_url.is_empty() {
        return Err("provider_id and base_url are required".to_string());
    }

    let submit_method: HttpMethod = text_or(raw.submit_method, "POST")
        .parse()
        .map_err(|e| format!("{provider_id}: submit_method: {e}"))?;
    let status_method: HttpMethod = text_or(raw.status_method, "GET")
        .parse()
        .map_err(|e| format!("{provider_id}: status_method: {e}"))?;

    let mut api_key = text_or(raw.api_key, "");
    if api_key.is_empty()
        && let Some(var) = raw.api_key_env.as_deref().map(str::trim).filter(|v| !v.is_empty())
    {
        api_key = env::var(var).map(|k| k.trim().to_string()).unwrap_or_default();
    }

    let defaults = ProviderConfig::new(provider_id.clone(), base_url.clone());

    let extra_headers = parse_json_object(raw.extra_headers, &format!("{provider_id}.extra_headers"), diagnostics)
        .into_iter()
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (k, v)
        })
        .collect();
    let extra_body = parse_json_object(raw.extra_body, &format!("{provider_id}.extra_body"), diagnostics);

    Ok(ProviderConfig {
        api_key,
        model: text_or(raw.model, ""),
        submit_path: text_or(raw.submit_path, &defaults.submit_path),
        status_path_template: text_or(raw.status_path_template, &defaults.status_path_template),
        submit_method,
        status_method,
        prompt_field: text_or(raw.prompt_field, &defaults.prompt_field),
        model_field: text_or(raw.model_field, &defaults.model_field),
        task_id_field: text_or(raw.task_id_field, &defaults.task_id_field),
        status_field: text_or(raw.status_field, &defaults.status_field),
        output_url_field: text_or(raw.output_url_field, &defaults.output_url_field),
        error_field: text_or(raw.error_field, &defaults.error_field),
        done_values: parse_value_list(raw.done_values).unwrap_or(defaults.done_values),
        failed_values: parse_value_list(raw.failed_values).unwrap_or(defaults.failed_values),
        extra_headers,
        extra_body,
        status_request_id_field: text_or(raw.status_request_id_field, ""),
        duration_field: non_empty_or(raw.duration_field, &defaults.duration_field),
        aspect_ratio_field: non_empty_or(raw.aspect_ratio_field, &defaults.aspect_ratio_field),
        provider_id,
        base_url,
    })
}

/// Split CSV / list forms into trimmed, non-empty values. `None` when nothing
/// usable remains, so the caller falls back to the defaults.
fn parse_value_list(raw: Option<RawValueList>) -> Option<Vec<String>> {
    let items: Vec<String> = match raw? {
        RawValueList::List(items) => items,
        RawValueList::Csv(text) => text.split(',').map(str::to_string).collect(),
    };
    let items: Vec<String> = items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    (!items.is_empty()).then_some(items)
}

/// Accept a TOML table or a JSON object string. Anything else is reported in
/// `diagnostics` and treated as empty.
fn parse_json_object(
    raw: Option<RawJsonObject>,
    field_name: &str,
    diagnostics: &mut Vec<String>,
) -> Map<String, Value> {
    match raw {
        None => Map::new(),
        Some(RawJsonObject::Table(table)) => match serde_json::to_value(table) {
            Ok(Value::Object(map)) => map,
            _ => {
                diagnostics.push(format!("{field_name} could not be converted to JSON, ignored"));
                Map::new()
            }
        },
        Some(RawJsonObject::Json(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Map::new();
            }
            match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    diagnostics.push(format!("{field_name} must be a JSON object, ignored"));
                    Map::new()
                }
                Err(e) => {
                    diagnostics.push(format!("{field_name} is not valid JSON ({e}), ignored"));
                    Map::new()
                }
            }
        }
    }
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    if path == "~"
        && let Some(home) = dirs::home_dir()
    {
        return home;
    }
    PathBuf::from(path)
}
