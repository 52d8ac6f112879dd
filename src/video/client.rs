//! Generic submit / query client for config-described video providers.
//!
//! Nothing here knows a specific vendor: every URL, body key and response
//! field comes from the [`ProviderConfig`]. Wire shapes stay as loose
//! `serde_json::Value`s and are mapped into a [`TaskSnapshot`] through the
//! configured JSON paths.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use serde_json::{Map, Value, json};
use tracing::{debug, error};

use crate::config::{HttpMethod, ProviderConfig};

use super::error::VideoApiError;
use super::json_path::extract_text;
use super::snapshot::TaskSnapshot;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_PREVIEW_CHARS: usize = 300;
const RESPONSE_PREVIEW_CHARS: usize = 500;
const PROMPT_PREVIEW_CHARS: usize = 80;

/// HTTP client shared by every provider. Cheap to clone: `reqwest::Client`
/// is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct VideoApiClient {
    client: Client,
}

impl VideoApiClient {
    /// `request_timeout` bounds each whole request; connecting is capped at 10 s.
    pub fn new(request_timeout: Duration) -> Result<Self, VideoApiError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| VideoApiError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Submit a generation request.
    ///
    /// Body = `extra_body`, then the prompt, then the model (override if
    /// non-blank, else the provider default, omitted if both are empty), then
    /// `extra_options` (duration, aspect ratio, …) on top.
    pub async fn submit(
        &self,
        provider: &ProviderConfig,
        prompt: &str,
        model_override: &str,
        extra_options: Option<&Map<String, Value>>,
    ) -> Result<TaskSnapshot, VideoApiError> {
        let mut payload = provider.extra_body.clone();
        payload.insert(provider.prompt_field.clone(), Value::String(prompt.to_string()));

        let model = match model_override.trim() {
            "" => provider.model.trim(),
            m => m,
        };
        if !model.is_empty() {
            payload.insert(provider.model_field.clone(), Value::String(model.to_string()));
        }
        if let Some(options) = extra_options {
            payload.extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let url = join_url(&provider.base_url, &provider.submit_path);
        let model_label = if model.is_empty() { "(default)" } else { model };
        debug!(
            provider = %provider.provider_id,
            method = %provider.submit_method,
            %url,
            model = %model_label,
            prompt = %preview(prompt, PROMPT_PREVIEW_CHARS),
            "submitting video task"
        );

        let data = self
            .request_json(
                provider.submit_method,
                &url,
                &build_headers(provider, provider.submit_method),
                Some(&Value::Object(payload)),
                &provider.error_field,
            )
            .await?;

        let snapshot = snapshot_from_payload(provider, data, "")?;
        debug!(task_id = %snapshot.task_id, status = %snapshot.status, "submit response mapped");
        Ok(snapshot)
    }

    /// Fetch the current state of `task_id`.
    ///
    /// Non-GET status methods carry the id in the body under
    /// [`status_request_id_key`].
    pub async fn query(&self, provider: &ProviderConfig, task_id: &str) -> Result<TaskSnapshot, VideoApiError> {
        let url = status_url(provider, task_id);
        let body = (!provider.status_method.is_get())
            .then(|| json!({ status_request_id_key(provider): task_id }));

        debug!(
            provider = %provider.provider_id,
            method = %provider.status_method,
            %url,
            %task_id,
            "querying video task"
        );

        let data = self
            .request_json(
                provider.status_method,
                &url,
                &build_headers(provider, provider.status_method),
                body.as_ref(),
                &provider.error_field,
            )
            .await?;

        let snapshot = snapshot_from_payload(provider, data, task_id)?;
        debug!(
            task_id = %snapshot.task_id,
            status = %snapshot.status,
            has_video = snapshot.has_video(),
            "query response mapped"
        );
        Ok(snapshot)
    }

    /// One HTTP round-trip, normalised to a JSON object.
    ///
    /// - non-JSON bodies become `{"raw_text": …}`
    /// - non-object JSON becomes `{"data": …}`
    /// - an empty body on success is an error (no task id to read)
    /// - status ≥ 400 is an error carrying the provider's error text
    async fn request_json(
        &self,
        method: HttpMethod,
        url: &str,
        headers: &[(String, String)],
        body: Option<&Value>,
        error_path: &str,
    ) -> Result<Map<String, Value>, VideoApiError> {
        if tracing::enabled!(tracing::Level::DEBUG) {
            let masked: Vec<(String, String)> = headers
                .iter()
                .map(|(k, v)| {
                    if k.eq_ignore_ascii_case("authorization") {
                        (k.clone(), mask_key(v))
                    } else {
                        (k.clone(), v.clone())
                    }
                })
                .collect();
            let body_preview = body
                .map(|b| preview(&b.to_string(), REQUEST_PREVIEW_CHARS))
                .unwrap_or_else(|| "(none)".to_string());
            debug!(%method, %url, headers = ?masked, body = %body_preview, "http request");
        }

        let mut req = self
            .client
            .request(to_reqwest_method(method), url)
            .headers(to_header_map(headers)?);
        if let Some(b) = body {
            req = req.json(b);
        }

        let response = req.send().await.map_err(|e| {
            error!(%url, error = %e, "video HTTP request failed (transport)");
            VideoApiError::Transport(e.to_string())
        })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| VideoApiError::Transport(format!("failed to read response body: {e}")))?;
        let text = text.trim();

        let body_preview = if text.is_empty() {
            "(empty)".to_string()
        } else {
            preview(text, RESPONSE_PREVIEW_CHARS)
        };
        debug!(status, body = %body_preview, "http response");

        let payload = if !text.is_empty() {
            serde_json::from_str::<Value>(text).unwrap_or_else(|_| json!({ "raw_text": text }))
        } else if status < 400 {
            return Err(VideoApiError::EmptyResponse { status });
        } else {
            Value::Object(Map::new())
        };

        if status >= 400 {
            let detail = if is_truthy(&payload) {
                extract_text(&payload, error_path, "")
            } else {
                text.to_string()
            };
            let detail = if detail.is_empty() { "none".to_string() } else { detail };
            error!(status, %detail, "video service returned HTTP error");
            return Err(VideoApiError::Http { status, detail });
        }

        Ok(match payload {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        })
    }
}

/// Map a normalised response object onto a [`TaskSnapshot`].
///
/// The task id falls back to `fallback_task_id` (the id being queried) and the
/// status to `"unknown"`. A response yielding neither task id nor video url
/// is rejected.
pub fn snapshot_from_payload(
    provider: &ProviderConfig,
    payload: Map<String, Value>,
    fallback_task_id: &str,
) -> Result<TaskSnapshot, VideoApiError> {
    let value = Value::Object(payload);

    let mut task_id = extract_text(&value, &provider.task_id_field, "");
    if task_id.is_empty() {
        task_id = fallback_task_id.to_string();
    }
    let status = extract_text(&value, &provider.status_field, "unknown");
    let video_url = extract_text(&value, &provider.output_url_field, "");
    let error_message = extract_text(&value, &provider.error_field, "");

    if task_id.is_empty() && video_url.is_empty() {
        return Err(VideoApiError::MissingTaskId {
            provider_id: provider.provider_id.clone(),
        });
    }

    let raw = match value {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    Ok(TaskSnapshot {
        provider_id: provider.provider_id.clone(),
        task_id,
        status,
        video_url,
        error_message,
        raw,
    })
}

/// `base` and `path` joined by exactly one `/`.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Status URL with `{task_id}` replaced by the percent-encoded id.
pub fn status_url(provider: &ProviderConfig, task_id: &str) -> String {
    let path = provider
        .status_path_template
        .replace("{task_id}", &urlencoding::encode(task_id));
    join_url(&provider.base_url, &path)
}

/// Body key carrying the task id on non-GET status queries: the explicit
/// `status_request_id_field`, else the last segment of `task_id_field`
/// without any index suffix, else `"id"`.
pub fn status_request_id_key(provider: &ProviderConfig) -> String {
    if !provider.status_request_id_field.is_empty() {
        return provider.status_request_id_field.clone();
    }
    if provider.task_id_field.is_empty() {
        return "id".to_string();
    }
    let leaf = provider
        .task_id_field
        .rsplit('.')
        .next()
        .unwrap_or_default();
    let leaf = leaf.split('[').next().unwrap_or_default();
    if leaf.is_empty() { "id".to_string() } else { leaf.to_string() }
}

/// Request headers for `method`. `extra_headers` are applied last and replace
/// same-named (case-insensitive) defaults.
pub fn build_headers(provider: &ProviderConfig, method: HttpMethod) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();
    if !method.is_get() {
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
    }
    if !provider.api_key.is_empty() {
        headers.push(("Authorization".to_string(), format!("Bearer {}", provider.api_key)));
    }
    for (name, value) in &provider.extra_headers {
        headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        headers.push((name.clone(), value.clone()));
    }
    headers
}

fn to_header_map(headers: &[(String, String)]) -> Result<HeaderMap, VideoApiError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| VideoApiError::Transport(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| VideoApiError::Transport(format!("invalid value for header '{name}': {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// `abcd***wxyz`; anything of eight characters or fewer is fully hidden.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}***{tail}")
}

fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// JSON "has content": non-empty containers and strings, non-zero numbers, `true`.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
