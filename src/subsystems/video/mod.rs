//! Video plugin — providers, task tracking and the `/video` commands.
//!
//! [`VideoPlugin`] holds everything the commands and the tool functions
//! share. [`VideoSubsystem`] exposes the commands on the bus under the
//! `video` prefix:
//!
//! | method          | payload          | reply                                  |
//! |-----------------|------------------|----------------------------------------|
//! | `video/command` | `CommsMessage`   | `Ack`; output streams to the outbox    |
//!
//! Every command runs in its own task, so a long poll never holds up the
//! bus or other sessions.

pub mod commands;
mod registry;
mod tasks;

pub use registry::ProviderRegistry;
pub use tasks::{TaskRecord, TaskRegistry};

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::config::{ProviderConfig, VideoConfig};
use crate::error::AppError;
use crate::subsystems::store::KvStore;
use crate::supervisor::bus::{BusPayload, BusResult};
use crate::supervisor::dispatch::{BusHandler, reply_invalid_payload, reply_method_not_found};
use crate::video::{PollPolicy, TaskSnapshot, VideoApiClient, VideoApiError, wait_for_result};

/// Session key for a chat origin.
pub fn session_key(channel_id: &str, session_id: &str) -> String {
    format!("{channel_id}:{session_id}")
}

pub struct VideoPlugin {
    providers: ProviderRegistry,
    client: VideoApiClient,
    tasks: TaskRegistry,
    policy: PollPolicy,
}

impl VideoPlugin {
    /// Build from resolved config. Config diagnostics collected during
    /// loading are logged here, once the subscriber is up.
    pub fn new(cfg: &VideoConfig, store: Arc<dyn KvStore>) -> Result<Self, AppError> {
        for diagnostic in &cfg.diagnostics {
            warn!("{diagnostic}");
        }

        let providers = ProviderRegistry::new(cfg.providers.clone(), cfg.default_provider_id.clone());
        if !cfg.default_provider_id.is_empty() && providers.get(&cfg.default_provider_id).is_none() {
            warn!(
                default_provider_id = %cfg.default_provider_id,
                "default provider is not configured; falling back to the first provider"
            );
        }
        info!(
            providers = providers.len(),
            store = store.store_type(),
            timeout_secs = cfg.request_timeout.as_secs_f64(),
            "video plugin ready"
        );

        Ok(Self {
            providers,
            client: VideoApiClient::new(cfg.request_timeout)?,
            tasks: TaskRegistry::new(store, cfg.task_cache_cap),
            policy: PollPolicy::from_config(cfg),
        })
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    /// Submit and record the new task. The recorded model is the trimmed
    /// override, else the provider default.
    pub async fn submit(
        &self,
        session: &str,
        provider: &ProviderConfig,
        prompt: &str,
        model_override: &str,
        extra_options: Option<&Map<String, Value>>,
    ) -> Result<TaskSnapshot, VideoApiError> {
        let snapshot = self.client.submit(provider, prompt, model_override, extra_options).await?;
        let model = match model_override.trim() {
            "" => provider.model.as_str(),
            m => m,
        };
        self.tasks.save(session, &snapshot, prompt, model);
        info!(
            provider = %provider.provider_id,
            task_id = %snapshot.task_id,
            status = %snapshot.status,
            "video task submitted"
        );
        Ok(snapshot)
    }

    /// Poll to completion (or budget exhaustion) and record the result.
    pub async fn wait(
        &self,
        session: &str,
        provider: &ProviderConfig,
        snapshot: TaskSnapshot,
        prompt: &str,
        model: &str,
    ) -> TaskSnapshot {
        let done = wait_for_result(&self.client, provider, snapshot, &self.policy).await;
        self.tasks.save(session, &done, prompt, model);
        info!(
            provider = %provider.provider_id,
            task_id = %done.task_id,
            status = %done.status,
            has_video = done.has_video(),
            "video task settled"
        );
        done
    }

    /// One status query, recorded on success.
    pub async fn refresh(
        &self,
        session: &str,
        provider: &ProviderConfig,
        task_id: &str,
    ) -> Result<TaskSnapshot, VideoApiError> {
        let latest = self.client.query(provider, task_id).await?;
        self.tasks.save(session, &latest, "", &provider.model);
        Ok(latest)
    }
}

// ── Bus handler ─────────────────────────────────────────────────────────────

pub struct VideoSubsystem {
    plugin: Arc<VideoPlugin>,
}

impl VideoSubsystem {
    pub fn new(plugin: Arc<VideoPlugin>) -> Self {
        Self { plugin }
    }
}

impl BusHandler for VideoSubsystem {
    fn prefix(&self) -> &str {
        "video"
    }

    fn handle_request(&self, method: &str, payload: BusPayload, reply_tx: oneshot::Sender<BusResult>) {
        if method != "video/command" {
            reply_method_not_found(method, reply_tx);
            return;
        }

        match payload {
            BusPayload::CommsMessage { channel_id, session_id, content, outbox } => {
                let _ = reply_tx.send(Ok(BusPayload::Ack));
                let plugin = self.plugin.clone();
                tokio::spawn(async move {
                    let session = session_key(&channel_id, &session_id);
                    commands::execute(&plugin, &session, &content, &outbox).await;
                });
            }
            _ => reply_invalid_payload("CommsMessage", reply_tx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::subsystems::store::TmpStore;
    use crate::supervisor::bus::{ERR_INVALID_PAYLOAD, ERR_METHOD_NOT_FOUND, Reply};
    use serde_json::json;
    use tokio::sync::mpsc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn plugin_with(providers: Vec<ProviderConfig>, default_id: &str) -> Arc<VideoPlugin> {
        let dir = std::env::temp_dir();
        let mut cfg = Config::test_default(&dir).video;
        cfg.providers = providers;
        cfg.default_provider_id = default_id.to_string();
        Arc::new(VideoPlugin::new(&cfg, Arc::new(TmpStore::new())).unwrap())
    }

    async fn run(plugin: &VideoPlugin, input: &str) -> Vec<Reply> {
        let (tx, mut rx) = mpsc::channel(16);
        commands::execute(plugin, "pty0:local", input, &tx).await;
        drop(tx);
        let mut out = Vec::new();
        while let Some(r) = rx.recv().await {
            out.push(r);
        }
        out
    }

    #[test]
    fn session_keys() {
        assert_eq!(session_key("pty0", "local"), "pty0:local");
    }

    #[tokio::test]
    async fn providers_listing() {
        let mut veo = ProviderConfig::new("veo", "https://veo.example");
        veo.model = "veo-3".into();
        let plugin = plugin_with(vec![veo, ProviderConfig::new("sora", "https://sora.example")], "sora");

        let out = run(&plugin, "/video providers").await;
        assert_eq!(
            out,
            vec![Reply::text(
                "Available providers:\n\
                 - veo, model=veo-3, base_url=https://veo.example\n\
                 - sora (default), model=-, base_url=https://sora.example"
            )]
        );

        let empty = plugin_with(Vec::new(), "");
        let out = run(&empty, "/video providers").await;
        assert!(out[0].to_plain().starts_with("No video providers configured"));
    }

    #[tokio::test]
    async fn gen_unknown_provider() {
        let plugin = plugin_with(vec![ProviderConfig::new("veo", "https://veo.example")], "");
        let out = run(&plugin, "/video gen grok a dog").await;
        assert_eq!(
            out,
            vec![Reply::text("Provider `grok` not found. Run `/video providers` to list available ids.")]
        );
    }

    #[tokio::test]
    async fn gen_submit_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/videos"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": {"message": "bad key"}})))
            .mount(&server)
            .await;
        let plugin = plugin_with(vec![ProviderConfig::new("veo", server.uri())], "");

        let out = run(&plugin, "/video gen veo a dog").await;
        assert_eq!(out.len(), 1);
        let text = out[0].to_plain();
        assert!(text.starts_with("Failed to submit video task:"));
        assert!(text.contains("HTTP 401"));
        assert!(text.contains("bad key"));
    }

    #[tokio::test]
    async fn gen_reports_failure_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/videos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "t1", "status": "queued"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/videos/t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "t1", "status": "failed", "error": {"message": "content policy"}
            })))
            .mount(&server)
            .await;
        let plugin = plugin_with(vec![ProviderConfig::new("veo", server.uri())], "");

        let out = run(&plugin, "/video gen veo a dog").await;
        assert_eq!(out.len(), 2);
        assert_eq!(
            out[0].to_plain(),
            "Task submitted: provider=veo, task_id=t1, status=queued. Waiting for generation to finish..."
        );
        assert_eq!(out[1].to_plain(), "Video generation failed: task_id=t1, detail=content policy");
    }

    #[tokio::test]
    async fn gen_pending_after_budget() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/videos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "t2", "status": "queued"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/videos/t2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "t2", "status": "running"})))
            .mount(&server)
            .await;
        let plugin = plugin_with(vec![ProviderConfig::new("veo", server.uri())], "");

        let out = run(&plugin, "/video gen veo waves").await;
        assert_eq!(
            out[1].to_plain(),
            "Task is still processing; check later with `/video status <task_id>`.\nCurrent task_id=t2, status=running"
        );
        let record = plugin.tasks().load("t2").unwrap();
        assert_eq!(record.snapshot.status, "running");
        assert_eq!(record.prompt, "waves");
    }

    #[tokio::test]
    async fn status_paths() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/videos/t3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "t3", "status": "running", "error": {"message": "slow queue"}
            })))
            .mount(&server)
            .await;
        let plugin = plugin_with(vec![ProviderConfig::new("veo", server.uri())], "");

        let out = run(&plugin, "/video status").await;
        assert_eq!(out[0].to_plain(), "No task_id given and this session has no previous task.");

        let out = run(&plugin, "/video status nope").await;
        assert_eq!(
            out[0].to_plain(),
            "No local record for task_id=nope. Submit one with `/video gen` first."
        );

        let orphan = TaskSnapshot {
            provider_id: "gone".into(),
            task_id: "t0".into(),
            status: "queued".into(),
            ..Default::default()
        };
        plugin.tasks().save("pty0:local", &orphan, "p", "");
        let out = run(&plugin, "/video status t0").await;
        assert_eq!(
            out[0].to_plain(),
            "Provider `gone` for this task is not configured; cannot refresh."
        );

        let known = TaskSnapshot {
            provider_id: "veo".into(),
            task_id: "t3".into(),
            status: "queued".into(),
            ..Default::default()
        };
        plugin.tasks().save("pty0:local", &known, "p", "");
        let out = run(&plugin, "/video status").await;
        assert_eq!(
            out[0].to_plain(),
            "Task status: provider=veo, task_id=t3, status=running, error=slow queue"
        );
    }

    #[tokio::test]
    async fn handler_rejects_unknown_method_and_payload() {
        let handler = VideoSubsystem::new(plugin_with(Vec::new(), ""));

        let (tx, rx) = oneshot::channel();
        handler.handle_request("video/render", BusPayload::Ack, tx);
        assert_eq!(rx.await.unwrap().unwrap_err().code, ERR_METHOD_NOT_FOUND);

        let (tx, rx) = oneshot::channel();
        handler.handle_request("video/command", BusPayload::Ack, tx);
        assert_eq!(rx.await.unwrap().unwrap_err().code, ERR_INVALID_PAYLOAD);
    }
}
