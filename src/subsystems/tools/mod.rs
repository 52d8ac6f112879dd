//! Tools subsystem — named functions callable over the bus.
//!
//! | method          | payload       | reply                                   |
//! |-----------------|---------------|-----------------------------------------|
//! | `tools/execute` | `ToolRequest` | `ToolResponse` with a one-line `output` |
//! | `tools/list`    | any           | `JsonResponse` with function schemas    |

mod video;

pub use video::{GenerateArgs, QueryArgs, definitions};

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::oneshot;
use tracing::debug;

use crate::subsystems::video::{VideoPlugin, session_key};
use crate::supervisor::bus::{BusError, BusPayload, BusResult, ERR_METHOD_NOT_FOUND};
use crate::supervisor::dispatch::{BusHandler, reply_invalid_payload, reply_method_not_found};

pub struct ToolsSubsystem {
    plugin: Arc<VideoPlugin>,
}

impl ToolsSubsystem {
    pub fn new(plugin: Arc<VideoPlugin>) -> Self {
        Self { plugin }
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, args_json: &str) -> Result<T, String> {
    let args_json = if args_json.trim().is_empty() { "{}" } else { args_json };
    serde_json::from_str(args_json).map_err(|e| format!("invalid arguments for {tool}: {e}"))
}

fn tool_response(tool: &str, result: Result<String, String>) -> BusPayload {
    match result {
        Ok(output) => BusPayload::ToolResponse {
            tool: tool.to_string(),
            ok: true,
            output: Some(output),
            error: None,
        },
        Err(error) => BusPayload::ToolResponse {
            tool: tool.to_string(),
            ok: false,
            output: None,
            error: Some(error),
        },
    }
}

impl BusHandler for ToolsSubsystem {
    fn prefix(&self) -> &str {
        "tools"
    }

    fn handle_request(&self, method: &str, payload: BusPayload, reply_tx: oneshot::Sender<BusResult>) {
        if method == "tools/list" {
            let data = definitions().to_string();
            let _ = reply_tx.send(Ok(BusPayload::JsonResponse { data }));
            return;
        }

        if method != "tools/execute" {
            reply_method_not_found(method, reply_tx);
            return;
        }

        let BusPayload::ToolRequest { tool, args_json, channel_id, session_id } = payload else {
            reply_invalid_payload("ToolRequest", reply_tx);
            return;
        };

        let session = session_key(&channel_id, &session_id);
        let plugin = self.plugin.clone();
        debug!(%tool, %session, "tool call");

        match tool.as_str() {
            "video_generate" => {
                tokio::spawn(async move {
                    let args = parse_args::<GenerateArgs>(&tool, &args_json).and_then(|args| {
                        args.validated().map_err(|e| format!("invalid arguments for {tool}: {e}"))
                    });
                    let result = match args {
                        Ok(args) => Ok(video::generate(&plugin, &session, args).await),
                        Err(e) => Err(e),
                    };
                    let _ = reply_tx.send(Ok(tool_response(&tool, result)));
                });
            }
            "video_query_status" => {
                tokio::spawn(async move {
                    let result = match parse_args::<QueryArgs>(&tool, &args_json) {
                        Ok(args) => Ok(video::query_status(&plugin, &session, args).await),
                        Err(e) => Err(e),
                    };
                    let _ = reply_tx.send(Ok(tool_response(&tool, result)));
                });
            }
            _ => {
                let _ = reply_tx.send(Err(BusError::new(
                    ERR_METHOD_NOT_FOUND,
                    format!("tool not found: {tool}"),
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ProviderConfig};
    use crate::subsystems::store::TmpStore;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn handler(providers: Vec<ProviderConfig>) -> ToolsSubsystem {
        let mut cfg = Config::test_default(&std::env::temp_dir()).video;
        cfg.providers = providers;
        let plugin = VideoPlugin::new(&cfg, Arc::new(TmpStore::new())).unwrap();
        ToolsSubsystem::new(Arc::new(plugin))
    }

    async fn call(h: &ToolsSubsystem, tool: &str, args: serde_json::Value) -> BusResult {
        let (tx, rx) = oneshot::channel();
        h.handle_request(
            "tools/execute",
            BusPayload::ToolRequest {
                tool: tool.into(),
                args_json: args.to_string(),
                channel_id: "test".into(),
                session_id: "s1".into(),
            },
            tx,
        );
        rx.await.unwrap()
    }

    fn output(result: BusResult) -> String {
        match result {
            Ok(BusPayload::ToolResponse { ok: true, output: Some(o), .. }) => o,
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn list_returns_schemas() {
        let h = handler(Vec::new());
        let (tx, rx) = oneshot::channel();
        h.handle_request("tools/list", BusPayload::Ack, tx);
        match rx.await.unwrap() {
            Ok(BusPayload::JsonResponse { data }) => assert!(data.contains("video_query_status")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_and_bad_args() {
        let h = handler(Vec::new());
        let err = call(&h, "image_generate", json!({})).await.unwrap_err();
        assert_eq!(err.code, ERR_METHOD_NOT_FOUND);

        match call(&h, "video_query_status", json!({"id": 1})).await {
            Ok(BusPayload::ToolResponse { ok: false, error: Some(e), .. }) => {
                assert!(e.starts_with("invalid arguments for video_query_status"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn generate_rejects_missing_or_blank_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "t0", "status": "queued"})))
            .expect(0)
            .mount(&server)
            .await;
        let h = handler(vec![ProviderConfig::new("veo", server.uri())]);

        for args in [json!({"wait": false}), json!({"prompt": " ", "wait": false})] {
            match call(&h, "video_generate", args).await {
                Ok(BusPayload::ToolResponse { ok: false, error: Some(e), .. }) => {
                    assert!(e.starts_with("invalid arguments for video_generate"), "{e}");
                }
                other => panic!("unexpected: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn generate_without_provider() {
        let h = handler(Vec::new());
        let out = output(call(&h, "video_generate", json!({"prompt": "a cat"})).await);
        assert_eq!(out, "video_generate failed: provider_id is unknown or not configured.");
    }

    #[tokio::test]
    async fn generate_no_wait_sends_options() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/videos"))
            .and(body_json(json!({
                "prompt": "a cat",
                "model": "fast",
                "seconds": 4,
                "aspect_ratio": "9:16"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "t1", "status": "queued"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut p = ProviderConfig::new("veo", server.uri());
        p.duration_field = "seconds".into();
        let h = handler(vec![p]);

        let out = output(
            call(
                &h,
                "video_generate",
                json!({"prompt": "a cat", "model": "fast", "duration": 4, "aspect_ratio": " 9:16 ", "wait": false}),
            )
            .await,
        );
        assert_eq!(out, "video_generate submitted: provider=veo, task_id=t1, status=queued");
        assert_eq!(h.plugin.tasks().load("t1").unwrap().model, "fast");
    }

    #[tokio::test]
    async fn generate_waits_for_video_then_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/videos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "t2", "status": "queued"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/videos/t2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "t2", "status": "completed", "output": [{"url": "https://cdn.example/t2.mp4"}]
            })))
            .mount(&server)
            .await;
        let h = handler(vec![ProviderConfig::new("veo", server.uri())]);

        let out = output(call(&h, "video_generate", json!({"prompt": "a cat"})).await);
        assert_eq!(out, "video_generate task completed: task_id=t2, url=https://cdn.example/t2.mp4");

        let out = output(call(&h, "video_query_status", json!({"task_id": "t2"})).await);
        assert_eq!(out, "video_query_status: completed, task_id=t2, url=https://cdn.example/t2.mp4");

        let out = output(call(&h, "video_query_status", json!({"task_id": "zzz"})).await);
        assert_eq!(out, "video_query_status: no local record for task_id=zzz.");
    }

    #[tokio::test]
    async fn generate_reports_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/videos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "t3", "status": "rejected"})))
            .mount(&server)
            .await;
        let h = handler(vec![ProviderConfig::new("veo", server.uri())]);

        let out = output(call(&h, "video_generate", json!({"prompt": "x"})).await);
        assert_eq!(out, "video_generate task failed: task_id=t3, status=rejected, error=-");
    }
}
