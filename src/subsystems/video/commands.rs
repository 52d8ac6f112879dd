//! `/video …` chat commands.

use tokio::sync::mpsc;
use tracing::debug;

use super::VideoPlugin;
use crate::supervisor::bus::Reply;
use crate::video::{TaskOutcome, classify};

pub const USAGE: &str = "Video commands:\n\
  /video providers                    list configured providers\n\
  /video gen <provider_id> <prompt>   submit a generation task and wait for the result\n\
  /video status [task_id]             refresh a task (default: this session's last task)\n\
  /video help                         show this message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoCommand {
    Providers,
    /// Everything after the provider id is the prompt, spaces included.
    Gen { provider_id: String, prompt: String },
    /// Empty id = the session's last task.
    Status { task_id: String },
    Help,
    /// Malformed input; the message says what is wrong.
    Invalid(String),
}

/// Parse one chat line. The leading `/video` is optional.
pub fn parse(input: &str) -> VideoCommand {
    let input = input.trim();
    let rest = input
        .strip_prefix("/video")
        .filter(|r| r.is_empty() || r.starts_with(char::is_whitespace))
        .unwrap_or(input)
        .trim_start();

    let (sub, args) = match rest.split_once(char::is_whitespace) {
        Some((s, a)) => (s, a.trim()),
        None => (rest, ""),
    };

    match sub {
        "providers" => VideoCommand::Providers,
        "gen" => {
            let (provider_id, prompt) = match args.split_once(char::is_whitespace) {
                Some((p, rest)) => (p, rest.trim()),
                None => (args, ""),
            };
            if provider_id.is_empty() || prompt.is_empty() {
                VideoCommand::Invalid("Usage: /video gen <provider_id> <prompt>".to_string())
            } else {
                VideoCommand::Gen {
                    provider_id: provider_id.to_string(),
                    prompt: prompt.to_string(),
                }
            }
        }
        "status" => VideoCommand::Status {
            task_id: args.split_whitespace().next().unwrap_or_default().to_string(),
        },
        "" | "help" => VideoCommand::Help,
        other => VideoCommand::Invalid(format!("Unknown command `{other}`.\n{USAGE}")),
    }
}

/// Run one command for `session`, streaming replies into `out`.
pub async fn execute(plugin: &VideoPlugin, session: &str, input: &str, out: &mpsc::Sender<Reply>) {
    let command = parse(input);
    debug!(%session, ?command, "video command");
    match command {
        VideoCommand::Providers => send(out, Reply::Text(providers_text(plugin))).await,
        VideoCommand::Gen { provider_id, prompt } => run_gen(plugin, session, &provider_id, &prompt, out).await,
        VideoCommand::Status { task_id } => send(out, status(plugin, session, &task_id).await).await,
        VideoCommand::Help => send(out, Reply::text(USAGE)).await,
        VideoCommand::Invalid(msg) => send(out, Reply::Text(msg)).await,
    }
}

async fn send(out: &mpsc::Sender<Reply>, reply: Reply) {
    if out.send(reply).await.is_err() {
        debug!("reply dropped: channel went away");
    }
}

pub fn providers_text(plugin: &VideoPlugin) -> String {
    let providers = plugin.providers();
    if providers.is_empty() {
        return "No video providers configured. Add [[video.providers]] entries to the config.".to_string();
    }
    let mut lines = vec!["Available providers:".to_string()];
    for p in providers.iter() {
        let tag = if p.provider_id == providers.default_provider_id() { " (default)" } else { "" };
        let model = if p.model.is_empty() { "-" } else { p.model.as_str() };
        lines.push(format!("- {}{tag}, model={model}, base_url={}", p.provider_id, p.base_url));
    }
    lines.join("\n")
}

async fn run_gen(plugin: &VideoPlugin, session: &str, provider_id: &str, prompt: &str, out: &mpsc::Sender<Reply>) {
    let Some(provider) = plugin.providers().resolve(provider_id) else {
        send(
            out,
            Reply::Text(format!(
                "Provider `{provider_id}` not found. Run `/video providers` to list available ids."
            )),
        )
        .await;
        return;
    };

    let submitted = match plugin.submit(session, provider, prompt, "", None).await {
        Ok(s) => s,
        Err(e) => {
            send(out, Reply::Text(format!("Failed to submit video task: {e}"))).await;
            return;
        }
    };

    let shown_id = if submitted.task_id.is_empty() { "N/A" } else { submitted.task_id.as_str() };
    send(
        out,
        Reply::Text(format!(
            "Task submitted: provider={}, task_id={shown_id}, status={}. Waiting for generation to finish...",
            provider.provider_id, submitted.status
        )),
    )
    .await;

    let done = plugin.wait(session, provider, submitted, prompt, "").await;

    let reply = match classify(provider, &done) {
        TaskOutcome::Failed { detail } => Reply::Text(format!(
            "Video generation failed: task_id={}, detail={detail}",
            done.task_id
        )),
        TaskOutcome::Completed { url } => Reply::video(
            format!(
                "Video ready: provider={}, task_id={}, status={}",
                provider.provider_id, done.task_id, done.status
            ),
            url,
        ),
        TaskOutcome::Pending => Reply::Text(format!(
            "Task is still processing; check later with `/video status <task_id>`.\n\
             Current task_id={}, status={}",
            done.task_id, done.status
        )),
    };
    send(out, reply).await;
}

async fn status(plugin: &VideoPlugin, session: &str, task_id: &str) -> Reply {
    let task_id = match task_id.trim() {
        "" => match plugin.tasks().last_task_id(session) {
            Some(id) => id,
            None => return Reply::text("No task_id given and this session has no previous task."),
        },
        id => id.to_string(),
    };

    let Some(record) = plugin.tasks().load(&task_id) else {
        return Reply::Text(format!(
            "No local record for task_id={task_id}. Submit one with `/video gen` first."
        ));
    };

    let Some(provider) = plugin.providers().get(&record.snapshot.provider_id) else {
        return Reply::Text(format!(
            "Provider `{}` for this task is not configured; cannot refresh.",
            record.snapshot.provider_id
        ));
    };

    let latest = match plugin.refresh(session, provider, &record.snapshot.task_id).await {
        Ok(s) => s,
        Err(e) => return Reply::Text(format!("Status query failed: {e}")),
    };

    if latest.has_video() {
        return Reply::video(
            format!(
                "Task complete: provider={}, task_id={}, status={}",
                provider.provider_id, latest.task_id, latest.status
            ),
            latest.video_url.clone(),
        );
    }

    let mut line = format!(
        "Task status: provider={}, task_id={}, status={}",
        provider.provider_id, latest.task_id, latest.status
    );
    if !latest.error_message.is_empty() {
        line.push_str(&format!(", error={}", latest.error_message));
    }
    Reply::Text(line)
}
