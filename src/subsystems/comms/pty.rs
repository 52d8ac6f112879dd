//! PTY (console) comms channel — reads lines from stdin and prints replies.
//!
//! - `/video …` lines (and anything else) go to the video plugin; replies
//!   are printed as they stream in, so the prompt stays usable while a
//!   generation is polling.
//! - `/tool <name> [json-args]` calls a tool in the background and prints
//!   its result when it arrives.
//!
//! Ctrl-C (the `shutdown` token) stops the console at once. When stdin is
//! closed the channel waits for commands still in flight before exiting.

use std::io::Write as _;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::state::{CommsEvent, CommsState};
use crate::error::AppError;
use crate::subsystems::runtime::{Component, ComponentFuture};

/// All console input belongs to one session.
const PTY_SESSION: &str = "local";

// ── PtyChannel ───────────────────────────────────────────────────────────────

pub struct PtyChannel {
    channel_id: String,
    state: Arc<CommsState>,
}

impl PtyChannel {
    pub fn new(channel_id: impl Into<String>, state: Arc<CommsState>) -> Self {
        Self { channel_id: channel_id.into(), state }
    }
}

impl Component for PtyChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(async move {
            info!(channel_id = %self.channel_id, "pty channel started");
            println!("─────────────────────────────────────────────");
            println!(" vidgen console  (`/video help`, Ctrl-C to quit)");
            println!("─────────────────────────────────────────────");
            let input = BufReader::new(tokio::io::stdin());
            serve_lines(self.channel_id, self.state, input, shutdown).await
        })
    }
}

/// `/tool <name> [args]` → `(name, args)`; args default to `{}`.
fn parse_tool_line(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("/tool")?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim();
    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((n, a)) => (n, a.trim()),
        None => (rest, ""),
    };
    if name.is_empty() {
        return None;
    }
    let args = if args.is_empty() { "{}" } else { args };
    Some((name.to_string(), args.to_string()))
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

// ── serve_lines ──────────────────────────────────────────────────────────────

async fn serve_lines<R>(
    channel_id: String,
    state: Arc<CommsState>,
    input: R,
    shutdown: CancellationToken,
) -> Result<(), AppError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let in_flight = TaskTracker::new();

    loop {
        prompt();

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                println!();
                info!("pty channel shutting down");
                break;
            }

            line = lines.next_line() => {
                let input = match line {
                    Err(e) => {
                        warn!("pty read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!("pty stdin closed");
                        break;
                    }
                    Ok(Some(input)) => input.trim().to_string(),
                };
                if input.is_empty() {
                    continue;
                }
                debug!(%input, "pty received line");

                if let Some((tool, args)) = parse_tool_line(&input) {
                    let state = state.clone();
                    let channel_id = channel_id.clone();
                    in_flight.spawn(async move {
                        match state.call_tool(&channel_id, PTY_SESSION, &tool, args).await {
                            Ok(output) => println!("{output}"),
                            Err(e) => println!("[error] {e}"),
                        }
                    });
                    continue;
                }

                match state.send_message(&channel_id, PTY_SESSION, input).await {
                    Err(e) => {
                        warn!("send_message error: {e}, pty exiting");
                        break;
                    }
                    Ok(mut replies) => {
                        in_flight.spawn(async move {
                            while let Some(reply) = replies.recv().await {
                                println!("{}", reply.to_plain());
                            }
                        });
                    }
                }
            }
        }
    }

    in_flight.close();
    if !in_flight.is_empty() && !shutdown.is_cancelled() {
        info!(pending = in_flight.len(), "waiting for console commands to finish");
        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = in_flight.wait() => {}
        }
    }

    state.report_event(CommsEvent::ChannelShutdown { channel_id });
    Ok(())
}
