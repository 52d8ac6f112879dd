//! Shared state for the Comms subsystem — capability boundary for channels.
//!
//! Channels receive an `Arc<CommsState>` and are restricted to the typed
//! methods below. The raw [`BusHandle`] is private, so a channel can send
//! chat lines and call tools but nothing else.

use tokio::sync::mpsc;
use tracing::warn;

use crate::error::AppError;
use crate::supervisor::bus::{BusHandle, BusPayload, Reply};

/// Replies buffered per command before the plugin waits on the channel.
const OUTBOX_CAPACITY: usize = 16;

// ── Events ────────────────────────────────────────────────────────────────────

/// Events a channel sends back to the comms subsystem manager.
#[derive(Debug)]
pub enum CommsEvent {
    /// Channel has stopped (clean exit or EOF).
    ChannelShutdown { channel_id: String },
}

// ── State ─────────────────────────────────────────────────────────────────────

pub struct CommsState {
    bus: BusHandle,
    event_tx: mpsc::Sender<CommsEvent>,
}

impl CommsState {
    pub fn new(bus: BusHandle, event_tx: mpsc::Sender<CommsEvent>) -> Self {
        Self { bus, event_tx }
    }

    /// Hand a chat line to the video plugin.
    ///
    /// Returns as soon as the plugin accepts the line. Replies arrive on the
    /// returned receiver, which closes when the command has finished.
    pub async fn send_message(
        &self,
        channel_id: &str,
        session_id: &str,
        content: String,
    ) -> Result<mpsc::Receiver<Reply>, AppError> {
        let (outbox, replies) = mpsc::channel(OUTBOX_CAPACITY);
        let payload = BusPayload::CommsMessage {
            channel_id: channel_id.to_string(),
            session_id: session_id.to_string(),
            content,
            outbox,
        };

        match self.bus.request("video/command", payload).await {
            Err(e) => Err(AppError::Comms(format!("bus error: {e}"))),
            Ok(Err(e)) => Err(AppError::Comms(format!("video error {}: {}", e.code, e.message))),
            Ok(Ok(BusPayload::Ack)) => Ok(replies),
            Ok(Ok(_)) => Err(AppError::Comms("unexpected reply payload".to_string())),
        }
    }

    /// Call a tool and return its one-line output (or its error text).
    pub async fn call_tool(
        &self,
        channel_id: &str,
        session_id: &str,
        tool: &str,
        args_json: String,
    ) -> Result<String, AppError> {
        let payload = BusPayload::ToolRequest {
            tool: tool.to_string(),
            args_json,
            channel_id: channel_id.to_string(),
            session_id: session_id.to_string(),
        };

        match self.bus.request("tools/execute", payload).await {
            Err(e) => Err(AppError::Comms(format!("bus error: {e}"))),
            Ok(Err(e)) => Err(AppError::Comms(format!("tool error {}: {}", e.code, e.message))),
            Ok(Ok(BusPayload::ToolResponse { ok: true, output, .. })) => Ok(output.unwrap_or_default()),
            Ok(Ok(BusPayload::ToolResponse { error, .. })) => {
                Ok(error.unwrap_or_else(|| format!("{tool} failed")))
            }
            Ok(Ok(_)) => Err(AppError::Comms("unexpected reply payload".to_string())),
        }
    }

    /// Report an event to the comms subsystem manager without blocking.
    pub fn report_event(&self, event: CommsEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("comms event dropped: {e}");
        }
    }
}
