//! Supervisor event bus — typed messages between comms, the video plugin and
//! tools.
//!
//! Every interaction is a JSON-RPC-flavoured [`BusMessage`]: a `method`
//! string routed by its first `/` segment, a [`BusPayload`], and a oneshot
//! reply slot resolving to a [`BusResult`].

use std::fmt;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

// ── Error codes ─────────────────────────────────────────────────────────────

/// No handler (or handler method) owns the requested method.
pub const ERR_METHOD_NOT_FOUND: i32 = -32601;
/// The payload variant does not match what the method expects.
pub const ERR_INVALID_PAYLOAD: i32 = -32600;

/// Error returned by a handler in place of a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusError {
    pub code: i32,
    pub message: String,
}

impl BusError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

pub type BusResult = Result<BusPayload, BusError>;

// ── Chat replies ────────────────────────────────────────────────────────────

/// One outbound chat message produced by a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    /// A caption plus a video the channel can render or link.
    Video { caption: String, url: String },
}

impl Reply {
    pub fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }

    /// A video reply when `url` is an absolute http(s) URL, otherwise the
    /// caption with the URL on its own line.
    pub fn video(caption: impl Into<String>, url: impl Into<String>) -> Self {
        let caption = caption.into();
        let url = url.into();
        let playable = reqwest::Url::parse(&url)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if playable {
            Reply::Video { caption, url }
        } else {
            Reply::Text(format!("{caption}\nVideo URL: {url}"))
        }
    }

    /// Text rendering for channels without media support.
    pub fn to_plain(&self) -> String {
        match self {
            Reply::Text(s) => s.clone(),
            Reply::Video { caption, url } => format!("{caption}\nVideo URL: {url}"),
        }
    }
}

// ── Payloads ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum BusPayload {
    /// A chat line from a comms channel. Command output is streamed to
    /// `outbox`; the receiver sees the channel close when the command is done.
    CommsMessage {
        channel_id: String,
        session_id: String,
        content: String,
        outbox: mpsc::Sender<Reply>,
    },
    /// Invoke a named tool with JSON-encoded arguments.
    ToolRequest {
        tool: String,
        args_json: String,
        channel_id: String,
        session_id: String,
    },
    ToolResponse {
        tool: String,
        ok: bool,
        output: Option<String>,
        error: Option<String>,
    },
    /// Arbitrary JSON document (serialized).
    JsonResponse { data: String },
    /// Request accepted; nothing further to return.
    Ack,
}

// ── Messages ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum BusMessage {
    Request {
        method: String,
        payload: BusPayload,
        reply_tx: oneshot::Sender<BusResult>,
    },
}

/// Failure on the bus itself, as opposed to a handler's [`BusError`].
#[derive(Debug, Error)]
pub enum BusCallError {
    #[error("supervisor bus closed")]
    Closed,
    #[error("handler dropped the reply channel")]
    NoReply,
}

// ── Handle ──────────────────────────────────────────────────────────────────

/// Cloneable sending side of the bus, handed to subsystems.
#[derive(Debug, Clone)]
pub struct BusHandle {
    tx: mpsc::Sender<BusMessage>,
}

impl BusHandle {
    /// Send a request and await the handler's result.
    pub async fn request(
        &self,
        method: impl Into<String>,
        payload: BusPayload,
    ) -> Result<BusResult, BusCallError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(BusMessage::Request { method: method.into(), payload, reply_tx })
            .await
            .map_err(|_| BusCallError::Closed)?;
        reply_rx.await.map_err(|_| BusCallError::NoReply)
    }
}

/// Owns the supervisor-side receiver.
pub struct SupervisorBus {
    pub rx: mpsc::Receiver<BusMessage>,
    pub handle: BusHandle,
}

impl SupervisorBus {
    pub fn new(buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer);
        Self { rx, handle: BusHandle { tx } }
    }
}
