//! Supervisor dispatch — generic trait for subsystem request handlers.
//!
//! Each subsystem implements [`BusHandler`] and registers with the supervisor
//! under its [`BusHandler::prefix`].  The supervisor routes incoming bus
//! messages to the matching handler without knowing the concrete type.
//!
//! # Method routing
//!
//! Method strings follow the form `"prefix/action"` (`"video/command"`,
//! `"tools/execute"`).  The supervisor looks up the first `/`-delimited
//! segment in its handler table and passes the full method string on, so
//! handlers do their own secondary routing on the action.

use tokio::sync::oneshot;

use crate::supervisor::bus::{BusError, BusPayload, BusResult, ERR_INVALID_PAYLOAD, ERR_METHOD_NOT_FOUND};

/// A subsystem that can handle [`crate::supervisor::bus::BusMessage`]s.
///
/// Implementations must be `Send + Sync` so the supervisor can hold them
/// behind `Arc` or pass references into spawned tasks if needed.
pub trait BusHandler: Send + Sync {
    /// The method prefix this handler owns (e.g. `"video"`, `"tools"`).
    ///
    /// Must be unique across all registered handlers.  The supervisor panics
    /// on startup if two handlers share the same prefix.
    fn prefix(&self) -> &str;

    /// Handle an incoming request, taking ownership of `reply_tx`.
    ///
    /// Implementations **must not block** the caller — either resolve
    /// `reply_tx` synchronously or move it into a `tokio::spawn` task.
    fn handle_request(
        &self,
        method: &str,
        payload: BusPayload,
        reply_tx: oneshot::Sender<BusResult>,
    );
}

/// Resolve `reply_tx` with a method-not-found error for `method`.
pub fn reply_method_not_found(method: &str, reply_tx: oneshot::Sender<BusResult>) {
    let _ = reply_tx.send(Err(BusError::new(
        ERR_METHOD_NOT_FOUND,
        format!("method not found: {method}"),
    )));
}

/// Resolve `reply_tx` with an invalid-payload error naming the expected variant.
pub fn reply_invalid_payload(expected: &str, reply_tx: oneshot::Sender<BusResult>) {
    let _ = reply_tx.send(Err(BusError::new(
        ERR_INVALID_PAYLOAD,
        format!("expected {expected} payload"),
    )));
}
