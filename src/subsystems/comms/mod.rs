//! Comms subsystem — chat channels.
//!
//! Each channel implements [`Component`] and is spawned by [`start`] via
//! [`spawn_components`]. Channels capture an `Arc<CommsState>` at
//! construction and reach the rest of the bot only through it.
//!
//! A small `mpsc` channel lets running channels report lifecycle events to
//! the manager; it is drained by a background task that ends once every
//! channel has dropped its sender.

#[cfg(feature = "channel-pty")]
pub mod pty;
mod state;

pub use state::{CommsEvent, CommsState};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::subsystems::runtime::{Component, SubsystemHandle, spawn_components};
use crate::supervisor::bus::BusHandle;

// ── start ───────────────────────────────────────────────────────────────────

/// Spawn all configured channels. Returns immediately; the handle resolves
/// when every channel has exited.
pub fn start(config: &Config, bus: BusHandle, shutdown: CancellationToken) -> SubsystemHandle {
    let (event_tx, event_rx) = mpsc::channel::<CommsEvent>(32);
    let state = Arc::new(CommsState::new(bus, event_tx));

    let mut components: Vec<Box<dyn Component>> = Vec::new();

    #[cfg(feature = "channel-pty")]
    {
        if config.comms_pty_should_load() {
            info!("loading pty channel");
            components.push(Box::new(pty::PtyChannel::new("pty0", state.clone())));
        }
    }
    #[cfg(not(feature = "channel-pty"))]
    let _ = (config, &state);

    if components.is_empty() {
        info!("no comms channels configured — waiting for shutdown");
    }

    tokio::spawn(async move {
        let mut rx = event_rx;
        while let Some(event) = rx.recv().await {
            match event {
                CommsEvent::ChannelShutdown { ref channel_id } => {
                    debug!(channel_id, "channel reported shutdown");
                }
            }
        }
    });

    spawn_components(components, shutdown)
}
