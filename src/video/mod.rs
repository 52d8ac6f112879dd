//! Provider-agnostic video generation API.
//!
//! - **json_path** — dotted-path extraction from arbitrary responses
//! - **client** — submit / query over HTTP, mapped to [`TaskSnapshot`]s
//! - **poll** — terminal-state rules and the bounded wait loop

mod client;
mod error;
pub mod json_path;
mod poll;
mod snapshot;

pub use client::{VideoApiClient, build_headers, join_url, snapshot_from_payload, status_request_id_key, status_url};
pub use error::VideoApiError;
pub use poll::{PollPolicy, TaskOutcome, classify, is_failed, is_terminal, wait_for_result};
pub use snapshot::TaskSnapshot;
