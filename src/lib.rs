//! vidgen-bot — chat-driven AI video generation over configurable HTTP
//! providers.
//!
//! The binary entry point is `src/main.rs`; the library exposes every layer
//! for integration tests.

pub mod bootstrap;
pub mod core;
pub mod subsystems;
pub mod supervisor;
pub mod video;

pub use bootstrap::logger;
pub use self::core::{config, error};
