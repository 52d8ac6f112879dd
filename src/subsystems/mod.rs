//! Subsystem modules for the vidgen bot.

pub mod comms;
pub mod runtime;
pub mod store;
#[cfg(feature = "subsystem-tools")]
pub mod tools;
pub mod video;
