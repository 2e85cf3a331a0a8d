//! Shared pieces of the tuplet workspace: the daemon wire protocol, the
//! one-shot IPC client, configuration and platform paths.

pub mod client;
pub mod config;
pub mod platform;
pub mod protocol;
