//! Command-line client for mihari.
//!
//! This crate provides the `mihari` binary: browser-based account linking,
//! keyword search, and a local AES-GCM credential vault.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod loopback;
pub mod secret;
pub mod vault;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
