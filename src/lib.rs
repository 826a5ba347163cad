//! clickpath: web access logs to sessions, behavioral traces and clustering features
//!
//! Pipeline:
//! - `parse`: normalize access log lines or CSV rows into requests
//! - `session`: group requests by client and split them into sessions
//! - `tagging`: map every URL to an action tag through a rule cascade
//! - `trace`: per-session tag sequences and their wire format
//! - `analytics`: popularity, uniqueness and session statistics
//! - `encode`: feature vectors, frequent subsequences and distances
//!
//! `meta` persists collections in SQLite; `commands` wires it all to the CLI.

pub mod analytics;
pub mod commands;
pub mod config;
pub mod encode;
pub mod error;
pub mod meta;
pub mod models;
pub mod parse;
pub mod progress;
pub mod session;
pub mod tagging;
pub mod trace;

pub use config::Config;
pub use error::{Error, Result};
